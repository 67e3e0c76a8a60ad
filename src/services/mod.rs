//! Domain services used by the websocket session and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state and drawing semantics so the route
//! handlers stay focused on protocol translation.

pub mod cursor;
pub mod history;
pub mod identity;
pub mod room;
pub mod stroke;
