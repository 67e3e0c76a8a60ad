//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the immutable config and the room registry. All drawing state is
//! process-memory-resident and lost on restart.

use std::sync::Arc;

use crate::config::Config;
use crate::services::room::RoomRegistry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: RoomRegistry,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rooms = RoomRegistry::new(config.history_limit);
        Self { config: Arc::new(config), rooms }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
