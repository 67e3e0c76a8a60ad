//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the room websocket plus two read-only HTTP
//! endpoints for liveness and aggregate counters.

pub mod rooms;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/health", get(rooms::health))
        .route("/api/stats", get(rooms::stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
