//! HTTP endpoints for liveness and room counters.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::frame::now_ms;
use crate::services::room::RoomStats;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: i64,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok", timestamp: now_ms() })
}

/// Live room count, connected users, and stored operations across rooms.
pub async fn stats(State(state): State<AppState>) -> Json<RoomStats> {
    Json(state.rooms.stats().await)
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
