//! Typed payloads carried in `Frame::data`.
//!
//! Inbound structs are decoded from client frames; outbound structs are
//! serialized into frames by the session coordinator. Field names follow the
//! camelCase wire shapes clients already speak.

use serde::{Deserialize, Serialize};

use crate::services::history::{Operation, Point, Tool};
use crate::services::room::UserInfo;

// =============================================================================
// INBOUND
// =============================================================================

/// `start-stroke` payload. Only `points` has a wire default; style fields
/// are normalized by the stroke service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStroke {
    #[serde(default)]
    pub points: Vec<Point>,
    pub color: Option<String>,
    pub width: Option<f64>,
    pub tool: Option<Tool>,
    pub stroke_id: Option<String>,
}

/// `continue-stroke` and `end-stroke` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePoints {
    #[serde(default)]
    pub points: Vec<Point>,
    pub stroke_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CursorMove {
    pub x: f64,
    pub y: f64,
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Init<'a> {
    pub user_id: &'a str,
    pub user_color: &'a str,
    pub user_name: &'a str,
    pub operations: Vec<Operation>,
    pub users: Vec<UserInfo>,
}

/// Relay of a newly stored stroke: the operation itself plus the id
/// reconciliation the originator asked for.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeStarted<'a> {
    #[serde(flatten)]
    pub operation: &'a Operation,
    pub server_operation_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_id: Option<&'a str>,
}

/// Point relay for `continue-stroke` and `end-stroke`, keyed by the
/// client's transient stroke id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRelay<'a> {
    pub user_id: &'a str,
    pub stroke_id: &'a str,
    pub points: &'a [Point],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoved<'a> {
    pub user_id: &'a str,
    pub x: f64,
    pub y: f64,
    pub color: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub operation_id: String,
    pub current_index: i64,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedoResult {
    pub operation: Operation,
    pub current_index: i64,
}

#[derive(Debug, Serialize)]
pub struct SyncState {
    pub operations: Vec<Operation>,
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
}
