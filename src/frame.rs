//! Frame — the envelope for every websocket message exchanged with a room.
//!
//! ARCHITECTURE
//! ============
//! Clients and the server speak a flat, named-event protocol. Every message
//! is a Frame carrying an event name plus a JSON object payload. The session
//! coordinator routes on the event name and decodes the payload into a typed
//! struct from `crate::protocol`; it never inspects raw `data` beyond that.
//!
//! DESIGN
//! ======
//! - Payload is always a JSON object (`Data`), possibly empty.
//! - Inbound frames may omit `data` and `ts`; both default.
//! - Event names are the compatibility surface and live in this module as
//!   constants (outbound) and the `ClientEvent` enum (inbound).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

// =============================================================================
// EVENT NAMES
// =============================================================================

pub const EV_INIT: &str = "init";
pub const EV_START_STROKE: &str = "start-stroke";
pub const EV_CONTINUE_STROKE: &str = "continue-stroke";
pub const EV_END_STROKE: &str = "end-stroke";
pub const EV_CURSOR_MOVE: &str = "cursor-move";
pub const EV_UNDO_RESULT: &str = "undo-result";
pub const EV_REDO_RESULT: &str = "redo-result";
pub const EV_CLEAR_NOTICE: &str = "clear-notice";
pub const EV_SYNC_STATE: &str = "sync-state";
pub const EV_PONG: &str = "pong";
pub const EV_USER_JOINED: &str = "user-joined";
pub const EV_USER_LEFT: &str = "user-left";
pub const EV_ERROR: &str = "error";

/// Events a client may send once joined to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    StartStroke,
    ContinueStroke,
    EndStroke,
    CursorMove,
    Undo,
    Redo,
    Clear,
    RequestSync,
    Ping,
}

impl ClientEvent {
    /// Map a wire event name to its inbound event, if known.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let event = match name {
            "start-stroke" => Self::StartStroke,
            "continue-stroke" => Self::ContinueStroke,
            "end-stroke" => Self::EndStroke,
            "cursor-move" => Self::CursorMove,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            "clear" => Self::Clear,
            "request-sync" => Self::RequestSync,
            "ping" => Self::Ping,
            _ => return None,
        };
        Some(event)
    }

    /// Per-point traffic that is relayed without logging.
    #[must_use]
    pub fn is_high_frequency(self) -> bool {
        matches!(self, Self::ContinueStroke | Self::CursorMove | Self::Ping)
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Object payload. Alias to reduce noise in signatures.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Data,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    #[serde(default)]
    pub ts: i64,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Data) -> Self {
        Self { event: event.into(), data, ts: now_ms() }
    }

    /// A frame with no payload (`clear-notice`, `pong`).
    pub fn empty(event: impl Into<String>) -> Self {
        Self::new(event, Data::new())
    }

    /// Build a frame from a typed payload. Payloads that do not serialize to
    /// a JSON object are sent as an empty object.
    pub fn from_payload<T: Serialize>(event: impl Into<String>, payload: &T) -> Self {
        let data = match serde_json::to_value(payload) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) | Err(_) => Data::new(),
        };
        Self::new(event, data)
    }

    /// Create a structured error frame from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::empty(EV_ERROR)
            .with_data(FRAME_CODE, err.error_code())
            .with_data(FRAME_MESSAGE, err.to_string())
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Decode the payload into a typed struct.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the payload does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.data.clone()))
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
