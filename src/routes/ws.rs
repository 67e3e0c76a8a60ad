//! WebSocket handler — the per-connection session coordinator.
//!
//! DESIGN
//! ======
//! On upgrade the connection joins its room immediately and enters a
//! `select!` loop:
//! - Incoming client frames → parse + decode + apply to the room
//! - Frames queued by the room → forward to the client
//!
//! A `Session` only exists once joined, so every drawing event is handled
//! against a room. Handlers are pure mutations over `RoomState` that return
//! an `Outcome`; the dispatch layer delivers the outcome while the room's
//! section is still held, which keeps fan-out in log order. Delivery only
//! enqueues; the socket write happens in this connection's loop.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → join room → `init` to sender, `user-joined` to peers
//! 2. Client frames → dispatch → outcome delivered (others / everyone / sender)
//! 3. Close → `user-left` to peers → clear stroke mappings → deferred room check
//!
//! ERROR HANDLING
//! ==============
//! Malformed frames, unknown events, and bad payloads answer the sender with
//! an `error` frame. No application error ends the session; only the
//! transport closing does.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{
    ClientEvent, EV_CLEAR_NOTICE, EV_CONTINUE_STROKE, EV_END_STROKE, EV_ERROR, EV_INIT, EV_PONG, EV_REDO_RESULT,
    EV_START_STROKE, EV_SYNC_STATE, EV_UNDO_RESULT, EV_USER_JOINED, EV_USER_LEFT, ErrorCode, Frame,
};
use crate::protocol::{
    CursorMove, Init, RedoResult, StartStroke, StrokePoints, StrokeRelay, StrokeStarted, SyncState, UndoResult,
    UserLeft,
};
use crate::services::history::Author;
use crate::services::room::{Room, RoomState, UserInfo, schedule_reclaim};
use crate::services::stroke::{self, FinalizeOutcome, StrokeIds};
use crate::services::{cursor, identity};
use crate::state::AppState;

pub const MAX_ROOM_ID_LEN: usize = 64;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid frame: {0}")]
    BadFrame(#[source] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid {event} payload: {source}")]
    BadPayload { event: String, source: serde_json::Error },
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadFrame(_) => "E_BAD_FRAME",
            Self::UnknownEvent(_) => "E_UNKNOWN_EVENT",
            Self::BadPayload { .. } => "E_BAD_PAYLOAD",
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room id longer than {MAX_ROOM_ID_LEN} characters")]
    RoomIdTooLong,
}

/// Pick the room for a new connection. Missing or blank ids land in the
/// default room rather than being rejected.
///
/// # Errors
///
/// Returns `JoinError::RoomIdTooLong` for ids over `MAX_ROOM_ID_LEN` chars.
pub fn resolve_room_id(requested: Option<&str>, default_room: &str) -> Result<String, JoinError> {
    let Some(room_id) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(default_room.to_owned());
    };
    if room_id.chars().count() > MAX_ROOM_ID_LEN {
        return Err(JoinError::RoomIdTooLong);
    }
    Ok(room_id.to_owned())
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
enum Outcome {
    /// Every peer except the sender. Drawing deltas and cursors: the sender
    /// already reflects its own edit.
    Others(Frame),
    /// Every connection including the sender. Cursor-moving results the
    /// sender must adopt rather than guess.
    Everyone(Frame),
    /// Sender only, queued in room order.
    Reply(Frame),
    /// Nothing to deliver.
    Silent,
}

/// A decoded client event, ready to apply under the room lock.
enum Command {
    StartStroke(StartStroke),
    ContinueStroke(StrokePoints),
    EndStroke(StrokePoints),
    CursorMove(CursorMove),
    Undo,
    Redo,
    Clear,
    RequestSync,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let room_id = match resolve_room_id(params.get("room").map(String::as_str), &state.config.default_room) {
        Ok(room_id) => room_id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, room_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, room_id: String) {
    // Per-connection queue for everything the room sends this client.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_queue_capacity);
    let mut session = Session::join(&state, &room_id, client_tx).await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in session.process_inbound_text(text.as_str()).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    session.leave(&state).await;
}

// =============================================================================
// SESSION
// =============================================================================

/// Protocol state for one joined connection.
pub struct Session {
    client_id: Uuid,
    user: UserInfo,
    room: Arc<Room>,
    strokes: StrokeIds,
}

impl Session {
    /// Join a room: register the user, queue `init` for the joiner, and
    /// announce the joiner to peers, all inside one room section.
    pub async fn join(state: &AppState, room_id: &str, tx: mpsc::Sender<Frame>) -> Self {
        let client_id = Uuid::new_v4();
        let user = identity::generate_user(client_id);

        let (room, mut guard) = state.rooms.enter(room_id).await;
        guard.admit(client_id, user.clone(), tx);

        let init = Init {
            user_id: &user.id,
            user_color: &user.color,
            user_name: &user.name,
            operations: guard.log.snapshot(),
            users: guard.roster(),
        };
        guard.send_to(client_id, Frame::from_payload(EV_INIT, &init));
        guard.broadcast(&Frame::from_payload(EV_USER_JOINED, &user), Some(client_id));
        let users = guard.user_count();
        drop(guard);

        info!(%room_id, %client_id, name = %user.name, users, "session: joined room");
        Self { client_id, user, room, strokes: StrokeIds::default() }
    }

    /// Parse and apply one inbound text frame, returning frames to write
    /// straight back to the sender (`pong`, `error`).
    pub async fn process_inbound_text(&mut self, text: &str) -> Vec<Frame> {
        match self.process(text).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(client_id = %self.client_id, code = e.error_code(), error = %e, "session: rejected frame");
                vec![Frame::error_from(&e)]
            }
        }
    }

    async fn process(&mut self, text: &str) -> Result<Vec<Frame>, SessionError> {
        let frame: Frame = serde_json::from_str(text).map_err(SessionError::BadFrame)?;
        let Some(event) = ClientEvent::parse(&frame.event) else {
            return Err(SessionError::UnknownEvent(frame.event));
        };
        if !event.is_high_frequency() {
            debug!(client_id = %self.client_id, event = %frame.event, "session: recv frame");
        }

        let command = match event {
            ClientEvent::Ping => return Ok(vec![Frame::empty(EV_PONG)]),
            ClientEvent::StartStroke => Command::StartStroke(payload(&frame)?),
            ClientEvent::ContinueStroke => Command::ContinueStroke(payload(&frame)?),
            ClientEvent::EndStroke => Command::EndStroke(payload(&frame)?),
            ClientEvent::CursorMove => Command::CursorMove(payload(&frame)?),
            ClientEvent::Undo => Command::Undo,
            ClientEvent::Redo => Command::Redo,
            ClientEvent::Clear => Command::Clear,
            ClientEvent::RequestSync => Command::RequestSync,
        };

        let mut room = self.room.lock().await;
        let outcome = self.apply(&mut room, command);
        deliver(&room, self.client_id, outcome);
        Ok(Vec::new())
    }

    /// Apply one command to the room. Runs inside the room's section.
    fn apply(&mut self, room: &mut RoomState, command: Command) -> Outcome {
        match command {
            Command::StartStroke(start) => {
                let transient = start.stroke_id.clone().filter(|id| !id.trim().is_empty());
                let op = stroke::start_stroke(&mut room.log, &mut self.strokes, Author::from(&self.user), start);
                debug!(client_id = %self.client_id, operation_id = %op.id, "session: stroke started");
                let started =
                    StrokeStarted { operation: &op, server_operation_id: &op.id, stroke_id: transient.as_deref() };
                Outcome::Others(Frame::from_payload(EV_START_STROKE, &started))
            }
            Command::ContinueStroke(delta) => Outcome::Others(stroke_relay(EV_CONTINUE_STROKE, &self.user, &delta)),
            Command::EndStroke(end) => {
                let relay = stroke_relay(EV_END_STROKE, &self.user, &end);
                let outcome =
                    stroke::end_stroke(&mut room.log, &mut self.strokes, &self.user.id, &end.stroke_id, end.points);
                if outcome != FinalizeOutcome::Finalized {
                    debug!(client_id = %self.client_id, stroke_id = %end.stroke_id, ?outcome, "session: end-stroke absorbed");
                }
                Outcome::Others(relay)
            }
            Command::CursorMove(pos) => Outcome::Others(cursor::cursor_frame(&self.user, pos)),
            Command::Undo => {
                let Some(operation_id) = room.log.undo().map(|op| op.id.clone()) else {
                    return Outcome::Silent;
                };
                let current_index = room.log.cursor();
                info!(client_id = %self.client_id, %operation_id, current_index, "session: undo");
                let result = UndoResult { operation_id, current_index, operations: room.log.snapshot() };
                Outcome::Everyone(Frame::from_payload(EV_UNDO_RESULT, &result))
            }
            Command::Redo => {
                let Some(operation) = room.log.redo().cloned() else {
                    return Outcome::Silent;
                };
                let current_index = room.log.cursor();
                info!(client_id = %self.client_id, operation_id = %operation.id, current_index, "session: redo");
                Outcome::Everyone(Frame::from_payload(EV_REDO_RESULT, &RedoResult { operation, current_index }))
            }
            Command::Clear => {
                if room.log.is_empty() {
                    debug!(client_id = %self.client_id, "session: clear on empty canvas");
                }
                let discarded = room.log.len();
                room.log.clear();
                info!(client_id = %self.client_id, name = %self.user.name, discarded, "session: canvas cleared");
                Outcome::Everyone(Frame::empty(EV_CLEAR_NOTICE))
            }
            Command::RequestSync => {
                let sync = SyncState { operations: room.log.snapshot(), users: room.roster() };
                Outcome::Reply(Frame::from_payload(EV_SYNC_STATE, &sync))
            }
        }
    }

    /// Disconnect: drop the roster entry, tell peers, forget stroke mappings,
    /// and schedule the deferred room check. Pending strokes stay in the log
    /// with their start-time points.
    pub async fn leave(mut self, state: &AppState) {
        let mut room = self.room.lock().await;
        if let Some(user) = room.dismiss(self.client_id) {
            let left = UserLeft { user_id: &user.id, user_name: &user.name };
            room.broadcast(&Frame::from_payload(EV_USER_LEFT, &left), Some(self.client_id));
        }
        let remaining = room.user_count();
        let generation = room.generation();
        drop(room);

        if !self.strokes.is_empty() {
            debug!(client_id = %self.client_id, pending = self.strokes.len(), "session: dropping unfinished stroke mappings");
        }
        self.strokes.clear();

        let room_id = self.room.id().to_owned();
        info!(%room_id, client_id = %self.client_id, name = %self.user.name, remaining, "session: left room");

        if remaining == 0 {
            schedule_reclaim(state.rooms.clone(), room_id, generation, state.config.room_grace);
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn payload<T: DeserializeOwned>(frame: &Frame) -> Result<T, SessionError> {
    frame
        .payload()
        .map_err(|source| SessionError::BadPayload { event: frame.event.clone(), source })
}

fn stroke_relay(event: &str, user: &UserInfo, delta: &StrokePoints) -> Frame {
    let relay = StrokeRelay { user_id: &user.id, stroke_id: &delta.stroke_id, points: &delta.points };
    Frame::from_payload(event, &relay)
}

fn deliver(room: &RoomState, client_id: Uuid, outcome: Outcome) {
    match outcome {
        Outcome::Others(frame) => room.broadcast(&frame, Some(client_id)),
        Outcome::Everyone(frame) => room.broadcast(&frame, None),
        Outcome::Reply(frame) => room.send_to(client_id, frame),
        Outcome::Silent => {}
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.event == EV_ERROR {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(event = %frame.event, code, "ws: send error frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
