//! Room service — registry, roster, and per-room fan-out.
//!
//! DESIGN
//! ======
//! The registry is a narrow `RwLock<HashMap<String, Arc<Room>>>` that only
//! guards create/lookup/delete. Each room owns its own `Mutex<RoomState>`
//! guarding the drawing log, the roster, and the outbound queues of its
//! connections. Rooms never share a lock, so traffic in one room does not
//! wait on another.
//!
//! Fan-out happens while the room section is held, but it only enqueues onto
//! per-connection `mpsc` queues with `try_send`. Socket writes happen in each
//! connection's own task. Every connection therefore sees room events in the
//! order the room linearized them.
//!
//! LIFECYCLE
//! =========
//! Rooms are created on first join and reclaimed by a deferred check after
//! the last user leaves. Each reclaim carries the room's admission generation;
//! any join since then makes it stale, so the grace period always counts from
//! the most recent last-leave. Deletion re-verifies the zero-user condition
//! under the room lock and marks the room retired, so a joiner that raced the
//! delete retries against a fresh room instead of joining an orphan.
//!
//! Lock order for deletion is room → registry. Nothing holds the registry
//! lock while waiting on a room, so a busy room never stalls joins elsewhere.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::Frame;
use crate::services::history::{Author, DrawingLog};

// =============================================================================
// TYPES
// =============================================================================

/// Connection-scoped identity of a user in a room's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub color: String,
    pub name: String,
    pub joined_at: i64,
}

impl From<&UserInfo> for Author {
    fn from(user: &UserInfo) -> Self {
        Self { id: user.id.clone(), name: user.name.clone(), color: user.color.clone() }
    }
}

/// Aggregate counters across all live rooms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub room_count: usize,
    pub total_users: usize,
    pub total_operations: usize,
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Everything guarded by a room's critical section.
pub struct RoomState {
    pub log: DrawingLog,
    /// Roster keyed by connection id.
    pub users: HashMap<Uuid, UserInfo>,
    /// Outbound queue per connection.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Bumped on every admit. A reclaim scheduled under an older value is stale.
    generation: u64,
    retired: bool,
}

impl RoomState {
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            log: DrawingLog::new(history_limit),
            users: HashMap::new(),
            clients: HashMap::new(),
            generation: 0,
            retired: false,
        }
    }

    /// Register a connection: roster entry plus outbound queue.
    pub fn admit(&mut self, client_id: Uuid, user: UserInfo, tx: mpsc::Sender<Frame>) {
        self.users.insert(client_id, user);
        self.clients.insert(client_id, tx);
        self.generation += 1;
    }

    /// Admission counter, captured when scheduling a reclaim.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Remove a connection, returning its roster entry if it was present.
    pub fn dismiss(&mut self, client_id: Uuid) -> Option<UserInfo> {
        self.clients.remove(&client_id);
        self.users.remove(&client_id)
    }

    /// Roster ordered by join time.
    #[must_use]
    pub fn roster(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        users
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Enqueue a frame for every connection, optionally excluding one.
    pub fn broadcast(&self, frame: &Frame, exclude: Option<Uuid>) {
        for (client_id, tx) in &self.clients {
            if exclude == Some(*client_id) {
                continue;
            }
            enqueue(*client_id, tx, frame.clone());
        }
    }

    /// Enqueue a frame for one connection.
    pub fn send_to(&self, client_id: Uuid, frame: Frame) {
        if let Some(tx) = self.clients.get(&client_id) {
            enqueue(client_id, tx, frame);
        }
    }
}

/// Best-effort enqueue: a full queue drops the frame rather than blocking
/// the room. The client can recover with `request-sync`.
fn enqueue(client_id: Uuid, tx: &mpsc::Sender<Frame>, frame: Frame) {
    match tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(frame)) => {
            warn!(%client_id, event = %frame.event, "room: outbound queue full, frame dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(%client_id, "room: outbound queue closed");
        }
    }
}

// =============================================================================
// ROOM
// =============================================================================

pub struct Room {
    id: String,
    state: Arc<Mutex<RoomState>>,
}

impl Room {
    fn new(id: String, history_limit: usize) -> Self {
        Self { id, state: Arc::new(Mutex::new(RoomState::new(history_limit))) }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enter the room's critical section. The guard owns its lock, so it
    /// does not borrow the room.
    pub async fn lock(&self) -> OwnedMutexGuard<RoomState> {
        Arc::clone(&self.state).lock_owned().await
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Arc<Room>>>>,
    history_limit: usize,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), history_limit }
    }

    /// Look up a room, creating it if absent. Concurrent calls with the same
    /// id return the same instance.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Arc::clone(room);
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_owned()).or_insert_with(|| {
            info!(%room_id, history_limit = self.history_limit, "room: created");
            Arc::new(Room::new(room_id.to_owned(), self.history_limit))
        });
        Arc::clone(room)
    }

    /// Enter a live room's critical section, creating the room if needed.
    ///
    /// A room retired by a concurrent `delete` is skipped and the lookup is
    /// retried, so the returned guard always belongs to the registered room.
    pub async fn enter(&self, room_id: &str) -> (Arc<Room>, OwnedMutexGuard<RoomState>) {
        loop {
            let room = self.get_or_create(room_id).await;
            let guard = room.lock().await;
            if !guard.retired {
                return (room, guard);
            }
            debug!(%room_id, "room: raced a reclamation, retrying");
        }
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Remove a room only if it currently has zero users. With `since`, the
    /// room must also have had no admission after that generation was
    /// captured. Returns whether a room was removed.
    pub async fn delete(&self, room_id: &str, since: Option<u64>) -> bool {
        let Some(room) = self.get(room_id).await else {
            return false;
        };

        let mut state = room.lock().await;
        if state.retired || state.user_count() > 0 {
            return false;
        }
        if since.is_some_and(|g| g != state.generation) {
            debug!(%room_id, "room: rejoined since reclaim was scheduled");
            return false;
        }

        let mut rooms = self.rooms.write().await;
        if !rooms.get(room_id).is_some_and(|registered| Arc::ptr_eq(registered, &room)) {
            return false;
        }
        state.retired = true;
        rooms.remove(room_id);
        drop(rooms);
        drop(state);

        info!(%room_id, "room: deleted");
        true
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Aggregate roster and log sizes. Rooms are sampled one at a time, so
    /// the totals are not a single atomic snapshot.
    pub async fn stats(&self) -> RoomStats {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();
        let mut stats = RoomStats { room_count: rooms.len(), ..RoomStats::default() };
        for room in rooms {
            let state = room.lock().await;
            stats.total_users += state.user_count();
            stats.total_operations += state.log.len();
        }
        stats
    }
}

/// Spawn the deferred reclamation check for a room. After `grace`, the room
/// is deleted if it still has zero users and no join happened after
/// `generation` was captured.
pub fn schedule_reclaim(registry: RoomRegistry, room_id: String, generation: u64, grace: Duration) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        let deleted = registry.delete(&room_id, Some(generation)).await;
        if !deleted {
            debug!(%room_id, "room: reclamation skipped");
        }
        deleted
    })
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
