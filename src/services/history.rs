//! Drawing history — the per-room ordered operation log with undo/redo.
//!
//! DESIGN
//! ======
//! Entries live in a `VecDeque` so appends are amortized O(1) and eviction of
//! the oldest entry is O(1). The cursor is stored as the length of the active
//! prefix (`active`), so the public cursor is `active - 1` and ranges over
//! `[-1, len - 1]` without signed bookkeeping.
//!
//! - Active view: `entries[..active]`.
//! - Redo buffer: `entries[active..]`, discarded by the next append.
//! - `len() <= bound` after every mutation; eviction shifts the cursor down
//!   by the number of evicted entries, floored at -1.
//!
//! The log is not internally synchronized. Callers hold the owning room's
//! critical section for every mutation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Retained operations per room when not configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

// =============================================================================
// OPERATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Stroke,
    /// Wire-compatible with clients that record a local wipe as an entry.
    /// The server resets the log on clear instead of appending one.
    #[allow(dead_code)]
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub tool: Tool,
}

/// Snapshot of the author's identity taken at submission time. Later roster
/// changes never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "userId")]
    pub id: String,
    #[serde(rename = "userName")]
    pub name: String,
    #[serde(rename = "userColor")]
    pub color: String,
}

/// One durable drawing action. `id` never changes once stored; `points` are
/// replaced at most once, when the operation is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(flatten)]
    pub author: Author,
    #[serde(flatten)]
    pub style: StrokeStyle,
    pub points: Vec<Point>,
    #[serde(rename = "timestamp")]
    pub created_at: i64,
    pub finalized: bool,
}

// =============================================================================
// DRAWING LOG
// =============================================================================

#[derive(Debug, Clone)]
pub struct DrawingLog {
    entries: VecDeque<Operation>,
    /// Length of the active prefix. Cursor is `active - 1`.
    active: usize,
    bound: usize,
}

impl DrawingLog {
    /// Create an empty log retaining at most `bound` entries (minimum 1).
    #[must_use]
    pub fn new(bound: usize) -> Self {
        let bound = bound.max(1);
        Self { entries: VecDeque::with_capacity(bound.min(DEFAULT_HISTORY_LIMIT)), active: 0, bound }
    }

    /// Append an operation, discarding the redo buffer and evicting the
    /// oldest entries past the bound. Returns the stored operation.
    pub fn append(&mut self, op: Operation) -> &Operation {
        self.entries.truncate(self.active);
        self.entries.push_back(op);
        self.active = self.entries.len();

        let overflow = self.entries.len().saturating_sub(self.bound);
        for evicted in self.entries.drain(..overflow) {
            if !evicted.finalized {
                warn!(operation_id = %evicted.id, "history: evicted operation before finalize");
            }
        }
        if overflow > 0 {
            self.active = self.active.saturating_sub(overflow);
            debug!(evicted = overflow, bound = self.bound, "history: trimmed oldest entries");
        }

        &self.entries[self.entries.len() - 1]
    }

    /// Replace the points of a pending operation and mark it finalized.
    ///
    /// Returns `None` if no operation has this id (never stored, evicted, or
    /// cleared) or if it was already finalized.
    pub fn finalize(&mut self, id: &str, points: Vec<Point>) -> Option<&Operation> {
        let op = self.entries.iter_mut().find(|op| op.id == id)?;
        if op.finalized {
            return None;
        }
        op.points = points;
        op.finalized = true;
        Some(&*op)
    }

    /// Move the newest active operation into the redo buffer.
    pub fn undo(&mut self) -> Option<&Operation> {
        if self.active == 0 {
            return None;
        }
        self.active -= 1;
        self.entries.get(self.active)
    }

    /// Restore the oldest redo-buffered operation to the active view.
    pub fn redo(&mut self) -> Option<&Operation> {
        if self.active == self.entries.len() {
            return None;
        }
        self.active += 1;
        self.entries.get(self.active - 1)
    }

    /// Ordered copy of the active view.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Operation> {
        self.entries.iter().take(self.active).cloned().collect()
    }

    /// Drop every entry, including the redo buffer. Not undoable.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = 0;
    }

    /// Boundary between active and redo-buffered entries, in `[-1, len - 1]`.
    #[must_use]
    pub fn cursor(&self) -> i64 {
        i64::try_from(self.active).unwrap_or(i64::MAX) - 1
    }

    /// Look up any retained operation (active or redo-buffered) by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.entries.iter().find(|op| op.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DrawingLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
