//! Stroke service — multi-phase stroke submission and id reconciliation.
//!
//! DESIGN
//! ======
//! A stroke arrives as start → continue* → end. Only start and end touch the
//! log: start appends a pending operation, end replaces its points and marks
//! it finalized. Continue is a pure relay and never reaches this module.
//!
//! Each connection keeps a `StrokeIds` map from the client's transient stroke
//! id to the canonical operation id. The transient id is used as canonical
//! when it is free in the room's log, so clients never have to learn a
//! renamed id. A transient id that already names a stored operation gets a
//! freshly minted UUID instead.
//!
//! ERROR HANDLING
//! ==============
//! End-stroke never fails. An unmapped transient id is treated as already
//! canonical, but only finalizes an operation authored by the same user, so
//! a stray end cannot rewrite someone else's stroke. Missing, foreign, and
//! already-finalized targets are logged and absorbed.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::frame::now_ms;
use crate::protocol::StartStroke;
use crate::services::history::{Author, DrawingLog, Operation, OperationKind, Point, StrokeStyle};

pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;
pub const MIN_STROKE_WIDTH: f64 = 1.0;
pub const MAX_STROKE_WIDTH: f64 = 50.0;

// =============================================================================
// RECONCILIATION MAP
// =============================================================================

/// Per-connection transient stroke id → canonical operation id.
#[derive(Debug, Default)]
pub struct StrokeIds {
    canonical: HashMap<String, String>,
}

impl StrokeIds {
    pub fn record(&mut self, transient: String, canonical: String) {
        self.canonical.insert(transient, canonical);
    }

    /// Consume the mapping for a transient id.
    pub fn take(&mut self, transient: &str) -> Option<String> {
        self.canonical.remove(transient)
    }

    /// Drop every mapping. Pending operations stay in the log as-is.
    pub fn clear(&mut self) {
        self.canonical.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// How an end-stroke resolved against the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Finalized,
    /// Nothing stored under the resolved id: never started, evicted, or cleared.
    Missing,
    /// Points were already replaced by an earlier end.
    AlreadyFinalized,
    /// Unmapped id names an operation by another author.
    Foreign,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Collision-resistant canonical id (128-bit random).
#[must_use]
pub fn mint_operation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Clamp a requested brush width into the supported range.
#[must_use]
pub fn clamp_width(width: Option<f64>) -> f64 {
    match width {
        Some(w) if w.is_finite() => w.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH),
        _ => DEFAULT_STROKE_WIDTH,
    }
}

/// Append a pending stroke and record its reconciliation mapping. Returns
/// the stored operation.
pub fn start_stroke(log: &mut DrawingLog, ids: &mut StrokeIds, author: Author, start: StartStroke) -> Operation {
    let transient = start.stroke_id.filter(|id| !id.trim().is_empty());

    let id = match transient.as_deref() {
        Some(client_id) if !log.contains(client_id) => client_id.to_owned(),
        Some(client_id) => {
            let minted = mint_operation_id();
            warn!(stroke_id = %client_id, operation_id = %minted, "stroke: client id already stored, minted replacement");
            minted
        }
        None => mint_operation_id(),
    };

    if let Some(client_id) = transient {
        ids.record(client_id, id.clone());
    }

    let style = StrokeStyle {
        color: start
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STROKE_COLOR.to_owned()),
        width: clamp_width(start.width),
        tool: start.tool.unwrap_or_default(),
    };

    let op = Operation {
        id,
        kind: OperationKind::Stroke,
        author,
        style,
        points: start.points,
        created_at: now_ms(),
        finalized: false,
    };
    log.append(op).clone()
}

/// Resolve a transient id and finalize its operation. The mapping is
/// consumed whatever the outcome.
pub fn end_stroke(
    log: &mut DrawingLog,
    ids: &mut StrokeIds,
    author_id: &str,
    stroke_id: &str,
    points: Vec<Point>,
) -> FinalizeOutcome {
    let (canonical, mapped) = match ids.take(stroke_id) {
        Some(canonical) => (canonical, true),
        None => {
            debug!(%stroke_id, "stroke: no mapping, treating id as canonical");
            (stroke_id.to_owned(), false)
        }
    };

    let Some(existing) = log.get(&canonical) else {
        warn!(%stroke_id, operation_id = %canonical, "stroke: end for unknown operation ignored");
        return FinalizeOutcome::Missing;
    };
    if !mapped && existing.author.id != author_id {
        warn!(%stroke_id, operation_id = %canonical, "stroke: end targets another author's operation, ignored");
        return FinalizeOutcome::Foreign;
    }

    match log.finalize(&canonical, points) {
        Some(op) => {
            debug!(operation_id = %op.id, points = op.points.len(), "stroke: finalized");
            FinalizeOutcome::Finalized
        }
        None => {
            debug!(operation_id = %canonical, "stroke: duplicate end ignored");
            FinalizeOutcome::AlreadyFinalized
        }
    }
}

#[cfg(test)]
#[path = "stroke_test.rs"]
mod tests;
