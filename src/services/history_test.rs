use super::*;
use crate::state::test_helpers::{dummy_operation, pts};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn ids(ops: &[Operation]) -> Vec<&str> {
    ops.iter().map(|op| op.id.as_str()).collect()
}

fn assert_cursor_invariant(log: &DrawingLog) {
    let len = i64::try_from(log.len()).expect("len fits");
    assert!(log.cursor() >= -1, "cursor below -1");
    assert!(log.cursor() <= len - 1, "cursor past last entry");
    assert_eq!(i64::try_from(log.snapshot().len()).expect("fits"), log.cursor() + 1);
    assert!(log.len() <= log.bound);
}

// =============================================================================
// append
// =============================================================================

#[test]
fn new_log_is_empty() {
    let log = DrawingLog::new(10);
    assert!(log.is_empty());
    assert_eq!(log.cursor(), -1);
    assert!(log.snapshot().is_empty());
}

#[test]
fn zero_bound_is_raised_to_one() {
    let mut log = DrawingLog::new(0);
    assert_eq!(log.bound, 1);
    log.append(dummy_operation("a"));
    log.append(dummy_operation("b"));
    assert_eq!(ids(&log.snapshot()), vec!["b"]);
}

#[test]
fn append_returns_stored_operation_and_moves_cursor() {
    let mut log = DrawingLog::new(10);
    let stored = log.append(dummy_operation("a"));
    assert_eq!(stored.id, "a");
    assert_eq!(log.cursor(), 0);

    log.append(dummy_operation("b"));
    assert_eq!(log.cursor(), 1);
    assert_eq!(ids(&log.snapshot()), vec!["a", "b"]);
}

#[test]
fn append_after_undo_discards_redo_buffer() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    log.undo();
    log.append(dummy_operation("b"));

    assert!(log.redo().is_none());
    assert_eq!(log.len(), 1);
    assert_eq!(ids(&log.snapshot()), vec!["b"]);
}

// =============================================================================
// eviction
// =============================================================================

#[test]
fn eviction_keeps_length_at_bound() {
    let mut log = DrawingLog::new(3);
    for i in 0..10 {
        log.append(dummy_operation(&format!("op{i}")));
        assert!(log.len() <= 3);
    }
    assert_eq!(log.len(), 3);
    assert_eq!(log.cursor(), 2);
    assert_eq!(ids(&log.snapshot()), vec!["op7", "op8", "op9"]);
}

#[test]
fn default_bound_evicts_first_of_501() {
    let mut log = DrawingLog::default();
    for i in 1..=501 {
        log.append(dummy_operation(&format!("op{i}")));
    }

    let snapshot = log.snapshot();
    assert_eq!(snapshot.len(), 500);
    assert_eq!(snapshot[0].id, "op2");
    assert_eq!(snapshot[499].id, "op501");
    assert!(!log.contains("op1"));
}

#[test]
fn eviction_never_drives_cursor_below_minus_one() {
    let mut log = DrawingLog::new(2);
    log.append(dummy_operation("a"));
    log.append(dummy_operation("b"));
    log.undo();
    log.undo();
    assert_eq!(log.cursor(), -1);

    // Append truncates the redo buffer first, so nothing is evicted here.
    log.append(dummy_operation("c"));
    assert_eq!(log.cursor(), 0);
    assert_eq!(ids(&log.snapshot()), vec!["c"]);
}

#[test]
fn pending_operation_evicted_before_finalize_is_a_noop() {
    let mut log = DrawingLog::new(2);
    log.append(dummy_operation("pending"));
    log.append(dummy_operation("b"));
    log.append(dummy_operation("c"));

    assert!(log.finalize("pending", pts(&[(1.0, 1.0)])).is_none());
    assert_eq!(ids(&log.snapshot()), vec!["b", "c"]);
}

// =============================================================================
// finalize
// =============================================================================

#[test]
fn finalize_replaces_points_once() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("s1"));

    let final_points = pts(&[(5.0, 5.0), (6.0, 7.0)]);
    let updated = log.finalize("s1", final_points.clone()).expect("stroke exists");
    assert_eq!(updated.points, final_points);
    assert!(updated.finalized);

    assert!(log.finalize("s1", pts(&[(0.0, 0.0)])).is_none());
    assert_eq!(log.get("s1").expect("still stored").points, final_points);
}

#[test]
fn finalize_unknown_id_returns_none() {
    let mut log = DrawingLog::new(10);
    assert!(log.finalize("missing", Vec::new()).is_none());
    log.append(dummy_operation("a"));
    assert!(log.finalize("missing", Vec::new()).is_none());
}

#[test]
fn finalize_reaches_redo_buffered_operation() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    log.undo();

    assert!(log.finalize("a", pts(&[(2.0, 2.0)])).is_some());
    let redone = log.redo().expect("redo a");
    assert!(redone.finalized);
}

// =============================================================================
// undo / redo
// =============================================================================

#[test]
fn undo_on_empty_log_returns_none() {
    let mut log = DrawingLog::new(10);
    assert!(log.undo().is_none());
    assert_eq!(log.cursor(), -1);
}

#[test]
fn clear_then_undo_returns_none() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    log.append(dummy_operation("b"));
    log.clear();

    assert!(log.undo().is_none());
    assert!(log.redo().is_none());
    assert!(log.is_empty());
    assert_eq!(log.cursor(), -1);
}

#[test]
fn clear_drops_redo_buffer() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    log.undo();
    log.clear();
    assert!(log.redo().is_none());
}

#[test]
fn redo_at_head_returns_none() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    assert!(log.redo().is_none());
    assert_eq!(log.cursor(), 0);
}

#[test]
fn undo_redo_append_sequence() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("op1"));
    log.append(dummy_operation("op2"));

    let undone = log.undo().expect("undo op2");
    assert_eq!(undone.id, "op2");
    assert_eq!(log.cursor(), 0);
    assert_eq!(ids(&log.snapshot()), vec!["op1"]);

    let redone = log.redo().expect("redo op2");
    assert_eq!(redone.id, "op2");
    assert_eq!(log.cursor(), 1);

    log.undo();
    log.append(dummy_operation("op3"));
    assert!(log.redo().is_none());
    assert!(!log.contains("op2"));
    assert_eq!(ids(&log.snapshot()), vec!["op1", "op3"]);
}

#[test]
fn undo_keeps_operation_retained() {
    let mut log = DrawingLog::new(10);
    log.append(dummy_operation("a"));
    log.undo();
    assert_eq!(log.len(), 1);
    assert!(log.contains("a"));
    assert!(log.snapshot().is_empty());
}

// =============================================================================
// invariants under random sequences
// =============================================================================

#[test]
fn cursor_invariant_holds_for_random_sequences() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for bound in [1_usize, 2, 5, 17] {
        let mut log = DrawingLog::new(bound);
        for step in 0..2_000_usize {
            match rng.random_range(0..10) {
                0..=3 => {
                    log.append(dummy_operation(&format!("op{step}")));
                }
                4..=5 => {
                    log.undo();
                }
                6..=7 => {
                    log.redo();
                }
                8 => {
                    log.finalize(&format!("op{}", step.saturating_sub(3)), Vec::new());
                }
                _ => {
                    if rng.random_bool(0.1) {
                        log.clear();
                    }
                }
            }
            assert_cursor_invariant(&log);
        }
    }
}

#[test]
fn operation_serializes_with_flat_author_and_style() {
    let op = dummy_operation("s1");
    let value = serde_json::to_value(&op).expect("serialize");
    assert_eq!(value["id"], "s1");
    assert_eq!(value["type"], "stroke");
    assert_eq!(value["userId"], op.author.id.as_str());
    assert_eq!(value["userName"], op.author.name.as_str());
    assert_eq!(value["tool"], "brush");
    assert_eq!(value["finalized"], false);
    assert!(value.get("timestamp").is_some());

    let restored: Operation = serde_json::from_value(value).expect("deserialize");
    assert_eq!(restored, op);
}
