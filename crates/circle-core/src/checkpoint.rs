//! Cached checkpoint diffs.
//!
//! A checkpoint stores `diff_from_previous` at write time so feeds can show it without a
//! scan. Two read paths exist: the cached value and [`rescan_diff`], used where the cache
//! is unavailable. Both order checkpoints by [`EventOrder`] and must agree with
//! [`Timeline::checkpoint_diffs`].

use circle_domain::{EventOrder, EventPayload, LedgerEvent};
use uuid::Uuid;

use crate::reconstruct::Timeline;

/// The checkpoint immediately preceding `order` in the same log.
pub fn previous_checkpoint<'a>(events: &'a [LedgerEvent], order: &EventOrder) -> Option<&'a LedgerEvent> {
    events
        .iter()
        .filter(|event| event.as_checkpoint().is_some() && event.order() < *order)
        .max_by_key(|event| event.order())
}

/// Diff a new checkpoint at `order` with `amount` would carry against `events`.
pub fn diff_from_previous(events: &[LedgerEvent], order: &EventOrder, amount: i64) -> Option<i64> {
    previous_checkpoint(events, order)
        .and_then(LedgerEvent::as_checkpoint)
        .map(|previous| amount - previous.amount)
}

/// Recomputes the diff of `target` by rescanning a circle's checkpoint list, newest first.
pub fn rescan_diff(checkpoints: &[LedgerEvent], target: &LedgerEvent) -> Option<i64> {
    let amount = target.as_checkpoint()?.amount;
    let mut newest_first: Vec<&LedgerEvent> = checkpoints
        .iter()
        .filter(|event| event.as_checkpoint().is_some())
        .collect();
    newest_first.sort_by_key(|event| std::cmp::Reverse(event.order()));
    let position = newest_first.iter().position(|event| event.id == target.id)?;
    newest_first
        .get(position + 1)
        .and_then(|previous| previous.as_checkpoint())
        .map(|previous| amount - previous.amount)
}

/// Rewrites every cached diff in `events` from the reconstructed checkpoint sequence and
/// returns the ids whose cached value changed.
pub fn refresh_diffs(events: &mut [LedgerEvent]) -> Vec<Uuid> {
    let diffs = Timeline::new(events).checkpoint_diffs();
    let mut changed = Vec::new();
    for event in events.iter_mut() {
        let id = event.id;
        if let EventPayload::Checkpoint(checkpoint) = &mut event.payload {
            let expected = diffs.get(&id).copied().flatten();
            if checkpoint.diff_from_previous != expected {
                checkpoint.diff_from_previous = expected;
                changed.push(id);
            }
        }
    }
    changed
}
