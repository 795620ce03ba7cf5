//! Pure delta functions that keep `Circle::current_balance` in step with the log.
//!
//! The write path appends or removes an event and then asks this module how the cached
//! balance moves. A plain delta is returned whenever it is exact; when the event sits
//! behind later entries that a delta cannot account for, the answer is to recompute from
//! the post-write log.

use circle_domain::{EventPayload, LedgerEvent};

use crate::{reconstruct::Timeline, CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// Overwrite the cache with an absolute value.
    Set(i64),
    /// Move the cache by a signed delta.
    Adjust(i64),
    /// Rebuild the cache from the log.
    Recompute,
}

impl CacheUpdate {
    /// Resolves the update against the current cache and the log as it stands after the write.
    /// A delta that would take the cache out of the `i64` range fails the write.
    pub fn resolve(self, current: i64, log_after: &[LedgerEvent]) -> CoreResult<i64> {
        match self {
            CacheUpdate::Set(amount) => Ok(amount),
            CacheUpdate::Adjust(delta) => current.checked_add(delta).ok_or_else(|| {
                CoreError::Validation(format!(
                    "balance {current} cannot move by {delta} without overflowing"
                ))
            }),
            CacheUpdate::Recompute => Ok(Timeline::new(log_after).current_balance()),
        }
    }
}

/// Cache movement for appending `event` to `existing` (the log before the append).
pub fn on_create(existing: &[LedgerEvent], event: &LedgerEvent) -> CacheUpdate {
    let order = event.order();
    if superseded(existing, event) {
        return CacheUpdate::Adjust(0);
    }
    match &event.payload {
        EventPayload::Checkpoint(checkpoint) => {
            if existing.iter().any(|other| other.order() > order) {
                CacheUpdate::Recompute
            } else {
                CacheUpdate::Set(checkpoint.amount)
            }
        }
        EventPayload::Debit(debit) => CacheUpdate::Adjust(-debit.amount),
        EventPayload::Credit(credit) => CacheUpdate::Adjust(credit.amount),
    }
}

/// Cache movement for removing `removed` from the log; `remaining` excludes it.
pub fn on_delete(remaining: &[LedgerEvent], removed: &LedgerEvent) -> CacheUpdate {
    if superseded(remaining, removed) {
        return CacheUpdate::Adjust(0);
    }
    match &removed.payload {
        EventPayload::Checkpoint(_) => CacheUpdate::Recompute,
        EventPayload::Debit(debit) => CacheUpdate::Adjust(debit.amount),
        EventPayload::Credit(credit) => CacheUpdate::Adjust(-credit.amount),
    }
}

/// A later checkpoint overrides everything before it, so such events never reach the
/// current balance.
fn superseded(log: &[LedgerEvent], event: &LedgerEvent) -> bool {
    let order = event.order();
    log.iter()
        .any(|other| other.as_checkpoint().is_some() && other.order() > order)
}
