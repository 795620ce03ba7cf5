//! Reconciliation: the only sanctioned repair path for denormalized caches.
//!
//! The balance is recomputed from one snapshot of the circle's log and written back with
//! last-write-wins semantics, so the pass may run next to live writers. Checkpoint diffs
//! and monthly aggregates are verified against the same snapshot and, when they diverge,
//! rebuilt inside a unit of work on the live log.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    checkpoint, monthly,
    reconstruct::Timeline,
    store::{CircleLog, EventStore},
    CoreResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub circle_id: Uuid,
    pub cached: i64,
    pub reconstructed: i64,
    pub diffs_repaired: usize,
    pub months_repaired: bool,
}

impl ReconcileOutcome {
    pub fn balance_repaired(&self) -> bool {
        self.cached != self.reconstructed
    }

    pub fn is_clean(&self) -> bool {
        !self.balance_repaired() && self.diffs_repaired == 0 && !self.months_repaired
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileReport {
    pub fn repaired(&self) -> impl Iterator<Item = &ReconcileOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_clean())
    }
}

/// Recomputes one circle's caches from its log and overwrites any that diverge.
pub fn reconcile_circle(store: &dyn EventStore, circle_id: Uuid) -> CoreResult<ReconcileOutcome> {
    let snapshot = store.snapshot(circle_id)?;
    let cached = snapshot.circle.current_balance;
    let reconstructed = Timeline::new(&snapshot.events).current_balance();

    if cached != reconstructed {
        warn!(
            circle = %circle_id,
            cached,
            reconstructed,
            "current balance diverged from reconstructed history; overwriting cache"
        );
        store.set_current_balance(circle_id, reconstructed)?;
    }

    let mut rescanned = snapshot.events.clone();
    let diffs_stale = !checkpoint::refresh_diffs(&mut rescanned).is_empty();
    let months_stale = monthly::rebuild(&snapshot.events, circle_id) != snapshot.monthly;

    let mut diffs_repaired = 0;
    let mut months_repaired = false;
    if diffs_stale || months_stale {
        store.write_circle(circle_id, &mut |log: &mut CircleLog| {
            diffs_repaired = checkpoint::refresh_diffs(&mut log.events).len();
            let rebuilt = monthly::rebuild(&log.events, circle_id);
            months_repaired = rebuilt != log.monthly;
            log.monthly = rebuilt;
            Ok(())
        })?;
        warn!(
            circle = %circle_id,
            diffs_repaired,
            months_repaired,
            "rebuilt derived checkpoint diffs and monthly aggregates"
        );
    }

    Ok(ReconcileOutcome {
        circle_id,
        cached,
        reconstructed,
        diffs_repaired,
        months_repaired,
    })
}

/// Reconciles every circle in the store.
pub fn reconcile_all(store: &dyn EventStore) -> CoreResult<ReconcileReport> {
    let mut report = ReconcileReport::default();
    for circle in store.circles()? {
        report.outcomes.push(reconcile_circle(store, circle.id)?);
    }
    info!(
        circles = report.outcomes.len(),
        repaired = report.repaired().count(),
        "reconciliation finished"
    );
    Ok(report)
}
