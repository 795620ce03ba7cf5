//! Monthly debit aggregates maintained at write time.

use circle_domain::{LedgerEvent, MonthlyAggregate, YearMonth};
use uuid::Uuid;

/// Folds a newly created debit into its month's aggregate. Non-debits are ignored.
pub fn record_debit(aggregates: &mut Vec<MonthlyAggregate>, event: &LedgerEvent) {
    let Some(debit) = event.as_debit() else {
        return;
    };
    let month = YearMonth::from_date(event.date());
    match aggregates.iter_mut().find(|row| row.month == month) {
        Some(row) => {
            row.total_debits = row.total_debits.saturating_add(debit.amount);
            row.debit_count += 1;
        }
        None => {
            let mut row = MonthlyAggregate::empty(event.circle_id, month);
            row.total_debits = debit.amount;
            row.debit_count = 1;
            aggregates.push(row);
            aggregates.sort_by_key(|row| row.month);
        }
    }
}

/// Recomputes one month from scratch.
pub fn recompute_month(events: &[LedgerEvent], circle_id: Uuid, month: YearMonth) -> MonthlyAggregate {
    events
        .iter()
        .filter(|event| event.circle_id == circle_id && month.contains(event.date()))
        .filter_map(LedgerEvent::as_debit)
        .fold(MonthlyAggregate::empty(circle_id, month), |mut row, debit| {
            row.total_debits = row.total_debits.saturating_add(debit.amount);
            row.debit_count += 1;
            row
        })
}

/// Rebuilds every month that has at least one debit, ordered by month.
pub fn rebuild(events: &[LedgerEvent], circle_id: Uuid) -> Vec<MonthlyAggregate> {
    let mut aggregates = Vec::new();
    for event in events.iter().filter(|event| event.circle_id == circle_id) {
        record_debit(&mut aggregates, event);
    }
    aggregates
}

/// Replaces the row for `row.month`, dropping it when the month no longer has debits.
pub fn replace_month(aggregates: &mut Vec<MonthlyAggregate>, row: MonthlyAggregate) {
    aggregates.retain(|existing| existing.month != row.month);
    if !row.is_empty() {
        aggregates.push(row);
        aggregates.sort_by_key(|row| row.month);
    }
}
