//! Balance reconstruction: the single place where a balance is derived from event history.
//!
//! Every read path (current balance, period series, feed annotations, reconciliation)
//! goes through [`Timeline`] so that differently scoped views of the same circle can
//! never drift apart. Inputs are expected to belong to one circle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use circle_domain::{EventKind, EventOrder, EventPayload, FeedItem, LedgerEvent};
use uuid::Uuid;

/// How an entry moves the running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Absolute value (checkpoint).
    Set(i64),
    /// Signed delta (debit or credit).
    Add(i64),
}

impl Effect {
    pub fn apply(self, balance: i64) -> i64 {
        match self {
            Effect::Set(amount) => amount,
            Effect::Add(delta) => balance.saturating_add(delta),
        }
    }
}

/// Anything that can be placed in the total event order and moves a balance.
pub trait BalanceEffect {
    fn order(&self) -> EventOrder;
    fn circle_id(&self) -> Uuid;
    fn effect(&self) -> Effect;
}

impl BalanceEffect for LedgerEvent {
    fn order(&self) -> EventOrder {
        LedgerEvent::order(self)
    }

    fn circle_id(&self) -> Uuid {
        self.circle_id
    }

    fn effect(&self) -> Effect {
        match &self.payload {
            EventPayload::Checkpoint(checkpoint) => Effect::Set(checkpoint.amount),
            EventPayload::Debit(debit) => Effect::Add(-debit.amount),
            EventPayload::Credit(credit) => Effect::Add(credit.amount),
        }
    }
}

impl BalanceEffect for FeedItem {
    fn order(&self) -> EventOrder {
        FeedItem::order(self)
    }

    fn circle_id(&self) -> Uuid {
        self.circle_id
    }

    fn effect(&self) -> Effect {
        match self.kind {
            EventKind::Checkpoint => Effect::Set(self.amount),
            EventKind::Debit | EventKind::Credit => Effect::Add(self.amount),
        }
    }
}

/// An entry paired with the running balance right after it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotated<'a, T> {
    pub event: &'a T,
    pub balance_after: i64,
}

/// Events of one circle sorted once by [`EventOrder`].
#[derive(Debug, Clone)]
pub struct Timeline<'a, T> {
    ordered: Vec<&'a T>,
}

impl<'a, T: BalanceEffect> Timeline<'a, T> {
    pub fn new(events: &'a [T]) -> Self {
        Self::from_refs(events.iter())
    }

    pub fn from_refs<I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut ordered: Vec<&'a T> = events.into_iter().collect();
        ordered.sort_by_key(|event| event.order());
        Self { ordered }
    }

    pub fn events(&self) -> &[&'a T] {
        &self.ordered
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Balance after every event in the log.
    pub fn current_balance(&self) -> i64 {
        fold(0, &self.ordered)
    }

    /// Balance including every event at or before `instant`.
    pub fn balance_at(&self, instant: DateTime<Utc>) -> i64 {
        let split = self
            .ordered
            .partition_point(|event| event.order().timestamp <= instant);
        fold(0, &self.ordered[..split])
    }

    /// Balance including only events strictly before `instant`.
    pub fn balance_before(&self, instant: DateTime<Utc>) -> i64 {
        fold(0, &self.ordered[..self.split_before(instant)])
    }

    /// Balance including only events strictly before `order`.
    pub fn balance_before_order(&self, order: &EventOrder) -> i64 {
        let split = self.ordered.partition_point(|event| event.order() < *order);
        fold(0, &self.ordered[..split])
    }

    /// Running balance after each event.
    ///
    /// Without `from`, the walk starts at `seed` (default zero) and covers every event.
    /// With `from`, events strictly before it are folded into the starting balance (the
    /// last checkpoint governs, followed by the deltas after it) and only events at or
    /// after `from` are emitted.
    pub fn reconstruct(&self, from: Option<DateTime<Utc>>, seed: Option<i64>) -> Vec<Annotated<'a, T>> {
        let seed = seed.unwrap_or(0);
        let (mut balance, start) = match from {
            None => (seed, 0),
            Some(from) => {
                let split = self.split_before(from);
                (fold(seed, &self.ordered[..split]), split)
            }
        };
        self.ordered[start..]
            .iter()
            .map(|event| {
                balance = event.effect().apply(balance);
                Annotated {
                    event: *event,
                    balance_after: balance,
                }
            })
            .collect()
    }

    /// Delta of each checkpoint against the checkpoint immediately preceding it.
    pub fn checkpoint_diffs(&self) -> HashMap<Uuid, Option<i64>> {
        let mut previous: Option<i64> = None;
        let mut diffs = HashMap::new();
        for event in &self.ordered {
            if let Effect::Set(amount) = event.effect() {
                diffs.insert(event.order().id, previous.map(|prior| amount.saturating_sub(prior)));
                previous = Some(amount);
            }
        }
        diffs
    }

    fn split_before(&self, instant: DateTime<Utc>) -> usize {
        self.ordered
            .partition_point(|event| event.order().timestamp < instant)
    }
}

fn fold<T: BalanceEffect>(seed: i64, events: &[&T]) -> i64 {
    events
        .iter()
        .fold(seed, |balance, event| event.effect().apply(balance))
}

/// Running balance after every event; see [`Timeline::reconstruct`].
pub fn reconstruct<'a, T: BalanceEffect>(
    events: &'a [T],
    from: Option<DateTime<Utc>>,
    seed: Option<i64>,
) -> Vec<Annotated<'a, T>> {
    Timeline::new(events).reconstruct(from, seed)
}

/// Balance of the circle at `instant`, inclusive.
pub fn balance_at<T: BalanceEffect>(events: &[T], instant: DateTime<Utc>) -> i64 {
    Timeline::new(events).balance_at(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use circle_domain::{Checkpoint, Credit, CreditCategory, Debit, DebitCategory};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn event(sequence: u64, timestamp: DateTime<Utc>, payload: EventPayload) -> LedgerEvent {
        LedgerEvent::new(Uuid::nil(), Uuid::nil(), timestamp, sequence, payload)
    }

    fn checkpoint(sequence: u64, timestamp: DateTime<Utc>, amount: i64) -> LedgerEvent {
        event(
            sequence,
            timestamp,
            EventPayload::Checkpoint(Checkpoint {
                amount,
                note: None,
                diff_from_previous: None,
            }),
        )
    }

    fn debit(sequence: u64, timestamp: DateTime<Utc>, amount: i64) -> LedgerEvent {
        event(
            sequence,
            timestamp,
            EventPayload::Debit(Debit {
                amount,
                category: DebitCategory::Other,
                tags: Vec::new(),
                place: None,
            }),
        )
    }

    fn credit(sequence: u64, timestamp: DateTime<Utc>, amount: i64) -> LedgerEvent {
        event(
            sequence,
            timestamp,
            EventPayload::Credit(Credit {
                amount,
                category: CreditCategory::Other,
                tags: Vec::new(),
                source: None,
            }),
        )
    }

    #[test]
    fn later_checkpoint_on_same_day_governs() {
        let events = vec![
            debit(3, at(2, 10), 200),
            checkpoint(2, at(1, 18), 1200),
            checkpoint(1, at(1, 9), 1000),
        ];
        assert_eq!(balance_at(&events, at(2, 23)), 1000);
        assert_eq!(balance_at(&events, at(1, 12)), 1000);
        assert_eq!(balance_at(&events, at(1, 8)), 0);
    }

    #[test]
    fn without_checkpoint_balance_is_cumulative() {
        let events = vec![credit(1, at(1, 9), 500), debit(2, at(1, 10), 120)];
        let annotated = reconstruct(&events, None, None);
        let balances: Vec<i64> = annotated.iter().map(|row| row.balance_after).collect();
        assert_eq!(balances, vec![500, 380]);
    }

    #[test]
    fn seed_applies_when_no_checkpoint_precedes() {
        let events = vec![debit(1, at(1, 9), 100)];
        let annotated = reconstruct(&events, None, Some(1000));
        assert_eq!(annotated[0].balance_after, 900);
    }

    #[test]
    fn from_folds_prior_events_into_starting_balance() {
        let events = vec![
            checkpoint(1, at(1, 9), 1000),
            debit(2, at(1, 12), 100),
            credit(3, at(2, 9), 50),
            debit(4, at(3, 9), 25),
        ];
        let annotated = reconstruct(&events, Some(at(2, 0)), None);
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].balance_after, 950);
        assert_eq!(annotated[1].balance_after, 925);
    }

    #[test]
    fn ties_are_ordered_by_sequence() {
        let same = at(4, 12);
        let events = vec![debit(2, same, 100), checkpoint(1, same, 1000)];
        // The checkpoint was created first, so the debit applies on top of it.
        assert_eq!(Timeline::new(&events).current_balance(), 900);
    }

    #[test]
    fn reconstruct_is_idempotent() {
        let events = vec![
            checkpoint(1, at(1, 9), 300),
            debit(2, at(1, 10), 40),
            credit(3, at(2, 10), 15),
        ];
        let first: Vec<i64> = reconstruct(&events, None, None)
            .iter()
            .map(|row| row.balance_after)
            .collect();
        let second: Vec<i64> = reconstruct(&events, None, None)
            .iter()
            .map(|row| row.balance_after)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn checkpoint_diffs_follow_event_order() {
        let first = checkpoint(1, at(1, 9), 1000);
        let second = checkpoint(2, at(3, 9), 1250);
        let events = vec![second.clone(), debit(3, at(2, 9), 10), first.clone()];
        let diffs = Timeline::new(&events).checkpoint_diffs();
        assert_eq!(diffs[&first.id], None);
        assert_eq!(diffs[&second.id], Some(250));
    }

    #[test]
    fn feed_items_reconstruct_like_events() {
        let events = vec![checkpoint(1, at(1, 9), 700), debit(2, at(1, 10), 70)];
        let items: Vec<FeedItem> = events.iter().map(FeedItem::from_event).collect();
        assert_eq!(
            Timeline::new(&items).current_balance(),
            Timeline::new(&events).current_balance()
        );
    }
}
