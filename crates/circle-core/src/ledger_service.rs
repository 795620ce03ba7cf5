//! Write paths and the read facade over an [`EventStore`].
//!
//! Every write is one unit of work on the circle: append or remove the event, then apply
//! the pure cache functions (balance, checkpoint diffs, monthly aggregates) to the staged
//! log before it is committed.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use circle_domain::{
    normalize_tags, Checkpoint, Circle, Credit, CreditCategory, Cursor, Debit, DebitCategory,
    EventPayload, FeedPage, Granularity, LedgerEvent, MonthlyAggregate, MultiSeriesPoint,
    PeriodPoint, PeriodSeries, YearMonth,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    balance_cache, checkpoint,
    feed::{self, FeedRequest},
    monthly,
    period::{self, AggregationMode},
    reconcile::{self, ReconcileOutcome, ReconcileReport},
    reconstruct::Timeline,
    store::{CircleLog, EventQuery, EventStore},
    tags::{self, TagTotal},
    time::{start_of_day, Clock, SystemClock},
    CoreError, CoreResult,
};

/// Largest magnitude a single event may carry, in minor units (ten trillion whole units).
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Input for a new checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckpoint {
    pub circle_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub note: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// Input for a new debit (expense).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDebit {
    pub circle_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub category: DebitCategory,
    pub tags: Vec<String>,
    pub place: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// Input for a new credit (income).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredit {
    pub circle_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub category: CreditCategory,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// A stored event with the balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedEvent {
    pub event: LedgerEvent,
    pub balance_after: i64,
}

/// Service tying the pure core to a store and a clock.
pub struct CircleLedger<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: EventStore> CircleLedger<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: EventStore, C: Clock> CircleLedger<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn create_circle(&self, name: &str, currency: &str) -> CoreResult<Circle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("circle name must not be empty".into()));
        }
        let currency = currency.trim();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(CoreError::Validation(format!(
                "currency must be a three-letter code, got `{currency}`"
            )));
        }
        let circle = Circle::new(name, currency, self.clock.now());
        self.store.insert_circle(circle.clone())?;
        info!(circle = %circle.id, name = %circle.name, "created circle");
        Ok(circle)
    }

    pub fn circles(&self) -> CoreResult<Vec<Circle>> {
        self.store.circles()
    }

    pub fn circle(&self, circle_id: Uuid) -> CoreResult<Circle> {
        self.store.circle(circle_id)
    }

    pub fn record_checkpoint(&self, input: NewCheckpoint) -> CoreResult<LedgerEvent> {
        ensure_within_limit(input.amount, "checkpoint")?;
        let payload = EventPayload::Checkpoint(Checkpoint {
            amount: input.amount,
            note: input
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
            diff_from_previous: None,
        });
        self.append(input.circle_id, input.user_id, input.at, payload)
    }

    pub fn record_debit(&self, input: NewDebit) -> CoreResult<LedgerEvent> {
        ensure_positive(input.amount, "debit")?;
        let payload = EventPayload::Debit(Debit {
            amount: input.amount,
            category: input.category,
            tags: normalize_tags(&input.tags),
            place: input.place,
        });
        self.append(input.circle_id, input.user_id, input.at, payload)
    }

    pub fn record_credit(&self, input: NewCredit) -> CoreResult<LedgerEvent> {
        ensure_positive(input.amount, "credit")?;
        let payload = EventPayload::Credit(Credit {
            amount: input.amount,
            category: input.category,
            tags: normalize_tags(&input.tags),
            source: input.source,
        });
        self.append(input.circle_id, input.user_id, input.at, payload)
    }

    /// Removes an event and applies the compensating cache updates.
    pub fn delete_event(&self, circle_id: Uuid, event_id: Uuid) -> CoreResult<LedgerEvent> {
        let mut removed: Option<LedgerEvent> = None;
        self.store.write_circle(circle_id, &mut |log: &mut CircleLog| {
            let event = log.remove_event(event_id)?;
            let update = balance_cache::on_delete(&log.events, &event);
            log.circle.current_balance = update.resolve(log.circle.current_balance, &log.events)?;
            if event.as_checkpoint().is_some() {
                checkpoint::refresh_diffs(&mut log.events);
            }
            if event.as_debit().is_some() {
                let month = YearMonth::from_date(event.date());
                let row = monthly::recompute_month(&log.events, circle_id, month);
                monthly::replace_month(&mut log.monthly, row);
            }
            removed = Some(event);
            Ok(())
        })?;
        let event = removed.ok_or(CoreError::EventNotFound(event_id))?;
        debug!(circle = %circle_id, event = %event.id, kind = %event.kind(), "deleted event");
        Ok(event)
    }

    fn append(
        &self,
        circle_id: Uuid,
        user_id: Uuid,
        at: Option<DateTime<Utc>>,
        payload: EventPayload,
    ) -> CoreResult<LedgerEvent> {
        let now = self.clock.now();
        let timestamp = at.unwrap_or(now);
        if timestamp > now {
            return Err(CoreError::Validation(format!(
                "event timestamp {timestamp} lies in the future"
            )));
        }

        let mut created: Option<LedgerEvent> = None;
        self.store.write_circle(circle_id, &mut |log: &mut CircleLog| {
            let sequence = log.allocate_sequence();
            let mut event = LedgerEvent::new(circle_id, user_id, timestamp, sequence, payload.clone());
            let order = event.order();
            if let EventPayload::Checkpoint(declared) = &mut event.payload {
                declared.diff_from_previous =
                    checkpoint::diff_from_previous(&log.events, &order, declared.amount);
            }

            let update = balance_cache::on_create(&log.events, &event);
            log.events.push(event.clone());
            log.circle.current_balance = update.resolve(log.circle.current_balance, &log.events)?;
            if event.as_checkpoint().is_some() {
                // A backdated checkpoint becomes the predecessor of a later one.
                checkpoint::refresh_diffs(&mut log.events);
            }
            monthly::record_debit(&mut log.monthly, &event);
            created = Some(event);
            Ok(())
        })?;

        let event = created.ok_or(CoreError::CircleNotFound(circle_id))?;
        debug!(
            circle = %circle_id,
            event = %event.id,
            kind = %event.kind(),
            sequence = event.sequence,
            "recorded event"
        );
        Ok(event)
    }

    /// Balance of the circle at `at` (inclusive), or after the full log when `None`.
    pub fn reconstruct_balance(&self, circle_id: Uuid, at: Option<DateTime<Utc>>) -> CoreResult<i64> {
        let events = self.circle_events(circle_id)?;
        let timeline = Timeline::new(&events);
        Ok(match at {
            Some(instant) => timeline.balance_at(instant),
            None => timeline.current_balance(),
        })
    }

    /// Every event of the circle (from `from`, if given) with its running balance.
    pub fn history(
        &self,
        circle_id: Uuid,
        from: Option<DateTime<Utc>>,
        seed: Option<i64>,
    ) -> CoreResult<Vec<BalancedEvent>> {
        let events = self.circle_events(circle_id)?;
        Ok(Timeline::new(&events)
            .reconstruct(from, seed)
            .into_iter()
            .map(|row| BalancedEvent {
                event: row.event.clone(),
                balance_after: row.balance_after,
            })
            .collect())
    }

    /// Period series for `mode` over `[window_start, window_end]`.
    pub fn aggregate_period(
        &self,
        mode: &AggregationMode,
        granularity: Granularity,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> CoreResult<PeriodSeries> {
        let circles: BTreeSet<Uuid> = match mode {
            AggregationMode::CircleBalance(circle_id) => [*circle_id].into_iter().collect(),
            AggregationMode::TotalBalance(circles) | AggregationMode::TagExpenseSum(circles) => {
                circles.clone()
            }
        };
        if window_start > window_end || circles.is_empty() {
            return Ok(match mode {
                AggregationMode::TagExpenseSum(_) => PeriodSeries::TagExpense(Vec::new()),
                _ => PeriodSeries::Balance(Vec::new()),
            });
        }
        let events = self.events_through(&circles, window_end)?;
        Ok(period::aggregate(&events, granularity, window_start, window_end, mode))
    }

    /// Balance series of one circle.
    pub fn balance_series(
        &self,
        circle_id: Uuid,
        granularity: Granularity,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> CoreResult<Vec<PeriodPoint>> {
        let mode = AggregationMode::CircleBalance(circle_id);
        match self.aggregate_period(&mode, granularity, window_start, window_end)? {
            PeriodSeries::Balance(points) => Ok(points),
            PeriodSeries::TagExpense(_) => Ok(Vec::new()),
        }
    }

    /// Sum of balance series over `circles`. Callers restrict `circles` to the ones the
    /// requesting member administers.
    pub fn total_balance_series(
        &self,
        circles: &BTreeSet<Uuid>,
        granularity: Granularity,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> CoreResult<Vec<PeriodPoint>> {
        let mode = AggregationMode::TotalBalance(circles.clone());
        match self.aggregate_period(&mode, granularity, window_start, window_end)? {
            PeriodSeries::Balance(points) => Ok(points),
            PeriodSeries::TagExpense(_) => Ok(Vec::new()),
        }
    }

    /// One balance series per circle, keyed by the labels of [`period::series_labels`].
    pub fn balance_series_by_circle(
        &self,
        circles: &BTreeSet<Uuid>,
        granularity: Granularity,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> CoreResult<Vec<MultiSeriesPoint>> {
        let selected = circles
            .iter()
            .map(|circle_id| self.store.circle(*circle_id))
            .collect::<CoreResult<Vec<Circle>>>()?;
        let mut named = Vec::with_capacity(selected.len());
        for (circle, label) in selected.iter().zip(period::series_labels(&selected)) {
            let points = self.balance_series(circle.id, granularity, window_start, window_end)?;
            named.push((label, points));
        }
        Ok(period::multi_series(&named))
    }

    pub fn paginate_feed(&self, request: &FeedRequest) -> CoreResult<FeedPage> {
        feed::paginate(&self.store, request, self.clock.now())
    }

    pub fn merge_feed_pages(&self, newer: &FeedPage, older: &FeedPage) -> FeedPage {
        feed::merge_pages(newer, older)
    }

    pub fn aggregate_tags(
        &self,
        circle_id: Uuid,
        month: Option<YearMonth>,
        top: Option<usize>,
    ) -> CoreResult<Vec<TagTotal>> {
        let events = self.circle_events(circle_id)?;
        Ok(tags::aggregate_tags(&events, month, top))
    }

    /// Cached debit totals for a month; an empty row when the month has no debits.
    pub fn monthly_aggregate(&self, circle_id: Uuid, month: YearMonth) -> CoreResult<MonthlyAggregate> {
        Ok(self
            .store
            .monthly_aggregates(circle_id)?
            .into_iter()
            .find(|row| row.month == month)
            .unwrap_or_else(|| MonthlyAggregate::empty(circle_id, month)))
    }

    pub fn reconcile(&self, circle_id: Uuid) -> CoreResult<ReconcileOutcome> {
        reconcile::reconcile_circle(&self.store, circle_id)
    }

    pub fn reconcile_all(&self) -> CoreResult<ReconcileReport> {
        reconcile::reconcile_all(&self.store)
    }

    fn circle_events(&self, circle_id: Uuid) -> CoreResult<Vec<LedgerEvent>> {
        // Surface unknown circles as errors instead of empty logs.
        self.store.circle(circle_id)?;
        self.store.list_events(&EventQuery::for_circle(circle_id))
    }

    fn events_through(&self, circles: &BTreeSet<Uuid>, window_end: NaiveDate) -> CoreResult<Vec<LedgerEvent>> {
        let bound = window_end
            .succ_opt()
            .map(start_of_day)
            .unwrap_or_else(|| start_of_day(window_end) + Duration::days(1));
        let query = EventQuery::new(circles.iter().copied()).before(Cursor::at(bound));
        self.store.list_events(&query)
    }
}

fn ensure_positive(amount: i64, kind: &str) -> CoreResult<()> {
    if amount <= 0 {
        return Err(CoreError::Validation(format!(
            "{kind} amount must be positive, got {amount}"
        )));
    }
    ensure_within_limit(amount, kind)
}

fn ensure_within_limit(amount: i64, kind: &str) -> CoreResult<()> {
    if amount.unsigned_abs() > MAX_AMOUNT.unsigned_abs() {
        return Err(CoreError::Validation(format!(
            "{kind} amount {amount} exceeds the limit of {MAX_AMOUNT} minor units"
        )));
    }
    Ok(())
}
