//! Event store abstraction consumed by the core.

use std::collections::BTreeSet;

use circle_domain::{Circle, Cursor, EventKind, KindFilter, LedgerEvent, MonthlyAggregate, YearMonth};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Everything a store keeps for one circle. Units of work operate on a staged copy of
/// this record and commit it as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircleLog {
    pub circle: Circle,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
    #[serde(default)]
    pub monthly: Vec<MonthlyAggregate>,
    #[serde(default)]
    pub next_sequence: u64,
}

impl CircleLog {
    pub fn new(circle: Circle) -> Self {
        Self {
            circle,
            events: Vec::new(),
            monthly: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Hands out the next creation sequence number.
    pub fn allocate_sequence(&mut self) -> u64 {
        let floor = self
            .events
            .iter()
            .map(|event| event.sequence + 1)
            .max()
            .unwrap_or(1);
        let sequence = self.next_sequence.max(floor);
        self.next_sequence = sequence + 1;
        sequence
    }

    pub fn event(&self, id: Uuid) -> Option<&LedgerEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn remove_event(&mut self, id: Uuid) -> CoreResult<LedgerEvent> {
        let position = self
            .events
            .iter()
            .position(|event| event.id == id)
            .ok_or(CoreError::EventNotFound(id))?;
        Ok(self.events.remove(position))
    }

    pub fn monthly_aggregate(&self, month: YearMonth) -> Option<&MonthlyAggregate> {
        self.monthly.iter().find(|row| row.month == month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Filter over a store's events: circle set, kinds and exclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub circles: BTreeSet<Uuid>,
    pub kinds: KindFilter,
    pub after: Option<Cursor>,
    pub before: Option<Cursor>,
    pub direction: SortDirection,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new<I>(circles: I) -> Self
    where
        I: IntoIterator<Item = Uuid>,
    {
        Self {
            circles: circles.into_iter().collect(),
            kinds: KindFilter::all(),
            after: None,
            before: None,
            direction: SortDirection::OldestFirst,
            limit: None,
        }
    }

    pub fn for_circle(circle_id: Uuid) -> Self {
        Self::new([circle_id])
    }

    pub fn kinds(mut self, kinds: KindFilter) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn only(self, kind: EventKind) -> Self {
        self.kinds(KindFilter::only(kind))
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    pub fn before(mut self, cursor: Cursor) -> Self {
        self.before = Some(cursor);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.direction = SortDirection::NewestFirst;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let order = event.order();
        self.circles.contains(&event.circle_id)
            && self.kinds.contains(event.kind())
            && self.before.map_or(true, |cursor| cursor.is_after(&order))
            && self.after.map_or(true, |cursor| cursor.is_before(&order))
    }

    /// Filters, orders and truncates `events` according to the query.
    pub fn apply<'a, I>(&self, events: I) -> Vec<LedgerEvent>
    where
        I: IntoIterator<Item = &'a LedgerEvent>,
    {
        let mut selected: Vec<LedgerEvent> = events
            .into_iter()
            .filter(|event| self.matches(event))
            .cloned()
            .collect();
        match self.direction {
            SortDirection::OldestFirst => selected.sort_by_key(|event| event.order()),
            SortDirection::NewestFirst => {
                selected.sort_by_key(|event| std::cmp::Reverse(event.order()))
            }
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// A unit of work run against a staged [`CircleLog`]; returning an error discards it.
pub type CircleWork<'a> = dyn FnMut(&mut CircleLog) -> CoreResult<()> + 'a;

/// Persistence backend for circles and their event logs.
///
/// Writers to the same circle are serialized by the store and see their work committed
/// atomically. Reads return snapshots and never block on writers for long.
pub trait EventStore: Send + Sync {
    fn circles(&self) -> CoreResult<Vec<Circle>>;

    fn circle(&self, id: Uuid) -> CoreResult<Circle>;

    fn insert_circle(&self, circle: Circle) -> CoreResult<()>;

    fn list_events(&self, query: &EventQuery) -> CoreResult<Vec<LedgerEvent>>;

    /// Consistent copy of everything stored for a circle.
    fn snapshot(&self, circle_id: Uuid) -> CoreResult<CircleLog>;

    fn write_circle(&self, circle_id: Uuid, work: &mut CircleWork<'_>) -> CoreResult<()>;

    fn set_current_balance(&self, circle_id: Uuid, amount: i64) -> CoreResult<()> {
        self.write_circle(circle_id, &mut |log: &mut CircleLog| {
            log.circle.current_balance = amount;
            Ok(())
        })
    }

    /// Newest checkpoint of the circle strictly before `before`, or overall when `None`.
    fn latest_checkpoint(
        &self,
        circle_id: Uuid,
        before: Option<&Cursor>,
    ) -> CoreResult<Option<LedgerEvent>> {
        let mut query = EventQuery::for_circle(circle_id)
            .only(EventKind::Checkpoint)
            .newest_first()
            .limit(1);
        if let Some(cursor) = before {
            query = query.before(*cursor);
        }
        Ok(self.list_events(&query)?.into_iter().next())
    }

    fn monthly_aggregates(&self, circle_id: Uuid) -> CoreResult<Vec<MonthlyAggregate>> {
        Ok(self.snapshot(circle_id)?.monthly)
    }
}
