//! Cursor-based backward pagination over the merged event stream of one or more circles.
//!
//! Pages are ordered newest first by [`EventOrder`]. Balances on a page are reconstructed
//! from an anchor: the known-good balance of each circle immediately before its oldest item
//! on the page. Merging pages re-runs the reconstruction over the union from the oldest
//! anchor instead of trusting per-page values.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
};

use chrono::{DateTime, Utc};
use circle_domain::{
    Cursor, EventKind, EventOrder, FeedItem, FeedPage, KindFilter, LedgerEvent,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    checkpoint,
    reconstruct::{BalanceEffect, Timeline},
    store::{EventQuery, EventStore},
    CoreResult,
};

/// Where checkpoint diffs on a page come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffSource {
    /// The value cached on the checkpoint at write time.
    #[default]
    Cached,
    /// Recomputed by rescanning the circle's checkpoint list.
    Rescan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub circles: BTreeSet<Uuid>,
    pub cursor: Option<Cursor>,
    pub limit: usize,
    pub diff_source: DiffSource,
}

impl FeedRequest {
    pub fn new<I>(circles: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = Uuid>,
    {
        Self {
            circles: circles.into_iter().collect(),
            cursor: None,
            limit,
            diff_source: DiffSource::Cached,
        }
    }

    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn diff_source(mut self, source: DiffSource) -> Self {
        self.diff_source = source;
        self
    }
}

/// Fetches the page of events strictly before the request cursor (default `now`).
pub fn paginate(store: &dyn EventStore, request: &FeedRequest, now: DateTime<Utc>) -> CoreResult<FeedPage> {
    if request.circles.is_empty() || request.limit == 0 {
        return Ok(FeedPage::default());
    }
    let cursor = request.cursor.unwrap_or(Cursor::at(now));
    let query = EventQuery::new(request.circles.iter().copied())
        .before(cursor)
        .newest_first()
        .limit(request.limit + 1);
    let mut events = store.list_events(&query)?;
    let has_more = events.len() > request.limit;
    events.truncate(request.limit);
    if events.is_empty() {
        return Ok(FeedPage::default());
    }

    let mut anchors = BTreeMap::new();
    for (circle_id, oldest) in oldest_per_circle(&events) {
        anchors.insert(circle_id, anchor_balance(store, circle_id, &oldest)?);
    }

    let mut items: Vec<FeedItem> = events.iter().map(FeedItem::from_event).collect();
    annotate_balances(&mut items, &anchors);
    annotate_diffs(store, &events, &mut items, request.diff_source)?;

    let next_cursor = items.last().map(|item| Cursor::Event(item.order()));
    debug!(
        items = items.len(),
        has_more,
        cursor = %cursor,
        "paginated feed"
    );
    Ok(FeedPage {
        items,
        has_more,
        next_cursor,
        anchors,
    })
}

/// Balance of `circle_id` immediately before `before`: the latest checkpoint preceding it
/// plus the deltas between that checkpoint and `before`.
pub fn anchor_balance(store: &dyn EventStore, circle_id: Uuid, before: &EventOrder) -> CoreResult<i64> {
    let bound = Cursor::Event(*before);
    let latest = store.latest_checkpoint(circle_id, Some(&bound))?;
    let mut query = EventQuery::for_circle(circle_id)
        .kinds(KindFilter::deltas())
        .before(bound);
    if let Some(checkpoint) = &latest {
        query = query.after(Cursor::Event(checkpoint.order()));
    }
    let mut history = store.list_events(&query)?;
    history.extend(latest);
    Ok(Timeline::new(&history).current_balance())
}

/// Merges an older page into a newer one, re-annotating the de-duplicated union.
pub fn merge_pages(newer: &FeedPage, older: &FeedPage) -> FeedPage {
    let mut seen = HashSet::new();
    let mut items: Vec<FeedItem> = newer
        .items
        .iter()
        .chain(older.items.iter())
        .filter(|item| seen.insert(item.id))
        .cloned()
        .collect();
    items.sort_by_key(|item| Reverse(item.order()));

    let mut chosen: BTreeMap<Uuid, (EventOrder, i64)> = BTreeMap::new();
    for page in [newer, older] {
        for (circle_id, oldest) in oldest_per_circle(&page.items) {
            let Some(anchor) = page.anchors.get(&circle_id) else {
                continue;
            };
            let replace = chosen
                .get(&circle_id)
                .map_or(true, |(current, _)| oldest < *current);
            if replace {
                chosen.insert(circle_id, (oldest, *anchor));
            }
        }
    }
    let anchors: BTreeMap<Uuid, i64> = chosen
        .into_iter()
        .map(|(circle_id, (_, anchor))| (circle_id, anchor))
        .collect();
    annotate_balances(&mut items, &anchors);

    let tail = match (newer.items.last(), older.items.last()) {
        (Some(a), Some(b)) if a.order() < b.order() => newer,
        (Some(_), None) => newer,
        _ => older,
    };
    let next_cursor = items.last().map(|item| Cursor::Event(item.order()));
    FeedPage {
        items,
        has_more: tail.has_more,
        next_cursor,
        anchors,
    }
}

/// Sets `balance_after` on debits and credits by reconstructing each circle from its anchor.
pub fn annotate_balances(items: &mut [FeedItem], anchors: &BTreeMap<Uuid, i64>) {
    let mut balances: HashMap<Uuid, i64> = HashMap::new();
    for (circle_id, anchor) in anchors {
        let timeline = Timeline::from_refs(items.iter().filter(|item| item.circle_id == *circle_id));
        for row in timeline.reconstruct(None, Some(*anchor)) {
            balances.insert(row.event.id, row.balance_after);
        }
    }
    for item in items.iter_mut() {
        item.balance_after = match item.kind {
            EventKind::Checkpoint => None,
            EventKind::Debit | EventKind::Credit => balances.get(&item.id).copied(),
        };
    }
}

fn annotate_diffs(
    store: &dyn EventStore,
    events: &[LedgerEvent],
    items: &mut [FeedItem],
    source: DiffSource,
) -> CoreResult<()> {
    let mut rescanned: HashMap<Uuid, Vec<LedgerEvent>> = HashMap::new();
    for (event, item) in events.iter().zip(items.iter_mut()) {
        let Some(cached) = event.as_checkpoint() else {
            continue;
        };
        item.diff_from_previous = match source {
            DiffSource::Cached => cached.diff_from_previous,
            DiffSource::Rescan => {
                if !rescanned.contains_key(&event.circle_id) {
                    let query = EventQuery::for_circle(event.circle_id).only(EventKind::Checkpoint);
                    rescanned.insert(event.circle_id, store.list_events(&query)?);
                }
                rescanned
                    .get(&event.circle_id)
                    .and_then(|checkpoints| checkpoint::rescan_diff(checkpoints, event))
            }
        };
    }
    Ok(())
}

fn oldest_per_circle<T: BalanceEffect>(items: &[T]) -> BTreeMap<Uuid, EventOrder> {
    let mut oldest: BTreeMap<Uuid, EventOrder> = BTreeMap::new();
    for item in items {
        let order = item.order();
        oldest
            .entry(item.circle_id())
            .and_modify(|current| {
                if order < *current {
                    *current = order;
                }
            })
            .or_insert(order);
    }
    oldest
}
