//! Period aggregation for charts: per-bucket balances and tag expense sums.
//!
//! Buckets are generated from every calendar day (UTC) in the inclusive window so the
//! series covers the whole window even where no events exist. Balance modes record the
//! end-of-day balance and let later days overwrite earlier ones within a coarser bucket.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use circle_domain::{
    Circle, Granularity, LedgerEvent, MultiSeriesPoint, PeriodPoint, PeriodSeries, TagPoint,
};
use uuid::Uuid;

use crate::{
    reconstruct::{BalanceEffect, Timeline},
    tags::UNCATEGORIZED_TAG,
    time::start_of_day,
};

/// What an aggregation pass computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationMode {
    /// End-of-bucket balance of one circle.
    CircleBalance(Uuid),
    /// Sum of end-of-bucket balances over the given circles.
    TotalBalance(BTreeSet<Uuid>),
    /// Debit magnitudes per `(bucket, tag)` over the given circles.
    TagExpenseSum(BTreeSet<Uuid>),
}

/// Dispatches to the series builder for `mode`. An inverted window yields an empty series.
pub fn aggregate(
    events: &[LedgerEvent],
    granularity: Granularity,
    window_start: NaiveDate,
    window_end: NaiveDate,
    mode: &AggregationMode,
) -> PeriodSeries {
    match mode {
        AggregationMode::CircleBalance(circle_id) => {
            let scoped: Vec<&LedgerEvent> = events
                .iter()
                .filter(|event| event.circle_id == *circle_id)
                .collect();
            PeriodSeries::Balance(balance_series_of(
                Timeline::from_refs(scoped),
                granularity,
                window_start,
                window_end,
            ))
        }
        AggregationMode::TotalBalance(circles) => PeriodSeries::Balance(total_balance_series(
            events,
            granularity,
            window_start,
            window_end,
            circles,
        )),
        AggregationMode::TagExpenseSum(circles) => {
            let scoped: Vec<LedgerEvent> = events
                .iter()
                .filter(|event| circles.contains(&event.circle_id))
                .cloned()
                .collect();
            PeriodSeries::TagExpense(tag_expense_series(
                &scoped,
                granularity,
                window_start,
                window_end,
            ))
        }
    }
}

/// Every calendar day in `[start, end]`.
pub fn window_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let span = (end - start).num_days();
    (0..=span.max(-1)).map(move |offset| start + Duration::days(offset))
}

/// Distinct bucket keys covering the window, ascending.
pub fn bucket_keys(granularity: Granularity, start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let keys: BTreeSet<String> = window_days(start, end)
        .map(|day| granularity.bucket_key(day))
        .collect();
    keys.into_iter().collect()
}

/// End-of-bucket balances for events of a single circle.
pub fn balance_series(
    events: &[LedgerEvent],
    granularity: Granularity,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<PeriodPoint> {
    balance_series_of(Timeline::new(events), granularity, window_start, window_end)
}

fn balance_series_of(
    timeline: Timeline<'_, LedgerEvent>,
    granularity: Granularity,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<PeriodPoint> {
    if window_start > window_end {
        return Vec::new();
    }
    let first_instant = start_of_day(window_start);
    let mut running = timeline.balance_before(first_instant);
    let ordered = timeline.events();
    let mut cursor = ordered.partition_point(|event| event.timestamp < first_instant);

    let mut buckets: BTreeMap<String, i64> = BTreeMap::new();
    for day in window_days(window_start, window_end) {
        while let Some(event) = ordered.get(cursor) {
            if event.date() != day {
                break;
            }
            running = event.effect().apply(running);
            cursor += 1;
        }
        buckets.insert(granularity.bucket_key(day), running);
    }
    buckets
        .into_iter()
        .map(|(bucket_key, value)| PeriodPoint { bucket_key, value })
        .collect()
}

/// Per-bucket sum of the balance series of each circle in `circles`.
pub fn total_balance_series(
    events: &[LedgerEvent],
    granularity: Granularity,
    window_start: NaiveDate,
    window_end: NaiveDate,
    circles: &BTreeSet<Uuid>,
) -> Vec<PeriodPoint> {
    let mut totals: BTreeMap<String, i64> = bucket_keys(granularity, window_start, window_end)
        .into_iter()
        .map(|key| (key, 0))
        .collect();
    for circle_id in circles {
        let scoped = events.iter().filter(|event| event.circle_id == *circle_id);
        let series = balance_series_of(
            Timeline::from_refs(scoped),
            granularity,
            window_start,
            window_end,
        );
        for point in series {
            let total = totals.entry(point.bucket_key).or_insert(0);
            *total = total.saturating_add(point.value);
        }
    }
    totals
        .into_iter()
        .map(|(bucket_key, value)| PeriodPoint { bucket_key, value })
        .collect()
}

/// Debit magnitudes in the window keyed by `(bucket, tag)`; untagged debits count
/// towards [`UNCATEGORIZED_TAG`].
pub fn tag_expense_series(
    events: &[LedgerEvent],
    granularity: Granularity,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<TagPoint> {
    if window_start > window_end {
        return Vec::new();
    }
    let mut sums: BTreeMap<(String, String), i64> = BTreeMap::new();
    for event in events {
        let Some(debit) = event.as_debit() else {
            continue;
        };
        let day = event.date();
        if day < window_start || day > window_end {
            continue;
        }
        let bucket = granularity.bucket_key(day);
        if debit.tags.is_empty() {
            let sum = sums
                .entry((bucket, UNCATEGORIZED_TAG.to_string()))
                .or_insert(0);
            *sum = sum.saturating_add(debit.amount);
            continue;
        }
        for tag in &debit.tags {
            let sum = sums.entry((bucket.clone(), tag.clone())).or_insert(0);
            *sum = sum.saturating_add(debit.amount);
        }
    }
    sums.into_iter()
        .map(|((bucket_key, tag), value)| TagPoint {
            bucket_key,
            tag,
            value,
        })
        .collect()
}

/// Column key of the flattened multi-series row; no series label may take it.
pub const BUCKET_KEY_FIELD: &str = "bucketKey";

/// One series label per circle, in input order. A circle keeps its name unless another
/// circle in the set shares it or the name is [`BUCKET_KEY_FIELD`]; those get the short id
/// appended so every label stays distinct.
pub fn series_labels(circles: &[Circle]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for circle in circles {
        *counts.entry(circle.name.as_str()).or_default() += 1;
    }
    circles
        .iter()
        .map(|circle| {
            let shared = counts.get(circle.name.as_str()).copied().unwrap_or(0) > 1;
            if shared || circle.name == BUCKET_KEY_FIELD {
                let id = circle.id.simple().to_string();
                format!("{} #{}", circle.name, &id[..8])
            } else {
                circle.name.clone()
            }
        })
        .collect()
}

/// Joins named balance series that share bucket keys into `{bucketKey, name: value}` rows.
/// A bucket missing from one series carries that series' previous value.
pub fn multi_series(series: &[(String, Vec<PeriodPoint>)]) -> Vec<MultiSeriesPoint> {
    let keys: BTreeSet<&str> = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|point| point.bucket_key.as_str()))
        .collect();
    let lookups: Vec<(&str, BTreeMap<&str, i64>)> = series
        .iter()
        .map(|(name, points)| {
            let values = points
                .iter()
                .map(|point| (point.bucket_key.as_str(), point.value))
                .collect();
            (name.as_str(), values)
        })
        .collect();

    let mut carried: BTreeMap<&str, i64> = BTreeMap::new();
    keys.into_iter()
        .map(|key| {
            let mut row = BTreeMap::new();
            for (name, values) in &lookups {
                let value = values
                    .get(key)
                    .copied()
                    .or_else(|| carried.get(name).copied())
                    .unwrap_or(0);
                carried.insert(*name, value);
                row.insert((*name).to_string(), value);
            }
            MultiSeriesPoint {
                bucket_key: key.to_string(),
                series: row,
            }
        })
        .collect()
}
