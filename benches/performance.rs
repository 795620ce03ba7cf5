use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use circle_ledger::circle_core::{
    CircleLedger, EventStore, FeedRequest, FixedClock, MemoryEventStore, NewCheckpoint, NewDebit,
};
use circle_ledger::circle_domain::{DebitCategory, Granularity};
use circle_ledger::circle_storage_json::{load_log_from_path, save_log_to_path};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::tempdir;
use uuid::Uuid;

const TAGS: [&str; 4] = ["food", "rent", "travel", "fun"];

fn build_sample_ledger(event_count: usize) -> (CircleLedger<MemoryEventStore, FixedClock>, Uuid) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let clock = FixedClock::new(start + Duration::days(400));
    let ledger = CircleLedger::with_clock(MemoryEventStore::default(), clock);
    let circle = ledger.create_circle("Benchmark", "EUR").expect("circle");

    for idx in 0..event_count {
        let at = Some(start + Duration::hours(idx as i64 * 3));
        if idx % 50 == 0 {
            ledger
                .record_checkpoint(NewCheckpoint {
                    circle_id: circle.id,
                    user_id: Uuid::nil(),
                    amount: 100_000 + idx as i64,
                    note: None,
                    at,
                })
                .expect("checkpoint");
        } else {
            ledger
                .record_debit(NewDebit {
                    circle_id: circle.id,
                    user_id: Uuid::nil(),
                    amount: 100 + (idx % 900) as i64,
                    category: DebitCategory::Other,
                    tags: vec![TAGS[idx % TAGS.len()].to_string()],
                    place: None,
                    at,
                })
                .expect("debit");
        }
    }
    (ledger, circle.id)
}

fn bench_reconstruction(c: &mut Criterion) {
    let (ledger, circle_id) = build_sample_ledger(black_box(2_000));
    let midpoint = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

    c.bench_function("reconstruct_balance_2k", |b| {
        b.iter(|| black_box(ledger.reconstruct_balance(circle_id, Some(midpoint)).expect("balance")))
    });
    c.bench_function("history_2k", |b| {
        b.iter(|| black_box(ledger.history(circle_id, None, None).expect("history")))
    });
}

fn bench_aggregation(c: &mut Criterion) {
    let (ledger, circle_id) = build_sample_ledger(black_box(2_000));
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
    let circles: BTreeSet<Uuid> = [circle_id].into_iter().collect();

    c.bench_function("daily_balance_series_9_months", |b| {
        b.iter(|| {
            black_box(
                ledger
                    .balance_series(circle_id, Granularity::Daily, start, end)
                    .expect("series"),
            )
        })
    });
    c.bench_function("weekly_total_series_9_months", |b| {
        b.iter(|| {
            black_box(
                ledger
                    .total_balance_series(&circles, Granularity::Weekly, start, end)
                    .expect("series"),
            )
        })
    });
    c.bench_function("tag_totals_2k", |b| {
        b.iter(|| black_box(ledger.aggregate_tags(circle_id, None, Some(3)).expect("tags")))
    });
}

fn bench_feed(c: &mut Criterion) {
    let (ledger, circle_id) = build_sample_ledger(black_box(2_000));

    c.bench_function("feed_walk_pages_of_50", |b| {
        b.iter(|| {
            let mut request = FeedRequest::new([circle_id], 50);
            loop {
                let page = ledger.paginate_feed(&request).expect("page");
                match (page.has_more, page.next_cursor) {
                    (true, Some(cursor)) => request = request.cursor(cursor),
                    _ => break,
                }
            }
        })
    });
}

fn bench_json_io(c: &mut Criterion) {
    let (ledger, circle_id) = build_sample_ledger(black_box(2_000));
    let log = ledger.store().snapshot(circle_id).expect("snapshot");
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("circle.json");

    c.bench_function("circle_save_2k", |b| {
        b.iter(|| save_log_to_path(&log, &path).expect("save"))
    });

    save_log_to_path(&log, &path).expect("seed");
    c.bench_function("circle_load_2k", |b| {
        b.iter(|| black_box(load_log_from_path(&path).expect("load")))
    });
}

criterion_group!(
    benches,
    bench_reconstruction,
    bench_aggregation,
    bench_feed,
    bench_json_io
);
criterion_main!(benches);
