use chrono::{NaiveDate, TimeZone, Utc};
use circle_ledger::{
    circle_core::{CircleLedger, FeedRequest, FixedClock, MemoryEventStore, NewCheckpoint, NewDebit},
    circle_domain::{DebitCategory, Granularity},
    init,
};
use uuid::Uuid;

#[test]
fn ledger_smoke() {
    init();

    let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
    let ledger = CircleLedger::with_clock(MemoryEventStore::new(), FixedClock::new(now));
    let circle = ledger.create_circle("Smoke", "eur").expect("circle");

    ledger
        .record_checkpoint(NewCheckpoint {
            circle_id: circle.id,
            user_id: Uuid::nil(),
            amount: 10_000,
            note: None,
            at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
        })
        .expect("checkpoint");
    ledger
        .record_debit(NewDebit {
            circle_id: circle.id,
            user_id: Uuid::nil(),
            amount: 2_500,
            category: DebitCategory::Food,
            tags: vec!["groceries".into()],
            place: None,
            at: Some(Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap()),
        })
        .expect("debit");

    assert_eq!(ledger.reconstruct_balance(circle.id, None).expect("balance"), 7_500);
    assert_eq!(ledger.circle(circle.id).expect("circle").current_balance, 7_500);

    let series = ledger
        .balance_series(
            circle.id,
            Granularity::Monthly,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
        .expect("series");
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].value, 7_500);

    let page = ledger
        .paginate_feed(&FeedRequest::new([circle.id], 10))
        .expect("feed");
    assert_eq!(page.items.len(), 2);
    assert!(!page.has_more);
    assert!(ledger.reconcile(circle.id).expect("reconcile").is_clean());
}
