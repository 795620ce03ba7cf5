use chrono::{Duration, Utc};
use circle_core::{
    CircleLedger, Clock, EventStore, FeedRequest, FixedClock, NewCheckpoint, NewDebit,
};
use circle_domain::DebitCategory;
use circle_storage_json::{JsonEventStore, StoragePaths};
use std::fs;
use tempfile::tempdir;
use uuid::Uuid;

fn clock() -> FixedClock {
    FixedClock::new(Utc::now())
}

#[test]
fn json_store_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());

    let (circle_id, spend_id) = {
        let store = JsonEventStore::open(paths.clone()).expect("open store");
        let ledger = CircleLedger::with_clock(store, clock());
        let circle = ledger.create_circle("Household", "eur").expect("circle");
        let at = ledger.clock().now() - Duration::hours(2);
        ledger
            .record_checkpoint(NewCheckpoint {
                circle_id: circle.id,
                user_id: Uuid::nil(),
                amount: 10_000,
                note: Some("opening".into()),
                at: Some(at),
            })
            .expect("checkpoint");
        let spend = ledger
            .record_debit(NewDebit {
                circle_id: circle.id,
                user_id: Uuid::nil(),
                amount: 2_500,
                category: DebitCategory::Food,
                tags: vec!["groceries".into()],
                place: Some("market".into()),
                at: None,
            })
            .expect("debit");
        (circle.id, spend.id)
    };

    let store = JsonEventStore::open(paths.clone()).expect("reopen store");
    assert!(store.circle_path(circle_id).exists());
    let ledger = CircleLedger::with_clock(store, clock());
    let circle = ledger.circle(circle_id).expect("circle after reopen");
    assert_eq!(circle.currency, "EUR");
    assert_eq!(circle.current_balance, 7_500);

    let page = ledger
        .paginate_feed(&FeedRequest::new([circle_id], 10))
        .expect("feed");
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, spend_id);
    assert_eq!(page.items[0].balance_after, Some(7_500));

    // Sequences continue after a reopen.
    let next = ledger
        .record_debit(NewDebit {
            circle_id,
            user_id: Uuid::nil(),
            amount: 500,
            category: DebitCategory::Other,
            tags: Vec::new(),
            place: None,
            at: None,
        })
        .expect("debit after reopen");
    assert_eq!(next.sequence, 3);
    assert!(ledger.reconcile(circle_id).expect("reconcile").is_clean());
}

#[test]
fn json_store_rotates_and_restores_backups() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());
    let store = JsonEventStore::with_retention(paths.clone(), 2).expect("open store");
    let ledger = CircleLedger::with_clock(store, clock());
    let circle = ledger.create_circle("Trip", "USD").expect("circle");

    ledger
        .record_checkpoint(NewCheckpoint {
            circle_id: circle.id,
            user_id: Uuid::nil(),
            amount: 300,
            note: None,
            at: None,
        })
        .expect("checkpoint");
    let info = ledger
        .store()
        .backup_circle(circle.id, Some("Before Spending"))
        .expect("backup");
    assert!(info.id.ends_with("_before-spending.json"));
    assert!(info.created_at.is_some());

    ledger
        .record_debit(NewDebit {
            circle_id: circle.id,
            user_id: Uuid::nil(),
            amount: 120,
            category: DebitCategory::Travel,
            tags: Vec::new(),
            place: None,
            at: None,
        })
        .expect("debit");
    assert_eq!(ledger.circle(circle.id).expect("circle").current_balance, 180);

    let backups = ledger.store().list_backups(circle.id).expect("list backups");
    assert!(!backups.is_empty());
    assert!(backups.len() <= 2);

    let restored = ledger.store().restore_backup(&info).expect("restore");
    assert_eq!(restored.events.len(), 1);
    assert_eq!(ledger.circle(circle.id).expect("circle").current_balance, 300);

    let reopened = JsonEventStore::open(paths).expect("reopen");
    assert_eq!(reopened.circle(circle.id).expect("circle").current_balance, 300);
}

#[test]
fn json_store_rejects_corrupt_documents() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());
    fs::create_dir_all(&paths.circle_root).expect("circle dir");
    fs::write(paths.circle_root.join("broken.json"), "{ not json").expect("write");

    let err = JsonEventStore::open(paths).expect_err("corrupt file must fail");
    assert!(err.to_string().contains("Serialization error"));
}
