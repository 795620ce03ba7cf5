mod common;

use std::collections::HashSet;

use circle_core::{DiffSource, FeedRequest};
use circle_domain::{Cursor, EventKind, FeedItem};
use common::{checkpoint, circle, credit, debit, ledger, ts};
use uuid::Uuid;

fn ids(items: &[FeedItem]) -> Vec<Uuid> {
    items.iter().map(|item| item.id).collect()
}

#[test]
fn cursor_excludes_its_own_timestamp() {
    let ledger = ledger();
    let wallet = circle(&ledger, "Wallet");
    let e1 = checkpoint(&ledger, wallet, ts(1, 1, 9), 1_000);
    let e2 = debit(&ledger, wallet, ts(1, 2, 9), 100, &[]);
    let e3 = credit(&ledger, wallet, ts(1, 3, 9), 50);
    let e4 = debit(&ledger, wallet, ts(1, 4, 9), 200, &[]);
    let e5 = debit(&ledger, wallet, ts(1, 5, 9), 30, &[]);

    let page = ledger
        .paginate_feed(&FeedRequest::new([wallet], 2).cursor(Cursor::at(e3.timestamp)))
        .expect("page before e3");
    assert_eq!(ids(&page.items), vec![e2.id, e1.id]);
    assert!(!page.has_more);

    let first = ledger
        .paginate_feed(&FeedRequest::new([wallet], 2))
        .expect("first page");
    assert_eq!(ids(&first.items), vec![e5.id, e4.id]);
    assert!(first.has_more);
    assert_eq!(first.anchors.get(&wallet), Some(&950));
    assert_eq!(first.items[0].balance_after, Some(720));
    assert_eq!(first.items[1].balance_after, Some(750));
    assert_eq!(first.next_cursor, Some(Cursor::Event(e4.order())));
}

#[test]
fn checkpoints_carry_diff_but_no_balance() {
    let ledger = ledger();
    let wallet = circle(&ledger, "Wallet");
    checkpoint(&ledger, wallet, ts(2, 1, 9), 1_000);
    debit(&ledger, wallet, ts(2, 2, 9), 400, &[]);
    let second = checkpoint(&ledger, wallet, ts(2, 3, 9), 700);

    let page = ledger
        .paginate_feed(&FeedRequest::new([wallet], 10))
        .expect("page");
    let item = page
        .items
        .iter()
        .find(|item| item.id == second.id)
        .expect("checkpoint on page");
    assert_eq!(item.kind, EventKind::Checkpoint);
    assert_eq!(item.balance_after, None);
    assert_eq!(item.diff_from_previous, Some(-300));
    assert_eq!(item.amount, 700);
    let spend = page
        .items
        .iter()
        .find(|item| item.kind == EventKind::Debit)
        .expect("debit on page");
    assert_eq!(spend.amount, -400);
    assert_eq!(spend.balance_after, Some(600));
}

#[test]
fn tied_timestamps_page_without_gaps_or_duplicates() {
    let ledger = ledger();
    let wallet = circle(&ledger, "Wallet");
    let instant = ts(3, 1, 12);
    let mut created = vec![checkpoint(&ledger, wallet, instant, 500).id];
    for amount in 1..=6 {
        created.push(debit(&ledger, wallet, instant, amount * 10, &[]).id);
    }

    let mut seen = Vec::new();
    let mut request = FeedRequest::new([wallet], 3);
    loop {
        let page = ledger.paginate_feed(&request).expect("page");
        seen.extend(ids(&page.items));
        match (page.has_more, page.next_cursor) {
            (true, Some(cursor)) => request = request.cursor(cursor),
            _ => break,
        }
    }

    assert_eq!(seen.len(), created.len());
    let unique: HashSet<Uuid> = seen.iter().copied().collect();
    assert_eq!(unique.len(), created.len());
    created.reverse();
    assert_eq!(seen, created, "ties order by creation sequence, newest first");
}

#[test]
fn merged_pages_match_a_single_pass() {
    let ledger = ledger();
    let home = circle(&ledger, "Home");
    let trip = circle(&ledger, "Trip");
    checkpoint(&ledger, home, ts(4, 1, 8), 2_000);
    checkpoint(&ledger, trip, ts(4, 1, 9), 300);
    for day in 2..=9 {
        debit(&ledger, home, ts(4, day, 10), 25 * i64::from(day), &["groceries"]);
        credit(&ledger, trip, ts(4, day, 11), 15);
        if day == 5 {
            checkpoint(&ledger, home, ts(4, day, 12), 1_500);
        }
    }

    let full = ledger
        .paginate_feed(&FeedRequest::new([home, trip], 100))
        .expect("full page");
    assert!(!full.has_more);

    let newer = ledger
        .paginate_feed(&FeedRequest::new([home, trip], 7))
        .expect("newer page");
    let cursor = newer.next_cursor.expect("cursor");
    let older = ledger
        .paginate_feed(&FeedRequest::new([home, trip], 7).cursor(cursor))
        .expect("older page");

    let merged = ledger.merge_feed_pages(&newer, &older);
    let full_prefix: Vec<FeedItem> = full.items[..merged.items.len()].to_vec();
    assert_eq!(merged.items, full_prefix);
    assert_eq!(merged.has_more, older.has_more);

    // Merging is insensitive to argument order and to overlap.
    let swapped = ledger.merge_feed_pages(&older, &newer);
    assert_eq!(swapped.items, merged.items);
    let overlapping = ledger.merge_feed_pages(&merged, &older);
    assert_eq!(overlapping.items, merged.items);
}

#[test]
fn cached_and_rescanned_diffs_agree() {
    let ledger = ledger();
    let wallet = circle(&ledger, "Wallet");
    checkpoint(&ledger, wallet, ts(5, 1, 9), 1_000);
    checkpoint(&ledger, wallet, ts(5, 10, 9), 1_200);
    debit(&ledger, wallet, ts(5, 11, 9), 80, &[]);
    // Backdated between the two: becomes the predecessor of the later one.
    checkpoint(&ledger, wallet, ts(5, 5, 9), 900);
    let removed = checkpoint(&ledger, wallet, ts(5, 7, 9), 950);
    ledger
        .delete_event(wallet, removed.id)
        .expect("delete checkpoint");

    let cached = ledger
        .paginate_feed(&FeedRequest::new([wallet], 20))
        .expect("cached");
    let rescanned = ledger
        .paginate_feed(&FeedRequest::new([wallet], 20).diff_source(DiffSource::Rescan))
        .expect("rescanned");
    assert_eq!(cached.items, rescanned.items);

    let diffs: Vec<Option<i64>> = cached
        .items
        .iter()
        .filter(|item| item.kind == EventKind::Checkpoint)
        .map(|item| item.diff_from_previous)
        .collect();
    assert_eq!(diffs, vec![Some(300), Some(-100), None]);
}

#[test]
fn empty_scope_and_zero_limit_yield_empty_pages() {
    let ledger = ledger();
    let wallet = circle(&ledger, "Wallet");
    debit(&ledger, wallet, ts(6, 1, 9), 10, &[]);

    let nothing = ledger
        .paginate_feed(&FeedRequest::new(Vec::<Uuid>::new(), 5))
        .expect("empty scope");
    assert!(nothing.is_empty());
    assert!(!nothing.has_more);

    let zero = ledger
        .paginate_feed(&FeedRequest::new([wallet], 0))
        .expect("zero limit");
    assert!(zero.is_empty());

    let before_everything = ledger
        .paginate_feed(&FeedRequest::new([wallet], 5).cursor(Cursor::at(ts(1, 1, 0))))
        .expect("before history");
    assert!(before_everything.is_empty());
    assert_eq!(before_everything.next_cursor, None);
}
