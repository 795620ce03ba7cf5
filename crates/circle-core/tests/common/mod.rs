#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use circle_core::{
    CircleLedger, FixedClock, MemoryEventStore, NewCheckpoint, NewCredit, NewDebit,
};
use circle_domain::{CreditCategory, DebitCategory, LedgerEvent};
use uuid::Uuid;

pub type TestLedger = CircleLedger<MemoryEventStore, FixedClock>;

pub fn ts(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, 0, 0).unwrap()
}

/// Ledger over an in-memory store with the clock parked at the end of 2024.
pub fn ledger() -> TestLedger {
    CircleLedger::with_clock(MemoryEventStore::new(), FixedClock::new(ts(12, 31, 23)))
}

pub fn circle(ledger: &TestLedger, name: &str) -> Uuid {
    ledger.create_circle(name, "EUR").expect("create circle").id
}

pub fn checkpoint(ledger: &TestLedger, circle_id: Uuid, at: DateTime<Utc>, amount: i64) -> LedgerEvent {
    ledger
        .record_checkpoint(NewCheckpoint {
            circle_id,
            user_id: Uuid::nil(),
            amount,
            note: None,
            at: Some(at),
        })
        .expect("record checkpoint")
}

pub fn debit(ledger: &TestLedger, circle_id: Uuid, at: DateTime<Utc>, amount: i64, tags: &[&str]) -> LedgerEvent {
    ledger
        .record_debit(NewDebit {
            circle_id,
            user_id: Uuid::nil(),
            amount,
            category: DebitCategory::Other,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            place: None,
            at: Some(at),
        })
        .expect("record debit")
}

pub fn credit(ledger: &TestLedger, circle_id: Uuid, at: DateTime<Utc>, amount: i64) -> LedgerEvent {
    ledger
        .record_credit(NewCredit {
            circle_id,
            user_id: Uuid::nil(),
            amount,
            category: CreditCategory::Salary,
            tags: Vec::new(),
            source: None,
            at: Some(at),
        })
        .expect("record credit")
}

/// Small deterministic generator so interleaving tests are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound.max(1)
    }
}
