//! circle-core
//!
//! Balance reconstruction and timeline aggregation for shared circle ledgers.
//! Depends on circle-domain. No CLI, no terminal I/O; persistence goes through the
//! [`store::EventStore`] trait.

pub mod balance_cache;
pub mod checkpoint;
pub mod error;
pub mod feed;
pub mod ledger_service;
pub mod memory;
pub mod monthly;
pub mod period;
pub mod reconcile;
pub mod reconstruct;
pub mod store;
pub mod tags;
pub mod time;

pub use error::{CoreError, CoreResult};
pub use feed::{DiffSource, FeedRequest};
pub use ledger_service::{
    BalancedEvent, CircleLedger, NewCheckpoint, NewCredit, NewDebit, MAX_AMOUNT,
};
pub use memory::MemoryEventStore;
pub use period::{series_labels, AggregationMode};
pub use reconcile::{ReconcileOutcome, ReconcileReport};
pub use reconstruct::{balance_at, reconstruct, Annotated, BalanceEffect, Effect, Timeline};
pub use store::{CircleLog, EventQuery, EventStore};
pub use tags::{aggregate_tags, TagTotal, UNCATEGORIZED_TAG};
pub use time::{Clock, FixedClock, SystemClock};
