//! circle-domain
//!
//! Pure domain models for shared circle ledgers (circles, ledger events, period keys,
//! feed items). No I/O, no storage. Only data types and core enums.

pub mod circle;
pub mod event;
pub mod feed;
pub mod period;

pub use circle::*;
pub use event::*;
pub use feed::*;
pub use period::*;
