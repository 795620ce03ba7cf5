#![doc(test(attr(deny(warnings))))]

//! Circle Ledger ties the circle core, JSON storage and configuration crates together
//! behind a scriptable command line.

pub mod cli;
pub mod errors;
pub mod utils;

pub use circle_config;
pub use circle_core;
pub use circle_domain;
pub use circle_storage_json;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Circle Ledger tracing initialized.");
    });
}
