//! Procan core library.
//!
//! This crate provides the process analysis engine:
//! - History table with bounded, reusable slots
//! - Per-cycle interest scoring with an adaptive threshold
//! - Hourly housekeeping decay and operator reset
//! - Top-N statistics for processes and users
//! - Backend dispatch (system log, mail, script) with deduplication
//! - The analyzer loop, its control channel, and the `/proc` collector

pub mod analyzer;
pub mod backend;
pub mod collect;
pub mod display;
pub mod exit_codes;
pub mod history;
pub mod housekeeping;
pub mod logging;
pub mod scoring;
pub mod stats;

pub use procan_common::{ProcessId, ProcessSnapshot, Uid};
pub use procan_config::Config;

/// Current UNIX time in whole seconds, the clock used by every cycle.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
