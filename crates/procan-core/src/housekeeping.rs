//! Hourly decay and operator reset of the history table.
//!
//! - [`decay`] halves the score and interest count of records that have not
//!   been interesting for over an hour, and re-arms their notifications.
//! - [`reset`] zeroes interest state on every record unconditionally.

use crate::history::{HistoryTable, DEFAULT_INTEREST_THRESHOLD};

/// Seconds between housekeeping passes, and the quiet period that makes a
/// record eligible for decay.
pub const DECAY_INTERVAL_SECS: i64 = 3600;

/// Decay every record whose last interest event is over an hour old.
///
/// Returns the number of records decayed.
pub fn decay(table: &mut HistoryTable, now: i64) -> usize {
    let mut decayed = 0;
    for (_, rec) in table.iter_mut() {
        if rec.last_interest_time <= 0 || now - rec.last_interest_time <= DECAY_INTERVAL_SECS {
            continue;
        }
        if rec.score > 0 {
            rec.score /= 2;
        }
        if rec.interest_events > 0 {
            rec.interest_events /= 2;
        }
        rec.hourly_interests = 0;
        rec.threshold = DEFAULT_INTEREST_THRESHOLD;
        rec.proc_events = 0;
        rec.mem_events = 0;
        rec.flags.clear();
        rec.last_interest_time = now;
        decayed += 1;
    }
    decayed
}

/// Zero score, interest counts, and dedup flags on every record.
///
/// Returns the number of records touched.
pub fn reset(table: &mut HistoryTable) -> usize {
    let mut touched = 0;
    for (_, rec) in table.iter_mut() {
        rec.score = 0;
        rec.interest_events = 0;
        rec.hourly_interests = 0;
        rec.proc_events = 0;
        rec.mem_events = 0;
        rec.flags.clear();
        touched += 1;
    }
    touched
}

/// Deadline tracking for the hourly pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingSchedule {
    next_due: i64,
}

impl HousekeepingSchedule {
    /// First pass runs one interval after `start`.
    pub fn starting_at(start: i64) -> Self {
        Self {
            next_due: start + DECAY_INTERVAL_SECS,
        }
    }

    pub fn next_due(&self) -> i64 {
        self.next_due
    }

    /// True when a pass is due; advances the deadline if so.
    pub fn poll(&mut self, now: i64) -> bool {
        if now >= self.next_due {
            self.next_due = now + DECAY_INTERVAL_SECS;
            true
        } else {
            false
        }
    }
}
