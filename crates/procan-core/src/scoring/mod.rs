//! Per-cycle interest scoring.
//!
//! [`update`] applies these rules, in order, to a matched record:
//!
//! 1. CPU streak: active in this and the previous sample extends the
//!    streak; idle in both applies a `5 * streak` penalty and clears it. A
//!    streak of 5 is a `proc` event worth +5.
//! 2. Virtual size: growth is a `mem` event worth +1, shrinkage costs 1.
//! 3. Resident size: same rule, reported as `rss`.
//! 4. Threshold: above it counts an interest event.
//! 5. Adaptive threshold: long quiet periods lower it to `score + 1`,
//!    sustained interest raises it to `score + 5`.

pub mod sink;

pub use sink::{NullSink, PipeSink, ScoreEvent, ScoreKind, ScoreSink, TraceSink};

use crate::history::ProcessHistory;
use procan_common::ProcessSnapshot;

/// Streak length that counts as sustained activity, and the threshold step.
pub const ADAPTIVE_THRESHOLD: u32 = 5;

/// Score added for a completed activity streak.
pub const PROC_REWARD: i64 = 5;

/// Score removed per streak cycle when a process goes idle.
pub const IDLE_PENALTY: i64 = 5;

/// Update a record from its snapshot entry.
pub fn update(
    record: &mut ProcessHistory,
    snapshot: &ProcessSnapshot,
    now: i64,
    sink: &mut dyn ScoreSink,
) {
    cpu_rule(record, snapshot.cpu_percent, sink);

    let size_delta = signed_delta(snapshot.vsize_bytes, record.last_vsize);
    memory_rule(record, ScoreKind::Mem, size_delta, sink);
    record.size_delta = size_delta;
    record.last_vsize = snapshot.vsize_bytes;

    let rss_delta = signed_delta(snapshot.rss_bytes, record.last_rss);
    memory_rule(record, ScoreKind::Rss, rss_delta, sink);
    record.rss_delta = rss_delta;
    record.last_rss = snapshot.rss_bytes;

    threshold_rule(record, now);
    adapt_threshold(record);

    record.times_measured += 1;
    record.last_measure_time = now;
}

fn cpu_rule(record: &mut ProcessHistory, cpu_percent: f64, sink: &mut dyn ScoreSink) {
    let active_now = cpu_percent > 0.0;
    let active_before = record.last_cpu_percent > 0.0;

    if active_now && active_before {
        record.active_streak += 1;
    } else if !active_now && !active_before {
        record.score -= IDLE_PENALTY * i64::from(record.active_streak);
        record.active_streak = 0;
    }

    if record.active_streak >= ADAPTIVE_THRESHOLD {
        adjust(record, ScoreKind::Proc, PROC_REWARD, sink);
        record.proc_events += 1;
        record.active_streak = 0;
    }

    record.last_cpu_percent = cpu_percent;
}

fn memory_rule(record: &mut ProcessHistory, kind: ScoreKind, delta: i64, sink: &mut dyn ScoreSink) {
    if delta > 0 {
        adjust(record, kind, 1, sink);
        record.mem_events += 1;
    } else if delta < 0 {
        adjust(record, kind, -1, sink);
    }
}

fn threshold_rule(record: &mut ProcessHistory, now: i64) {
    if record.score > record.threshold {
        record.ticks_above += 1;
        record.ticks_below = 0;
        record.interest_events += 1;
        record.hourly_interests += 1;
        record.last_interest_time = now;
    } else {
        record.ticks_below += 1;
        record.ticks_above = 0;
    }
}

fn adapt_threshold(record: &mut ProcessHistory) {
    if record.ticks_below > 2 * ADAPTIVE_THRESHOLD {
        record.threshold = record.score + 1;
        record.ticks_below = 0;
    }
    if record.ticks_above > ADAPTIVE_THRESHOLD {
        record.threshold = record.score + i64::from(ADAPTIVE_THRESHOLD);
        record.ticks_above = 0;
    }
}

fn adjust(record: &mut ProcessHistory, kind: ScoreKind, delta: i64, sink: &mut dyn ScoreSink) {
    record.score += delta;
    sink.record(&ScoreEvent {
        kind,
        command: &record.command,
        pid: record.pid,
        delta,
        score: record.score,
        interests: record.interest_events,
    });
}

/// `new - old` as a signed value, saturating at the `i64` range.
fn signed_delta(new: u64, old: u64) -> i64 {
    let magnitude = i64::try_from(new.abs_diff(old)).unwrap_or(i64::MAX);
    if new >= old {
        magnitude
    } else {
        -magnitude
    }
}
