//! Per-process behavioral record.

use crate::backend::{BackendKind, NoticeLevel};
use procan_common::{ProcessId, ProcessSnapshot, Uid};
use serde::Serialize;

/// Threshold a fresh record starts with and housekeeping restores.
pub const DEFAULT_INTEREST_THRESHOLD: i64 = 5;

/// Warned/alarmed markers for one backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyFlags {
    pub warned: bool,
    pub alarmed: bool,
}

impl NotifyFlags {
    pub fn is_set(&self, level: NoticeLevel) -> bool {
        match level {
            NoticeLevel::Warning => self.warned,
            NoticeLevel::Alarm => self.alarmed,
        }
    }

    pub fn set(&mut self, level: NoticeLevel) {
        match level {
            NoticeLevel::Warning => self.warned = true,
            NoticeLevel::Alarm => self.alarmed = true,
        }
    }
}

/// Dedup flags for every backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendFlags {
    pub log: NotifyFlags,
    pub mail: NotifyFlags,
    pub script: NotifyFlags,
}

impl BackendFlags {
    pub fn get(&self, kind: BackendKind) -> NotifyFlags {
        match kind {
            BackendKind::Log => self.log,
            BackendKind::Mail => self.mail,
            BackendKind::Script => self.script,
        }
    }

    pub fn get_mut(&mut self, kind: BackendKind) -> &mut NotifyFlags {
        match kind {
            BackendKind::Log => &mut self.log,
            BackendKind::Mail => &mut self.mail,
            BackendKind::Script => &mut self.script,
        }
    }

    pub fn any_warned(&self) -> bool {
        self.log.warned || self.mail.warned || self.script.warned
    }

    pub fn any_alarmed(&self) -> bool {
        self.log.alarmed || self.mail.alarmed || self.script.alarmed
    }

    pub fn clear(&mut self) {
        *self = BackendFlags::default();
    }
}

/// Which kind of interest event dominates a record's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    ProcessLoad,
    MemoryUsage,
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cause::ProcessLoad => write!(f, "process load"),
            Cause::MemoryUsage => write!(f, "memory usage"),
        }
    }
}

/// Rolling history of one tracked process identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessHistory {
    // Identity
    pub command: String,
    pub pid: ProcessId,
    pub uid: Uid,

    // Measurement state
    pub last_cpu_percent: f64,
    pub last_vsize: u64,
    pub last_rss: u64,
    /// Consecutive cycles with CPU usage in this and the previous sample.
    pub active_streak: u32,
    pub size_delta: i64,
    pub rss_delta: i64,
    pub times_measured: u64,
    pub last_measure_time: i64,

    // Interest state
    pub score: i64,
    pub threshold: i64,
    pub ticks_above: u32,
    pub ticks_below: u32,
    /// Cumulative cycles spent above the threshold.
    pub interest_events: u64,
    /// Threshold crossings since the last housekeeping pass.
    pub hourly_interests: u64,
    pub proc_events: u64,
    pub mem_events: u64,
    pub last_interest_time: i64,

    pub flags: BackendFlags,
}

impl ProcessHistory {
    /// Start tracking a process seen for the first time.
    pub fn new(snapshot: &ProcessSnapshot, now: i64) -> Self {
        Self {
            command: snapshot.command.clone(),
            pid: snapshot.pid,
            uid: snapshot.uid,
            last_cpu_percent: snapshot.cpu_percent,
            last_vsize: snapshot.vsize_bytes,
            last_rss: snapshot.rss_bytes,
            active_streak: 0,
            size_delta: 0,
            rss_delta: 0,
            times_measured: 1,
            last_measure_time: now,
            score: 0,
            threshold: DEFAULT_INTEREST_THRESHOLD,
            ticks_above: 0,
            ticks_below: 0,
            interest_events: 0,
            hourly_interests: 0,
            proc_events: 0,
            mem_events: 0,
            last_interest_time: now,
            flags: BackendFlags::default(),
        }
    }

    /// True once the process has been missing from snapshots for over 30 seconds.
    pub fn is_stale(&self, now: i64) -> bool {
        self.last_measure_time < now - super::STALE_AFTER_SECS
    }

    pub fn cause(&self) -> Cause {
        if self.proc_events > self.mem_events {
            Cause::ProcessLoad
        } else {
            Cause::MemoryUsage
        }
    }
}
