//! Point-in-time view of one running process.
//!
//! A collector publishes a full replacement list of these once per sampling
//! interval. The analyzer only reads them.

use crate::id::{ProcessId, Uid};
use serde::{Deserialize, Serialize};

/// Longest command name kept in a snapshot, in characters.
pub const COMMAND_MAX_LEN: usize = 24;

/// One entry of the collector's process list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: ProcessId,
    pub uid: Uid,
    /// Command name, at most [`COMMAND_MAX_LEN`] characters.
    pub command: String,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Virtual memory size in bytes.
    pub vsize_bytes: u64,
    /// CPU usage over the last sampling interval, in percent of one core.
    pub cpu_percent: f64,
    /// Seconds since the process started.
    pub age_secs: u64,
}

impl ProcessSnapshot {
    /// Create a snapshot with zeroed measurements. The command is truncated.
    pub fn new(pid: impl Into<ProcessId>, uid: impl Into<Uid>, command: &str) -> Self {
        Self {
            pid: pid.into(),
            uid: uid.into(),
            command: truncate_command(command),
            rss_bytes: 0,
            vsize_bytes: 0,
            cpu_percent: 0.0,
            age_secs: 0,
        }
    }

    pub fn with_memory(mut self, rss_bytes: u64, vsize_bytes: u64) -> Self {
        self.rss_bytes = rss_bytes;
        self.vsize_bytes = vsize_bytes;
        self
    }

    pub fn with_cpu(mut self, cpu_percent: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self
    }

    pub fn with_age(mut self, age_secs: u64) -> Self {
        self.age_secs = age_secs;
        self
    }
}

/// Truncate a command name to [`COMMAND_MAX_LEN`] characters on a char boundary.
pub fn truncate_command(command: &str) -> String {
    match command.char_indices().nth(COMMAND_MAX_LEN) {
        Some((idx, _)) => command[..idx].to_string(),
        None => command.to_string(),
    }
}
