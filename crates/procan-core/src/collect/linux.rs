//! `/proc` based snapshot source.

use super::proc_stat::{parse_boot_time, parse_proc_stat_content, parse_status_uid};
use super::{CollectError, SnapshotSource};
use procan_common::ProcessSnapshot;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// System clock ticks per second.
pub fn clk_tck() -> u64 {
    static CLK_TCK: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *CLK_TCK.get_or_init(|| {
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            tck as u64
        } else {
            100
        }
    })
}

/// Memory page size in bytes.
pub fn page_size() -> u64 {
    static PAGE_SIZE: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as u64
        } else {
            4096
        }
    })
}

/// Reads every numeric entry under a proc root.
///
/// CPU percentage is derived from the utime+stime delta between two
/// consecutive samples, so the first sample of any pid reports 0%.
#[derive(Debug)]
pub struct ProcCollector {
    root: PathBuf,
    include_kernel_threads: bool,
    clk_tck: u64,
    page_size: u64,
    boot_time: Option<i64>,
    previous_ticks: HashMap<u32, u64>,
    last_sample: Option<Instant>,
}

impl Default for ProcCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcCollector {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Collector reading from an alternate proc tree.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let boot_time = fs::read_to_string(root.join("stat"))
            .ok()
            .and_then(|content| parse_boot_time(&content));
        Self {
            root,
            include_kernel_threads: false,
            clk_tck: clk_tck(),
            page_size: page_size(),
            boot_time,
            previous_ticks: HashMap::new(),
            last_sample: None,
        }
    }

    /// Also report kernel threads (processes with no address space).
    pub fn include_kernel_threads(mut self, include: bool) -> Self {
        self.include_kernel_threads = include;
        self
    }

    fn read_process(
        &self,
        pid: u32,
        dir: &Path,
        elapsed_secs: Option<f64>,
        now: i64,
    ) -> Option<(ProcessSnapshot, u64)> {
        // A process may exit between listing and reading; skip it quietly.
        let stat_content = fs::read_to_string(dir.join("stat")).ok()?;
        let stat = parse_proc_stat_content(&stat_content, pid).ok()?;
        if stat.vsize == 0 && !self.include_kernel_threads {
            return None;
        }
        let uid = parse_status_uid(&fs::read_to_string(dir.join("status")).ok()?)?;

        let ticks = stat.total_ticks();
        let cpu_percent = match (self.previous_ticks.get(&pid), elapsed_secs) {
            (Some(prev), Some(elapsed)) if elapsed > 0.0 => {
                let delta = ticks.saturating_sub(*prev) as f64;
                delta / self.clk_tck as f64 / elapsed * 100.0
            }
            _ => 0.0,
        };
        let age_secs = self
            .boot_time
            .map(|btime| {
                let started = btime + (stat.starttime / self.clk_tck) as i64;
                (now - started).max(0) as u64
            })
            .unwrap_or(0);

        let snapshot = ProcessSnapshot::new(pid, uid, &stat.comm)
            .with_memory(stat.rss_pages.saturating_mul(self.page_size), stat.vsize)
            .with_cpu(cpu_percent)
            .with_age(age_secs);
        Some((snapshot, ticks))
    }
}

impl SnapshotSource for ProcCollector {
    #[cfg(target_os = "linux")]
    fn collect(&mut self) -> Result<Vec<ProcessSnapshot>, CollectError> {
        let entries = fs::read_dir(&self.root).map_err(|source| CollectError::Io {
            path: self.root.display().to_string(),
            source,
        })?;

        let sampled_at = Instant::now();
        let elapsed = self
            .last_sample
            .map(|last| sampled_at.duration_since(last).as_secs_f64());
        let now = crate::unix_now();

        let mut snapshots = Vec::new();
        let mut ticks = HashMap::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if let Some((snapshot, total)) = self.read_process(pid, &entry.path(), elapsed, now) {
                ticks.insert(pid, total);
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.pid);

        self.previous_ticks = ticks;
        self.last_sample = Some(sampled_at);
        Ok(snapshots)
    }

    #[cfg(not(target_os = "linux"))]
    fn collect(&mut self) -> Result<Vec<ProcessSnapshot>, CollectError> {
        Err(CollectError::UnsupportedPlatform(std::env::consts::OS))
    }
}
