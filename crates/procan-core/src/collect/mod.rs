//! Process snapshot collection.
//!
//! A [`SnapshotSource`] produces the full list of running processes. The
//! collector thread ([`run_collector`]) publishes each list into a
//! [`SnapshotBoard`], replacing the previous one wholesale; the analyzer
//! reads whatever list is current when its cycle starts.

mod linux;
pub mod proc_stat;

pub use linux::{clk_tck, page_size, ProcCollector};
pub use proc_stat::{parse_proc_stat_content, parse_status_uid, StatFields};

use procan_common::ProcessSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Step used when sleeping so a stop request is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error for pid {pid}: {message}")]
    Parse { pid: u32, message: String },

    #[error("process collection is not supported on {0}")]
    UnsupportedPlatform(&'static str),
}

impl CollectError {
    pub fn code(&self) -> u32 {
        match self {
            CollectError::Io { .. } => 20,
            CollectError::Parse { .. } => 22,
            CollectError::UnsupportedPlatform(_) => 70,
        }
    }
}

impl From<CollectError> for procan_common::Error {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::UnsupportedPlatform(os) => {
                procan_common::Error::UnsupportedPlatform(os.to_string())
            }
            other => procan_common::Error::Collection(other.to_string()),
        }
    }
}

/// Anything that can list the current processes.
pub trait SnapshotSource: Send {
    fn collect(&mut self) -> Result<Vec<ProcessSnapshot>, CollectError>;
}

/// Latest published process list.
#[derive(Debug, Default)]
pub struct SnapshotBoard {
    current: Mutex<Vec<ProcessSnapshot>>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current list.
    pub fn publish(&self, snapshots: Vec<ProcessSnapshot>) {
        *self.lock() = snapshots;
    }

    /// Hold the list for the duration of a scoring pass.
    pub fn lock(&self) -> MutexGuard<'_, Vec<ProcessSnapshot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Sleep up to `total`, returning early once `stop` is raised.
pub(crate) fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(STOP_POLL.min(deadline - now));
    }
}

/// Collector thread body: publish a fresh list every `interval` until
/// `stop` is raised. A failed collection leaves the previous list in place.
pub fn run_collector(
    mut source: Box<dyn SnapshotSource>,
    board: Arc<SnapshotBoard>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) {
    debug!(interval_ms = interval.as_millis() as u64, "collector started");
    while !stop.load(Ordering::SeqCst) {
        match source.collect() {
            Ok(list) => board.publish(list),
            Err(e) => warn!(error = %e, code = e.code(), "process collection failed"),
        }
        sleep_unless_stopped(interval, &stop);
    }
    debug!("collector stopped");
}
