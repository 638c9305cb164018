//! The analysis loop.
//!
//! One [`Analyzer`] owns the history table and the backend dispatcher. Each
//! cycle it:
//!
//! 1. scores the current snapshot list against the table,
//! 2. runs the dispatcher and disables every backend that failed,
//! 3. runs housekeeping once the hourly deadline has passed.
//!
//! Control messages (reload, reset, shutdown) are applied only between
//! cycles, so a running cycle always completes.

pub mod control;
pub mod service;

pub use control::{Control, SignalBridge};
pub use service::{RunSummary, Service};

use crate::backend::{BackendError, BackendKind, DispatchReport, Dispatcher};
use crate::collect::SnapshotBoard;
use crate::history::{read_table, write_table, HistoryTable, Lookup};
use crate::housekeeping::{self, HousekeepingSchedule};
use crate::scoring::{self, ScoreSink, TraceSink};
use procan_common::ProcessSnapshot;
use procan_config::Config;
use serde::Serialize;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Counts from one scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScorePass {
    pub matched: usize,
    pub created: usize,
    pub excluded: usize,
    /// Entries dropped because the table was full.
    pub dropped_full: usize,
}

/// Everything one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub scoring: ScorePass,
    pub dispatch: DispatchReport,
    /// Backends disabled at the end of this cycle.
    pub disabled: Vec<BackendKind>,
    /// Records decayed, when housekeeping ran.
    pub housekept: Option<usize>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

pub struct Analyzer {
    table: Arc<RwLock<HistoryTable>>,
    config: Arc<RwLock<Arc<Config>>>,
    dispatcher: Dispatcher,
    sink: Box<dyn ScoreSink + Send>,
    housekeeping: HousekeepingSchedule,
    cycles: u64,
    failures: Vec<BackendError>,
}

impl Analyzer {
    /// New analyzer whose first housekeeping pass is due an hour after `now`.
    pub fn new(config: Config, dispatcher: Dispatcher, now: i64) -> Self {
        Self {
            table: Arc::new(RwLock::new(HistoryTable::new())),
            config: Arc::new(RwLock::new(Arc::new(config))),
            dispatcher,
            sink: Box::new(TraceSink),
            housekeeping: HousekeepingSchedule::starting_at(now),
            cycles: 0,
            failures: Vec::new(),
        }
    }

    /// Route score events somewhere other than the debug log.
    pub fn with_sink(mut self, sink: Box<dyn ScoreSink + Send>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a table with a non-default capacity.
    pub fn with_table(mut self, table: HistoryTable) -> Self {
        self.table = Arc::new(RwLock::new(table));
        self
    }

    /// Shared handle for readers (display, statistics).
    pub fn table(&self) -> Arc<RwLock<HistoryTable>> {
        Arc::clone(&self.table)
    }

    pub fn config_handle(&self) -> Arc<RwLock<Arc<Config>>> {
        Arc::clone(&self.config)
    }

    /// Configuration in effect for the next cycle.
    pub fn config(&self) -> Arc<Config> {
        let guard = self.config.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn next_housekeeping(&self) -> i64 {
        self.housekeeping.next_due()
    }

    /// Why each disabled backend was disabled, in the order it happened.
    pub fn backend_failures(&self) -> &[BackendError] {
        &self.failures
    }

    /// The error a run ends with: the last backend failure once every
    /// configured backend has been disabled.
    pub fn exit_error(&self) -> Option<procan_common::Error> {
        if !self.dispatcher.is_exhausted() {
            return None;
        }
        self.failures.last().cloned().map(procan_common::Error::from)
    }

    /// Match every snapshot entry against the table and score matches.
    ///
    /// The table lock is taken per entry so readers can interleave.
    pub fn score(&mut self, snapshots: &[ProcessSnapshot], now: i64) -> ScorePass {
        let config = self.config();
        let mut pass = ScorePass::default();
        for snapshot in snapshots {
            let mut table = write_table(&self.table);
            match table.find_or_create(snapshot, &config.exclusions, now) {
                Lookup::Matched(id) => {
                    if let Some(record) = table.get_mut(id) {
                        scoring::update(record, snapshot, now, self.sink.as_mut());
                    }
                    pass.matched += 1;
                }
                Lookup::Created(_) => pass.created += 1,
                Lookup::Excluded => pass.excluded += 1,
                Lookup::Full => pass.dropped_full += 1,
            }
        }
        if pass.dropped_full > 0 {
            debug!(dropped = pass.dropped_full, "history table full, entries dropped");
        }
        pass
    }

    /// Dispatch, disable failed backends, and run housekeeping when due.
    pub fn finish_cycle(&mut self, scoring: ScorePass, now: i64) -> CycleReport {
        let config = self.config();
        let dispatch = self.dispatcher.dispatch(&self.table, &config, now);

        let mut disabled = Vec::new();
        for failure in dispatch.failures() {
            if self.dispatcher.disable(failure.kind()) {
                error!(
                    backend = %failure.kind(),
                    code = failure.code(),
                    reason = %failure,
                    "backend disabled"
                );
                disabled.push(failure.kind());
                self.failures.push(failure.clone());
            }
        }

        let housekept = if self.housekeeping.poll(now) {
            let decayed = housekeeping::decay(&mut write_table(&self.table), now);
            info!(decayed, next_due = self.housekeeping.next_due(), "housekeeping pass");
            Some(decayed)
        } else {
            None
        };

        self.cycles += 1;
        CycleReport {
            cycle: self.cycles,
            scoring,
            dispatch,
            disabled,
            housekept,
        }
    }

    /// One complete cycle over an already-acquired snapshot list.
    pub fn run_cycle(&mut self, snapshots: &[ProcessSnapshot], now: i64) -> CycleReport {
        let scoring = self.score(snapshots, now);
        self.finish_cycle(scoring, now)
    }

    /// Apply a control message. Returns false when the loop should stop.
    pub fn apply(&mut self, message: Control) -> bool {
        match message {
            Control::Reload(config) => {
                let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
                *guard = Arc::new(*config);
                info!("configuration reloaded");
                true
            }
            Control::Reset => {
                let cleared = housekeeping::reset(&mut write_table(&self.table));
                info!(records = cleared, "statistics reset");
                true
            }
            Control::Shutdown => false,
        }
    }

    /// Run cycles until a shutdown message arrives or every sender is gone.
    ///
    /// The snapshot lock is held only for the scoring pass; the loop then
    /// waits on `control` for the rest of the interval.
    pub fn run<C>(
        &mut self,
        board: &SnapshotBoard,
        control: &Receiver<Control>,
        interval: Duration,
        clock: C,
    ) where
        C: Fn() -> i64,
    {
        info!(interval_ms = interval.as_millis() as u64, "analyzer started");
        loop {
            let started = Instant::now();
            let now = clock();
            let scoring = {
                let snapshots = board.lock();
                self.score(&snapshots, now)
            };
            let report = self.finish_cycle(scoring, now);
            debug!(
                cycle = report.cycle,
                matched = report.scoring.matched,
                created = report.scoring.created,
                "cycle complete"
            );

            if !self.wait_for_control(control, started + interval) {
                break;
            }
        }
        info!(cycles = self.cycles, "analyzer stopped");
    }

    fn wait_for_control(&mut self, control: &Receiver<Control>, deadline: Instant) -> bool {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match control.recv_timeout(remaining) {
                Ok(message) => {
                    if !self.apply(message) {
                        return false;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

/// Snapshot of the table for read-only consumers.
pub fn snapshot_ranking(table: &RwLock<HistoryTable>) -> crate::stats::Ranking {
    crate::stats::rank(&read_table(table))
}
