//! Thread wiring: one collector thread, one analyzer thread.

use super::{Analyzer, Control};
use crate::collect::{run_collector, SnapshotBoard, SnapshotSource};
use crate::history::HistoryTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// How a service run ended.
#[derive(Debug)]
pub struct RunSummary {
    pub cycles: u64,
    /// Set when every backend was disabled or the analyzer panicked.
    pub failure: Option<procan_common::Error>,
}

/// A running collector/analyzer pair.
pub struct Service {
    control: Sender<Control>,
    table: Arc<RwLock<HistoryTable>>,
    board: Arc<SnapshotBoard>,
    stop: Arc<AtomicBool>,
    collector: Option<JoinHandle<()>>,
    analyzer: Option<JoinHandle<RunSummary>>,
}

impl Service {
    /// Start both threads. The collector publishes every `interval`, and
    /// the analyzer runs one cycle per `interval`.
    pub fn start(
        mut analyzer: Analyzer,
        source: Box<dyn SnapshotSource>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let board = Arc::new(SnapshotBoard::new());
        let stop = Arc::new(AtomicBool::new(false));
        let table = analyzer.table();
        let (control, rx) = mpsc::channel();

        let collector = {
            let board = Arc::clone(&board);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("procan-collector".to_string())
                .spawn(move || run_collector(source, board, interval, stop))?
        };

        let analyzer_thread = {
            let board = Arc::clone(&board);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("procan-analyzer".to_string())
                .spawn(move || {
                    analyzer.run(&board, &rx, interval, crate::unix_now);
                    stop.store(true, Ordering::SeqCst);
                    RunSummary {
                        cycles: analyzer.cycles(),
                        failure: analyzer.exit_error(),
                    }
                })
        };
        let analyzer_thread = match analyzer_thread {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::SeqCst);
                let _ = collector.join();
                return Err(e);
            }
        };

        Ok(Self {
            control,
            table,
            board,
            stop,
            collector: Some(collector),
            analyzer: Some(analyzer_thread),
        })
    }

    /// Sender for reload/reset/shutdown requests.
    pub fn controller(&self) -> Sender<Control> {
        self.control.clone()
    }

    pub fn table(&self) -> Arc<RwLock<HistoryTable>> {
        Arc::clone(&self.table)
    }

    pub fn board(&self) -> Arc<SnapshotBoard> {
        Arc::clone(&self.board)
    }

    /// False once the analyzer thread has returned.
    pub fn is_running(&self) -> bool {
        self.analyzer.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the analyzer to stop after its current cycle.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    /// Wait for the analyzer to stop, then stop the collector.
    pub fn wait(mut self) -> RunSummary {
        let summary = match self.analyzer.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                warn!("analyzer thread panicked");
                RunSummary {
                    cycles: 0,
                    failure: Some(procan_common::Error::Internal(
                        "analyzer thread panicked".to_string(),
                    )),
                }
            }
            None => RunSummary {
                cycles: 0,
                failure: None,
            },
        };
        self.stop.store(true, Ordering::SeqCst);
        if let Some(collector) = self.collector.take() {
            if collector.join().is_err() {
                warn!("collector thread panicked");
            }
        }
        summary
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        if self.analyzer.is_some() {
            self.shutdown();
        }
        self.stop.store(true, Ordering::SeqCst);
    }
}
