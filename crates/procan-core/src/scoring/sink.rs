//! Observers for individual score changes.
//!
//! Pipe mode writes one machine-readable tuple per change to stdout:
//!
//! ```text
//! [mem,nginx,1234,+1,6,0]
//! [rss,nginx,1234,-1,5,0]
//! [proc,make,4321,+5,5,0]
//! ```

use procan_common::ProcessId;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Kind of score change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Sustained CPU activity.
    Proc,
    /// Virtual memory size change.
    Mem,
    /// Resident memory size change.
    Rss,
}

impl ScoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreKind::Proc => "proc",
            ScoreKind::Mem => "mem",
            ScoreKind::Rss => "rss",
        }
    }
}

/// A single score change on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreEvent<'a> {
    pub kind: ScoreKind,
    pub command: &'a str,
    pub pid: ProcessId,
    pub delta: i64,
    /// Score after the change.
    pub score: i64,
    /// Cumulative interest-event count at the time of the change.
    pub interests: u64,
}

impl fmt::Display for ScoreEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{:+},{},{}]",
            self.kind.as_str(),
            self.command,
            self.pid,
            self.delta,
            self.score,
            self.interests
        )
    }
}

/// Receives score changes. Implementations must not block or fail the cycle.
pub trait ScoreSink {
    fn record(&mut self, event: &ScoreEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ScoreSink for NullSink {
    fn record(&mut self, _event: &ScoreEvent<'_>) {}
}

/// Emits each event as a `debug` trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceSink;

impl ScoreSink for TraceSink {
    fn record(&mut self, event: &ScoreEvent<'_>) {
        tracing::debug!(
            target: "procan_core::scoring",
            kind = event.kind.as_str(),
            command = event.command,
            pid = %event.pid,
            delta = event.delta,
            score = event.score,
            interests = event.interests,
            "score changed"
        );
    }
}

/// Writes one tuple per line to a writer, flushing after each event.
#[derive(Debug)]
pub struct PipeSink<W: Write> {
    out: W,
}

impl<W: Write> PipeSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl PipeSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ScoreSink for PipeSink<W> {
    fn record(&mut self, event: &ScoreEvent<'_>) {
        // A closed reader must not stall scoring.
        let _ = writeln!(self.out, "{}", event).and_then(|_| self.out.flush());
    }
}
