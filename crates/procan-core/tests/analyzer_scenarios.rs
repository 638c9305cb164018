//! End-to-end analyzer scenarios with in-memory snapshots and fake channels.

use procan_core::analyzer::{Analyzer, Control};
use procan_core::backend::syslog::format_line;
use procan_core::backend::{BackendKind, Channel, DeliveryError, Dispatcher, Message};
use procan_core::history::{HistoryTable, MAX_TRACKED};
use procan_core::{Config, ProcessId, ProcessSnapshot};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

/// Records every line a log channel would have written.
#[derive(Clone)]
struct CapturingChannel {
    kind: BackendKind,
    lines: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<usize>>,
    fail: bool,
}

impl CapturingChannel {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            lines: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(0)),
            fail: false,
        }
    }

    fn failing(kind: BackendKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind)
        }
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Channel for CapturingChannel {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn deliver(&mut self, message: Message<'_>, _config: &Config) -> Result<(), DeliveryError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(DeliveryError::Channel("transport unavailable".to_string()));
        }
        self.lines.lock().unwrap().push(format_line(&message));
        Ok(())
    }
}

fn log_config(warn: u64, alarm: u64) -> Config {
    let mut config = Config::default();
    config.levels.warn = warn;
    config.levels.alarm = alarm;
    config.log.frequency_hours = 1;
    config
}

/// A process whose virtual and resident sizes grow every cycle.
fn growing(pid: u32, cycle: u64) -> ProcessSnapshot {
    let size = 1_000_000 + cycle * 4096;
    ProcessSnapshot::new(pid, 1000, "leaky").with_memory(size, size)
}

fn warnings(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with("WARNING:")).count()
}

#[test]
fn warning_emitted_once_until_reset() {
    let channel = CapturingChannel::new(BackendKind::Log);
    let dispatcher = Dispatcher::with_channels(vec![Box::new(channel.clone())]);
    let mut analyzer = Analyzer::new(log_config(3, 1_000), dispatcher, 0);

    // created on cycle 0, then +2 per cycle: above threshold from cycle 3,
    // interest count reaches 4 on cycle 6
    for cycle in 0..6 {
        analyzer.run_cycle(&[growing(7, cycle)], cycle as i64 + 1);
    }
    assert_eq!(warnings(&channel.lines()), 0);

    analyzer.run_cycle(&[growing(7, 6)], 7);
    let lines = channel.lines();
    assert_eq!(warnings(&lines), 1);
    assert_eq!(
        lines[0],
        "WARNING: leaky has triggered a warning for being too interesting (12)"
    );

    for cycle in 7..12 {
        analyzer.run_cycle(&[growing(7, cycle)], cycle as i64 + 1);
    }
    assert_eq!(warnings(&channel.lines()), 1);

    assert!(analyzer.apply(Control::Reset));
    {
        let table = analyzer.table();
        let table = table.read().unwrap();
        let record = table.get(table.find(ProcessId(7)).unwrap()).unwrap();
        assert!(!record.flags.log.warned);
        assert_eq!(record.interest_events, 0);
    }

    // count must climb past the warn level again before the next notice
    for cycle in 12..30 {
        analyzer.run_cycle(&[growing(7, cycle)], cycle as i64 + 1);
    }
    assert_eq!(warnings(&channel.lines()), 2);
}

#[test]
fn alarm_uses_alert_line() {
    let channel = CapturingChannel::new(BackendKind::Log);
    let dispatcher = Dispatcher::with_channels(vec![Box::new(channel.clone())]);
    let mut analyzer = Analyzer::new(log_config(1, 2), dispatcher, 0);
    for cycle in 0..10 {
        analyzer.run_cycle(&[growing(9, cycle)], cycle as i64 + 1);
    }
    let lines = channel.lines();
    assert_eq!(lines.iter().filter(|l| l.starts_with("ALERT: leaky")).count(), 1);
    assert_eq!(warnings(&lines), 1);
}

#[test]
fn failed_backend_never_invoked_again() {
    let broken = CapturingChannel::failing(BackendKind::Log);
    let healthy = CapturingChannel::new(BackendKind::Script);
    let dispatcher =
        Dispatcher::with_channels(vec![Box::new(broken.clone()), Box::new(healthy.clone())]);
    let mut config = log_config(1, 1_000);
    config.script.warn_script = "/bin/true".to_string();
    let mut analyzer = Analyzer::new(config, dispatcher, 0);

    let mut disabled = Vec::new();
    for cycle in 0..10 {
        let report = analyzer.run_cycle(&[growing(3, cycle)], cycle as i64 + 1);
        disabled.extend(report.disabled);
    }
    assert_eq!(disabled, vec![BackendKind::Log]);
    assert_eq!(broken.calls(), 1);
    assert_eq!(analyzer.dispatcher().active_kinds(), vec![BackendKind::Script]);
    assert_eq!(warnings(&healthy.lines()), 1);
}

#[test]
fn misconfigured_mail_disabled_on_first_cycle() {
    let mail = CapturingChannel::new(BackendKind::Mail);
    let dispatcher = Dispatcher::with_channels(vec![Box::new(mail.clone())]);
    let mut config = Config::default();
    config.mail.frequency_hours = 1;
    let mut analyzer = Analyzer::new(config, dispatcher, 0);

    let report = analyzer.run_cycle(&[], 1);
    assert_eq!(report.disabled, vec![BackendKind::Mail]);
    assert_eq!(mail.calls(), 0);
}

#[test]
fn digest_follows_log_frequency() {
    let channel = CapturingChannel::new(BackendKind::Log);
    let dispatcher = Dispatcher::with_channels(vec![Box::new(channel.clone())]);
    let mut analyzer = Analyzer::new(log_config(1_000, 1_000), dispatcher, 0);

    analyzer.run_cycle(&[], 100);
    analyzer.run_cycle(&[], 3_699);
    assert!(channel.lines().is_empty());
    analyzer.run_cycle(&[], 3_700);
    assert_eq!(channel.lines(), vec!["Interesting Processes: none"]);
}

#[test]
fn cpu_streak_scenario() {
    let mut analyzer = Analyzer::new(Config::default(), Dispatcher::default(), 0);
    let busy = ProcessSnapshot::new(11, 1000, "encoder").with_cpu(90.0);

    // first sighting only creates the record
    analyzer.run_cycle(&[busy.clone()], 1);
    for now in 2..=6 {
        analyzer.run_cycle(&[busy.clone()], now);
    }
    let table = analyzer.table();
    {
        let table = table.read().unwrap();
        let record = table.get(table.find(ProcessId(11)).unwrap()).unwrap();
        assert_eq!(record.score, 5);
        assert_eq!(record.active_streak, 0);
        assert_eq!(record.interest_events, 0);
    }

    analyzer.run_cycle(&[busy], 7);
    let table = table.read().unwrap();
    let record = table.get(table.find(ProcessId(11)).unwrap()).unwrap();
    assert_eq!(record.active_streak, 1);
    assert_eq!(record.score, 5);
}

#[test]
fn excluded_processes_never_tracked() {
    let mut config = Config::default();
    config.exclusions.uids = vec![0];
    config.exclusions.commands = vec!["kworker".to_string()];
    let mut analyzer = Analyzer::new(config, Dispatcher::default(), 0);
    let report = analyzer.run_cycle(
        &[
            ProcessSnapshot::new(1, 0, "init"),
            ProcessSnapshot::new(2, 1000, "kworker/1:0"),
            ProcessSnapshot::new(3, 1000, "nginx"),
        ],
        1,
    );
    assert_eq!(report.scoring.excluded, 2);
    assert_eq!(report.scoring.created, 1);
    assert_eq!(analyzer.table().read().unwrap().len(), 1);
}

#[test]
fn vanished_process_slot_reused_when_full() {
    let mut analyzer =
        Analyzer::new(Config::default(), Dispatcher::default(), 0).with_table(HistoryTable::with_capacity(2));
    analyzer.run_cycle(&[growing(1, 0), growing(2, 0)], 100);
    for now in 101..=135 {
        analyzer.run_cycle(&[growing(1, now as u64)], now);
    }
    let report = analyzer.run_cycle(&[growing(1, 200), growing(3, 0)], 136);
    assert_eq!(report.scoring.created, 1);
    assert_eq!(report.scoring.dropped_full, 0);

    let table = analyzer.table();
    let table = table.read().unwrap();
    assert!(table.find(ProcessId(2)).is_none());
    let record = table.get(table.find(ProcessId(3)).unwrap()).unwrap();
    assert_eq!(record.score, 0);
    assert_eq!(record.times_measured, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn live_records_never_exceed_capacity(
        batches in proptest::collection::vec(
            proptest::collection::vec(1u32..5_000, 0..700),
            1..4,
        )
    ) {
        let mut analyzer = Analyzer::new(Config::default(), Dispatcher::default(), 0);
        for (i, pids) in batches.iter().enumerate() {
            let snapshots: Vec<_> = pids
                .iter()
                .map(|pid| ProcessSnapshot::new(*pid, 1000, "p"))
                .collect();
            analyzer.run_cycle(&snapshots, 10 + i as i64 * 40);
            prop_assert!(analyzer.table().read().unwrap().len() <= MAX_TRACKED);
        }
    }
}
