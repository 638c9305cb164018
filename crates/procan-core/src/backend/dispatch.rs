//! Per-cycle backend driver.
//!
//! Every enabled kind does two independent things each cycle:
//!
//! - **Digest schedule.** On first use the kind is checked against the
//!   configuration and its deadline is armed. Afterwards a digest goes out
//!   whenever `now` reaches the deadline, and the deadline advances by the
//!   configured frequency.
//! - **Notices.** Records whose interest count exceeds the warn (or alarm)
//!   level and whose dedup flag for this kind is clear get one notice each.
//!
//! Notices are collected under a read lock, delivered with no lock held and
//! marked under a write lock, so channel I/O never blocks table readers.

use super::{
    check_config, digest_interval_secs, BackendError, BackendKind, Channel, DeliveryError,
    Message, Notice, NoticeLevel,
};
use crate::history::{read_table, write_table, HistoryTable, SlotId};
use crate::stats;
use procan_config::Config;
use serde::Serialize;
use std::sync::RwLock;
use tracing::{debug, info, warn};

struct BackendSlot {
    channel: Box<dyn Channel>,
    initialized: bool,
    deadline: Option<i64>,
    disabled: bool,
}

/// What one kind did during a dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendOutcome {
    pub kind: BackendKind,
    pub digest_sent: bool,
    pub warnings_sent: usize,
    pub alarms_sent: usize,
    pub record_failures: usize,
    /// Set when the kind must be disabled.
    pub failure: Option<BackendError>,
}

impl BackendOutcome {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            digest_sent: false,
            warnings_sent: 0,
            alarms_sent: 0,
            record_failures: 0,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<BackendOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &BackendError> {
        self.outcomes.iter().filter_map(|o| o.failure.as_ref())
    }

    pub fn outcome(&self, kind: BackendKind) -> Option<&BackendOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }
}

/// Owns the configured channels and their schedule state.
pub struct Dispatcher {
    slots: Vec<BackendSlot>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_channels(Vec::new())
    }
}

impl Dispatcher {
    /// Production channels for the given kinds.
    pub fn for_kinds(kinds: &[BackendKind]) -> Self {
        Self::with_channels(kinds.iter().map(|k| super::channel_for(*k)).collect())
    }

    /// Use the given channels. A kind appearing twice keeps its first channel.
    pub fn with_channels(channels: Vec<Box<dyn Channel>>) -> Self {
        let mut slots: Vec<BackendSlot> = Vec::with_capacity(channels.len());
        for channel in channels {
            if slots.iter().any(|s| s.channel.kind() == channel.kind()) {
                continue;
            }
            slots.push(BackendSlot {
                channel,
                initialized: false,
                deadline: None,
                disabled: false,
            });
        }
        Self { slots }
    }

    /// Kinds still enabled, in configuration order.
    pub fn active_kinds(&self) -> Vec<BackendKind> {
        self.slots
            .iter()
            .filter(|s| !s.disabled)
            .map(|s| s.channel.kind())
            .collect()
    }

    /// True when kinds were configured and every one has been disabled.
    pub fn is_exhausted(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|s| s.disabled)
    }

    pub fn is_disabled(&self, kind: BackendKind) -> bool {
        self.slots
            .iter()
            .any(|s| s.channel.kind() == kind && s.disabled)
    }

    /// Next digest deadline for a kind, once armed.
    pub fn deadline(&self, kind: BackendKind) -> Option<i64> {
        self.slots
            .iter()
            .find(|s| s.channel.kind() == kind)
            .and_then(|s| s.deadline)
    }

    /// Permanently stop using a kind. Returns false if it was already off.
    pub fn disable(&mut self, kind: BackendKind) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|s| s.channel.kind() == kind && !s.disabled)
        {
            Some(slot) => {
                slot.disabled = true;
                true
            }
            None => false,
        }
    }

    /// Run one dispatch pass over every enabled kind.
    pub fn dispatch(
        &mut self,
        table: &RwLock<HistoryTable>,
        config: &Config,
        now: i64,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for slot in self.slots.iter_mut().filter(|s| !s.disabled) {
            report.outcomes.push(run_slot(slot, table, config, now));
        }
        report
    }
}

fn run_slot(
    slot: &mut BackendSlot,
    table: &RwLock<HistoryTable>,
    config: &Config,
    now: i64,
) -> BackendOutcome {
    let kind = slot.channel.kind();
    let mut outcome = BackendOutcome::new(kind);

    // ------------------------------------------------------------------
    // Digest schedule
    // ------------------------------------------------------------------

    if !slot.initialized {
        if let Err(err) = check_config(kind, config) {
            outcome.failure = Some(err);
            return outcome;
        }
        slot.initialized = true;
        slot.deadline = digest_interval_secs(kind, config).map(|secs| now + secs);
        debug!(backend = %kind, deadline = ?slot.deadline, "backend armed");
    } else if slot.deadline.is_none() {
        // A reload may have turned the digest back on after it was set to 0.
        slot.deadline = digest_interval_secs(kind, config).map(|secs| now + secs);
        if slot.deadline.is_some() {
            debug!(backend = %kind, deadline = ?slot.deadline, "digest schedule re-armed");
        }
    } else if let Some(deadline) = slot.deadline {
        if now >= deadline {
            let ranking = stats::rank(&read_table(table));
            match slot.channel.deliver(Message::Digest(&ranking), config) {
                Ok(()) => {
                    outcome.digest_sent = true;
                    info!(backend = %kind, processes = ranking.processes.len(), "digest delivered");
                }
                Err(DeliveryError::Record(reason)) => {
                    outcome.record_failures += 1;
                    warn!(backend = %kind, %reason, "digest delivery failed");
                }
                Err(DeliveryError::Channel(reason)) => {
                    outcome.failure = Some(BackendError::ChannelFailed { kind, reason });
                    return outcome;
                }
            }
            slot.deadline = digest_interval_secs(kind, config).map(|secs| now + secs);
        }
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    let pending = pending_notices(&read_table(table), kind, config);
    let mut delivered: Vec<(SlotId, Notice)> = Vec::with_capacity(pending.len());
    for (id, notice) in pending {
        match slot.channel.deliver(Message::Notice(&notice), config) {
            Ok(()) => {
                info!(
                    backend = %kind,
                    level = %notice.level,
                    pid = %notice.pid,
                    command = %notice.command,
                    score = notice.score,
                    "notification delivered"
                );
                match notice.level {
                    NoticeLevel::Warning => outcome.warnings_sent += 1,
                    NoticeLevel::Alarm => outcome.alarms_sent += 1,
                }
                delivered.push((id, notice));
            }
            Err(DeliveryError::Record(reason)) => {
                outcome.record_failures += 1;
                warn!(
                    backend = %kind,
                    pid = %notice.pid,
                    command = %notice.command,
                    %reason,
                    "notification delivery failed"
                );
            }
            Err(DeliveryError::Channel(reason)) => {
                outcome.failure = Some(BackendError::ChannelFailed { kind, reason });
                break;
            }
        }
    }

    if !delivered.is_empty() {
        let mut table = write_table(table);
        for (id, notice) in &delivered {
            if let Some(rec) = table.get_mut(*id) {
                if rec.pid == notice.pid && rec.command == notice.command {
                    rec.flags.get_mut(kind).set(notice.level);
                }
            }
        }
    }

    outcome
}

/// Warnings first, then alarms, each in slot order.
fn pending_notices(
    table: &HistoryTable,
    kind: BackendKind,
    config: &Config,
) -> Vec<(SlotId, Notice)> {
    let mut pending = Vec::new();
    for level in [NoticeLevel::Warning, NoticeLevel::Alarm] {
        let limit = level.level(config);
        for (id, rec) in table.iter() {
            if rec.interest_events > limit && !rec.flags.get(kind).is_set(level) {
                pending.push((
                    id,
                    Notice {
                        level,
                        pid: rec.pid,
                        command: rec.command.clone(),
                        score: rec.score,
                        interests: rec.interest_events,
                    },
                ));
            }
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use procan_common::{ProcessId, ProcessSnapshot};
    use procan_config::Exclusions;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<String>>>,
        fail_with: Option<DeliveryError>,
    }

    struct FakeChannel {
        kind: BackendKind,
        recorder: Recorder,
    }

    impl Channel for FakeChannel {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn deliver(&mut self, message: Message<'_>, _config: &Config) -> Result<(), DeliveryError> {
            if let Some(err) = &self.recorder.fail_with {
                return Err(err.clone());
            }
            let line = match message {
                Message::Digest(r) => format!("digest:{}", r.processes.len()),
                Message::Notice(n) => format!("{}:{}", n.level, n.command),
            };
            self.recorder.sent.lock().unwrap().push(line);
            Ok(())
        }
    }

    fn fake(kind: BackendKind, recorder: &Recorder) -> Box<dyn Channel> {
        Box::new(FakeChannel {
            kind,
            recorder: recorder.clone(),
        })
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.levels.warn = 3;
        config.levels.alarm = 6;
        config.log.frequency_hours = 1;
        config
    }

    fn table_with(interests: &[(u32, &str, u64)]) -> RwLock<HistoryTable> {
        let mut table = HistoryTable::new();
        for (pid, command, n) in interests {
            let id = table
                .find_or_create(&ProcessSnapshot::new(*pid, 0, command), &Exclusions::default(), 0)
                .slot()
                .unwrap();
            table.get_mut(id).unwrap().interest_events = *n;
        }
        RwLock::new(table)
    }

    #[test]
    fn test_warning_sent_once() {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "httpd", 4)]);
        let config = config();

        let report = dispatcher.dispatch(&table, &config, 100);
        assert_eq!(report.outcome(BackendKind::Log).unwrap().warnings_sent, 1);
        let report = dispatcher.dispatch(&table, &config, 101);
        assert_eq!(report.outcome(BackendKind::Log).unwrap().warnings_sent, 0);

        assert_eq!(*recorder.sent.lock().unwrap(), vec!["warning:httpd"]);
        let table = table.read().unwrap();
        let rec = table.get(table.find(ProcessId(1)).unwrap()).unwrap();
        assert!(rec.flags.log.warned);
        assert!(!rec.flags.log.alarmed);
    }

    #[test]
    fn test_level_comparison_is_strict() {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "a", 3), (2, "b", 7)]);
        dispatcher.dispatch(&table, &config(), 100);
        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec!["warning:b", "alarm:b"]
        );
    }

    #[test]
    fn test_digest_schedule() {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "a", 1)]);
        let config = config();

        let report = dispatcher.dispatch(&table, &config, 1_000);
        assert!(!report.outcomes[0].digest_sent);
        assert_eq!(dispatcher.deadline(BackendKind::Log), Some(4_600));

        assert!(!dispatcher.dispatch(&table, &config, 4_599).outcomes[0].digest_sent);
        assert!(dispatcher.dispatch(&table, &config, 4_600).outcomes[0].digest_sent);
        assert_eq!(dispatcher.deadline(BackendKind::Log), Some(8_200));
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["digest:1"]);
    }

    #[test]
    fn test_digest_rearmed_after_frequency_restored() {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "a", 1)]);
        let mut config = config();

        dispatcher.dispatch(&table, &config, 1_000);
        assert_eq!(dispatcher.deadline(BackendKind::Log), Some(4_600));

        // frequency reloaded to 0: the due digest goes out, then no schedule
        config.log.frequency_hours = 0;
        assert!(dispatcher.dispatch(&table, &config, 4_600).outcomes[0].digest_sent);
        assert_eq!(dispatcher.deadline(BackendKind::Log), None);
        assert!(!dispatcher.dispatch(&table, &config, 9_000).outcomes[0].digest_sent);
        assert_eq!(dispatcher.deadline(BackendKind::Log), None);

        config.log.frequency_hours = 2;
        let report = dispatcher.dispatch(&table, &config, 10_000);
        assert!(!report.outcomes[0].digest_sent);
        assert!(report.failures().next().is_none());
        assert_eq!(dispatcher.deadline(BackendKind::Log), Some(17_200));
        assert!(dispatcher.dispatch(&table, &config, 17_200).outcomes[0].digest_sent);
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["digest:1", "digest:1"]);
    }

    #[test]
    fn test_misconfigured_kind_reports_failure() {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Mail, &recorder)]);
        let table = table_with(&[(1, "a", 9)]);
        let report = dispatcher.dispatch(&table, &config(), 100);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.code(), 31);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channel_failure_and_disable() {
        let recorder = Recorder {
            fail_with: Some(DeliveryError::Channel("gone".to_string())),
            ..Recorder::default()
        };
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "a", 9)]);
        let report = dispatcher.dispatch(&table, &config(), 100);
        assert_eq!(report.failures().count(), 1);

        assert!(dispatcher.disable(BackendKind::Log));
        assert!(!dispatcher.disable(BackendKind::Log));
        assert!(dispatcher.is_disabled(BackendKind::Log));
        assert!(dispatcher.active_kinds().is_empty());
        assert!(dispatcher.is_exhausted());
        assert!(!Dispatcher::default().is_exhausted());
        assert!(dispatcher.dispatch(&table, &config(), 101).outcomes.is_empty());
    }

    #[test]
    fn test_record_failure_keeps_backend_and_flag_clear() {
        let recorder = Recorder {
            fail_with: Some(DeliveryError::Record("bounced".to_string())),
            ..Recorder::default()
        };
        let mut dispatcher = Dispatcher::with_channels(vec![fake(BackendKind::Log, &recorder)]);
        let table = table_with(&[(1, "a", 4)]);
        let report = dispatcher.dispatch(&table, &config(), 100);
        let outcome = report.outcome(BackendKind::Log).unwrap();
        assert_eq!(outcome.record_failures, 1);
        assert!(outcome.failure.is_none());
        assert!(!table.read().unwrap().iter().next().unwrap().1.flags.log.warned);
    }

    #[test]
    fn test_duplicate_kinds_collapse() {
        let recorder = Recorder::default();
        let dispatcher = Dispatcher::with_channels(vec![
            fake(BackendKind::Log, &recorder),
            fake(BackendKind::Script, &recorder),
            fake(BackendKind::Log, &recorder),
        ]);
        assert_eq!(
            dispatcher.active_kinds(),
            vec![BackendKind::Log, BackendKind::Script]
        );
    }

    #[test]
    fn test_flags_are_per_backend() {
        let log = Recorder::default();
        let script = Recorder::default();
        let mut dispatcher = Dispatcher::with_channels(vec![
            fake(BackendKind::Log, &log),
            fake(BackendKind::Script, &script),
        ]);
        let mut config = config();
        config.script.warn_script = "/bin/true".to_string();
        let table = table_with(&[(1, "a", 4)]);
        dispatcher.dispatch(&table, &config, 100);

        let table = table.read().unwrap();
        let flags = table.iter().next().unwrap().1.flags;
        assert!(flags.log.warned);
        assert!(flags.script.warned);
        assert!(!flags.mail.warned);
    }
}
