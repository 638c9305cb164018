//! Bounded registry of per-process history records.
//!
//! Records live in a fixed-capacity arena addressed by [`SlotId`]. A record
//! is never removed: once its process has been absent for more than
//! [`STALE_AFTER_SECS`] its slot may be overwritten by a new identity.
//! Slot selection is [`choose_slot`]:
//!
//! 1. the first stale slot, else
//! 2. a new slot while below capacity, else
//! 3. nothing (the snapshot entry is dropped for this cycle).

pub mod record;

pub use record::{BackendFlags, Cause, NotifyFlags, ProcessHistory, DEFAULT_INTEREST_THRESHOLD};

use procan_common::{ProcessId, ProcessSnapshot};
use procan_config::Exclusions;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Maximum number of records the table holds.
pub const MAX_TRACKED: usize = 500;

/// Seconds without a matching snapshot after which a slot may be reused.
pub const STALE_AFTER_SECS: i64 = 30;

/// Opaque handle to a table slot. Stable for the lifetime of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a new record should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
    /// Overwrite this stale slot.
    Reuse(SlotId),
    /// Push a new slot.
    Append,
    /// Table is full of live records.
    Full,
}

/// Pick a slot for a new record.
pub fn choose_slot(records: &[ProcessHistory], capacity: usize, now: i64) -> SlotChoice {
    if let Some(idx) = records.iter().position(|rec| rec.is_stale(now)) {
        return SlotChoice::Reuse(SlotId(idx));
    }
    if records.len() < capacity {
        SlotChoice::Append
    } else {
        SlotChoice::Full
    }
}

/// Outcome of [`HistoryTable::find_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// An existing record tracks this process.
    Matched(SlotId),
    /// A fresh record was initialized from the snapshot.
    Created(SlotId),
    /// Uid or command is excluded by configuration.
    Excluded,
    /// No slot was available.
    Full,
}

impl Lookup {
    pub fn slot(self) -> Option<SlotId> {
        match self {
            Lookup::Matched(id) | Lookup::Created(id) => Some(id),
            Lookup::Excluded | Lookup::Full => None,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Lookup::Created(_))
    }
}

/// Fixed-capacity arena of [`ProcessHistory`] records.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    records: Vec<ProcessHistory>,
    capacity: usize,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryTable {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRACKED)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: SlotId) -> Option<&ProcessHistory> {
        self.records.get(id.0)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut ProcessHistory> {
        self.records.get_mut(id.0)
    }

    /// Records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ProcessHistory)> {
        self.records.iter().enumerate().map(|(i, rec)| (SlotId(i), rec))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut ProcessHistory)> {
        self.records
            .iter_mut()
            .enumerate()
            .map(|(i, rec)| (SlotId(i), rec))
    }

    /// Records measured within the last [`STALE_AFTER_SECS`].
    pub fn live(&self, now: i64) -> impl Iterator<Item = (SlotId, &ProcessHistory)> {
        self.iter().filter(move |(_, rec)| !rec.is_stale(now))
    }

    /// First slot tracking this pid.
    pub fn find(&self, pid: ProcessId) -> Option<SlotId> {
        self.records.iter().position(|rec| rec.pid == pid).map(SlotId)
    }

    /// Locate the record for a snapshot entry, creating one if allowed.
    ///
    /// Exclusions are checked first, so a process excluded after it was
    /// tracked stops being scored and its record goes stale. Records match
    /// by pid. A matching pid with a different command is a recycled pid:
    /// the old slot is re-initialized as a new identity.
    pub fn find_or_create(
        &mut self,
        snapshot: &ProcessSnapshot,
        exclusions: &Exclusions,
        now: i64,
    ) -> Lookup {
        if exclusions.is_excluded(snapshot.uid.0, &snapshot.command) {
            return Lookup::Excluded;
        }

        if let Some(id) = self.find(snapshot.pid) {
            if self.records[id.0].command == snapshot.command {
                return Lookup::Matched(id);
            }
            debug!(
                pid = %snapshot.pid,
                old = %self.records[id.0].command,
                new = %snapshot.command,
                "pid recycled, starting new history"
            );
            self.records[id.0] = ProcessHistory::new(snapshot, now);
            return Lookup::Created(id);
        }

        match choose_slot(&self.records, self.capacity, now) {
            SlotChoice::Reuse(id) => {
                self.records[id.0] = ProcessHistory::new(snapshot, now);
                Lookup::Created(id)
            }
            SlotChoice::Append => {
                self.records.push(ProcessHistory::new(snapshot, now));
                Lookup::Created(SlotId(self.records.len() - 1))
            }
            SlotChoice::Full => Lookup::Full,
        }
    }
}

/// Shared read access. Records are consistent at cycle granularity, so a
/// poisoned lock is still usable.
pub fn read_table(lock: &RwLock<HistoryTable>) -> RwLockReadGuard<'_, HistoryTable> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access for the single writer.
pub fn write_table(lock: &RwLock<HistoryTable>) -> RwLockWriteGuard<'_, HistoryTable> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snap(pid: u32, command: &str) -> ProcessSnapshot {
        ProcessSnapshot::new(pid, 1000, command)
    }

    #[test]
    fn test_first_sighting_creates_record() {
        let mut table = HistoryTable::new();
        let lookup = table.find_or_create(&snap(10, "nginx"), &Exclusions::default(), 100);
        assert_eq!(lookup, Lookup::Created(SlotId(0)));
        assert!(lookup.is_new());

        let rec = table.get(SlotId(0)).unwrap();
        assert_eq!(rec.score, 0);
        assert_eq!(rec.threshold, 5);
        assert_eq!(rec.times_measured, 1);
    }

    #[test]
    fn test_second_sighting_matches() {
        let mut table = HistoryTable::new();
        let none = Exclusions::default();
        table.find_or_create(&snap(10, "nginx"), &none, 100);
        let lookup = table.find_or_create(&snap(10, "nginx"), &none, 101);
        assert_eq!(lookup, Lookup::Matched(SlotId(0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_excluded_uid_not_allocated() {
        let mut table = HistoryTable::new();
        let exclusions = Exclusions {
            uids: vec![1000],
            commands: vec![],
        };
        assert_eq!(
            table.find_or_create(&snap(10, "nginx"), &exclusions, 100),
            Lookup::Excluded
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_excluded_command_prefix() {
        let mut table = HistoryTable::new();
        let exclusions = Exclusions {
            uids: vec![],
            commands: vec!["kwork".to_string()],
        };
        assert_eq!(
            table.find_or_create(&snap(3, "kworker/0:1"), &exclusions, 100),
            Lookup::Excluded
        );
    }

    #[test]
    fn test_recycled_pid_starts_fresh() {
        let mut table = HistoryTable::new();
        let none = Exclusions::default();
        table.find_or_create(&snap(10, "make"), &none, 100);
        table.get_mut(SlotId(0)).unwrap().score = 42;

        let lookup = table.find_or_create(&snap(10, "cc1"), &none, 105);
        assert_eq!(lookup, Lookup::Created(SlotId(0)));
        let rec = table.get(SlotId(0)).unwrap();
        assert_eq!(rec.command, "cc1");
        assert_eq!(rec.score, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_recycled_pid_into_excluded_command_keeps_old_record() {
        let mut table = HistoryTable::new();
        let exclusions = Exclusions {
            uids: vec![],
            commands: vec!["sshd".to_string()],
        };
        table.find_or_create(&snap(10, "make"), &exclusions, 100);
        assert_eq!(
            table.find_or_create(&snap(10, "sshd"), &exclusions, 105),
            Lookup::Excluded
        );
        assert_eq!(table.get(SlotId(0)).unwrap().command, "make");
    }

    #[test]
    fn test_tracked_process_excluded_after_reload() {
        let mut table = HistoryTable::new();
        table.find_or_create(&snap(10, "backup"), &Exclusions::default(), 100);
        assert_eq!(
            table.find_or_create(&snap(10, "backup"), &Exclusions::default(), 101),
            Lookup::Matched(SlotId(0))
        );

        let reloaded = Exclusions {
            uids: vec![],
            commands: vec!["back".to_string()],
        };
        assert_eq!(
            table.find_or_create(&snap(10, "backup"), &reloaded, 102),
            Lookup::Excluded
        );
        // left to go stale, never measured again
        assert_eq!(table.get(SlotId(0)).unwrap().last_measure_time, 100);
    }

    #[test]
    fn test_choose_slot_prefers_first_stale() {
        let mut records = vec![
            ProcessHistory::new(&snap(1, "a"), 100),
            ProcessHistory::new(&snap(2, "b"), 50),
            ProcessHistory::new(&snap(3, "c"), 40),
        ];
        assert_eq!(choose_slot(&records, 3, 100), SlotChoice::Reuse(SlotId(1)));
        records[1].last_measure_time = 100;
        records[2].last_measure_time = 100;
        assert_eq!(choose_slot(&records, 3, 100), SlotChoice::Full);
        assert_eq!(choose_slot(&records, 4, 100), SlotChoice::Append);
    }

    #[test]
    fn test_stale_slot_reused_when_full() {
        let mut table = HistoryTable::with_capacity(2);
        let none = Exclusions::default();
        table.find_or_create(&snap(1, "a"), &none, 100);
        table.find_or_create(&snap(2, "b"), &none, 100);
        assert_eq!(table.find_or_create(&snap(3, "c"), &none, 110), Lookup::Full);

        // pid 1 is still live, pid 2 stopped appearing
        table.get_mut(SlotId(0)).unwrap().last_measure_time = 140;
        let lookup = table.find_or_create(&snap(3, "c"), &none, 140);
        assert_eq!(lookup, Lookup::Created(SlotId(1)));
        assert_eq!(table.get(SlotId(1)).unwrap().command, "c");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_stale_slot_reused_before_append() {
        let mut table = HistoryTable::new();
        let none = Exclusions::default();
        table.find_or_create(&snap(1, "a"), &none, 100);
        let lookup = table.find_or_create(&snap(2, "b"), &none, 200);
        assert_eq!(lookup, Lookup::Created(SlotId(0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reused_slot_carries_no_stale_data() {
        let mut table = HistoryTable::with_capacity(1);
        let none = Exclusions::default();
        table.find_or_create(&snap(1, "old"), &none, 100);
        {
            let rec = table.get_mut(SlotId(0)).unwrap();
            rec.score = 99;
            rec.interest_events = 7;
            rec.flags.log.warned = true;
        }
        table.find_or_create(&snap(2, "new"), &none, 200);
        let rec = table.get(SlotId(0)).unwrap();
        assert_eq!(rec.pid, ProcessId(2));
        assert_eq!(rec.score, 0);
        assert_eq!(rec.interest_events, 0);
        assert!(!rec.flags.log.warned);
    }

    #[test]
    fn test_live_filter() {
        let mut table = HistoryTable::new();
        let none = Exclusions::default();
        table.find_or_create(&snap(1, "a"), &none, 100);
        table.find_or_create(&snap(2, "b"), &none, 125);
        let live: Vec<_> = table.live(140).map(|(id, _)| id).collect();
        assert_eq!(live, vec![SlotId(1)]);
    }

    proptest! {
        #[test]
        fn table_never_exceeds_capacity(
            cycles in proptest::collection::vec(
                proptest::collection::vec((1u32..2000, 0u8..4), 0..60),
                1..20,
            ),
            capacity in 1usize..40,
        ) {
            let mut table = HistoryTable::with_capacity(capacity);
            let none = Exclusions::default();
            let names = ["a", "b", "c", "d"];
            for (i, cycle) in cycles.iter().enumerate() {
                let now = 1_000 + (i as i64) * 7;
                for (pid, name) in cycle {
                    let s = snap(*pid, names[*name as usize]);
                    if let Some(id) = table.find_or_create(&s, &none, now).slot() {
                        table.get_mut(id).unwrap().last_measure_time = now;
                    }
                    prop_assert!(table.len() <= capacity);
                }
            }
        }
    }
}
