//! Top-N ranking of interesting processes and users.
//!
//! Processes rank by cumulative interest-event count, users by the sum of
//! their processes' counts. Ties keep slot order (processes) or order of
//! first appearance (users). Entries with no interest are omitted.

use crate::history::{Cause, HistoryTable};
use procan_common::{ProcessId, Uid};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt::{self, Write as _};

/// Number of entries in each ranking.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRank {
    pub place: usize,
    pub command: String,
    pub pid: ProcessId,
    pub interests: u64,
    pub cause: Cause,
    pub warned: bool,
    pub alarmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRank {
    pub place: usize,
    pub uid: Uid,
    pub interests: u64,
}

/// Both rankings, as delivered in a digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub processes: Vec<ProcessRank>,
    pub users: Vec<UserRank>,
}

/// Rank the table.
pub fn rank(table: &HistoryTable) -> Ranking {
    let mut records: Vec<_> = table.iter().map(|(_, rec)| rec).collect();
    records.sort_by_key(|rec| Reverse(rec.interest_events));

    let processes = records
        .into_iter()
        .take(TOP_N)
        .filter(|rec| rec.interest_events > 0)
        .enumerate()
        .map(|(i, rec)| ProcessRank {
            place: i + 1,
            command: rec.command.clone(),
            pid: rec.pid,
            interests: rec.interest_events,
            cause: rec.cause(),
            warned: rec.flags.any_warned(),
            alarmed: rec.flags.any_alarmed(),
        })
        .collect();

    let mut per_user: Vec<(Uid, u64)> = Vec::new();
    for (_, rec) in table.iter() {
        match per_user.iter_mut().find(|(uid, _)| *uid == rec.uid) {
            Some((_, total)) => *total += rec.interest_events,
            None => per_user.push((rec.uid, rec.interest_events)),
        }
    }
    per_user.sort_by_key(|(_, total)| Reverse(*total));

    let users = per_user
        .into_iter()
        .take(TOP_N)
        .filter(|(_, total)| *total > 0)
        .enumerate()
        .map(|(i, (uid, interests))| UserRank {
            place: i + 1,
            uid,
            interests,
        })
        .collect();

    Ranking { processes, users }
}

impl fmt::Display for ProcessRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} because of {}.", self.place, self.command, self.cause)?;
        if self.warned {
            write!(f, " *WARNED*")?;
        }
        if self.alarmed {
            write!(f, " *ALARMED*")?;
        }
        Ok(())
    }
}

impl fmt::Display for UserRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} with total interest value of: {}",
            self.place, self.uid, self.interests
        )
    }
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty() && self.users.is_empty()
    }

    /// Multi-line report used by mail and the interactive display.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Top {} processes:", TOP_N);
        if self.processes.is_empty() {
            out.push_str("(none)\n");
        }
        for p in &self.processes {
            let _ = writeln!(out, "{}", p);
        }
        let _ = write!(out, "\nTop {} users:\n", TOP_N);
        if self.users.is_empty() {
            out.push_str("(none)\n");
        }
        for u in &self.users {
            let _ = writeln!(out, "{}", u);
        }
        out
    }

    /// Single-line summary used by the system log: the process ranks, then
    /// a `users:` segment with the user ranks.
    pub fn summary_line(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }
        format!(
            "{}; users: {}",
            join_ranks(&self.processes),
            join_ranks(&self.users)
        )
    }
}

fn join_ranks<T: fmt::Display>(ranks: &[T]) -> String {
    if ranks.is_empty() {
        return "none".to_string();
    }
    ranks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}
