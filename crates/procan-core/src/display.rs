//! Text listing of tracked processes for the interactive mode.

use crate::history::HistoryTable;
use std::fmt::Write as _;

/// Processes measured within the last 30 seconds, one per line.
pub fn render_tracked(table: &HistoryTable, now: i64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:>7} {:>6} {:>12} {:>12} {:>7} {:>9}",
        "COMMAND", "PID", "STREAK", "SIZE-DELTA", "RSS-DELTA", "SCORE", "INTEREST"
    );
    let mut shown = 0usize;
    for (_, rec) in table.live(now) {
        let _ = writeln!(
            out,
            "{:<24} {:>7} {:>6} {:>12} {:>12} {:>7} {:>9}",
            rec.command,
            rec.pid,
            rec.active_streak,
            rec.size_delta,
            rec.rss_delta,
            rec.score,
            rec.interest_events
        );
        shown += 1;
    }
    let _ = writeln!(out, "{} of {} tracked processes active", shown, table.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use procan_common::ProcessSnapshot;
    use procan_config::Exclusions;

    #[test]
    fn test_lists_only_live_records() {
        let mut table = HistoryTable::new();
        let none = Exclusions::default();
        table.find_or_create(&ProcessSnapshot::new(1, 0, "gone"), &none, 10);
        let id = table
            .find_or_create(&ProcessSnapshot::new(2, 0, "rsyslogd"), &none, 100)
            .slot()
            .unwrap();
        table.get_mut(id).unwrap().score = 12;

        let text = render_tracked(&table, 105);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("COMMAND"));
        assert!(lines[1].starts_with("rsyslogd"));
        assert!(lines[1].contains(" 12 "));
        assert_eq!(lines[2], "1 of 2 tracked processes active");
    }
}
