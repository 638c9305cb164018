//! Pure parsers for `/proc/[pid]/stat` and `/proc/[pid]/status`.

use super::CollectError;

/// The subset of `/proc/[pid]/stat` the collector needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFields {
    pub comm: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    /// Start time in clock ticks since boot.
    pub starttime: u64,
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss_pages: u64,
}

impl StatFields {
    pub fn total_ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }
}

fn field(fields: &[&str], index: usize, name: &str, pid: u32) -> Result<u64, CollectError> {
    // rss may be reported negative for some kernel threads
    let raw = fields[index];
    raw.parse::<u64>()
        .or_else(|_| raw.parse::<i64>().map(|v| v.max(0) as u64))
        .map_err(|_| CollectError::Parse {
            pid,
            message: format!("invalid {name} field '{raw}'"),
        })
}

/// Parse stat content. The command name is everything between the first
/// `(` and the last `)`, so names containing spaces or parens survive.
pub fn parse_proc_stat_content(content: &str, pid: u32) -> Result<StatFields, CollectError> {
    let parse_err = |message: &str| CollectError::Parse {
        pid,
        message: message.to_string(),
    };
    let comm_start = content.find('(').ok_or_else(|| parse_err("missing comm start"))?;
    let comm_end = content.rfind(')').ok_or_else(|| parse_err("missing comm end"))?;
    if comm_end < comm_start {
        return Err(parse_err("malformed comm field"));
    }
    let comm = content[comm_start + 1..comm_end].to_string();

    let after_comm = content
        .get(comm_end + 1..)
        .ok_or_else(|| parse_err("stat content truncated after comm"))?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    if fields.len() < 22 {
        return Err(CollectError::Parse {
            pid,
            message: format!("insufficient stat fields: {}", fields.len()),
        });
    }

    Ok(StatFields {
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: field(&fields, 11, "utime", pid)?,
        stime: field(&fields, 12, "stime", pid)?,
        starttime: field(&fields, 19, "starttime", pid)?,
        vsize: field(&fields, 20, "vsize", pid)?,
        rss_pages: field(&fields, 21, "rss", pid)?,
    })
}

/// Real uid from status content (first value of the `Uid:` line).
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// `btime` from `/proc/stat`, in seconds since the epoch.
pub fn parse_boot_time(content: &str) -> Option<i64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime"))
        .and_then(|rest| rest.trim().parse().ok())
}
