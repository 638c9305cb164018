//! System log channel.

use super::{BackendKind, Channel, DeliveryError, Message, Notice, NoticeLevel};
use crate::stats::Ranking;
use procan_config::Config;
use std::ffi::{CStr, CString};

const IDENT: &CStr = c"procan";
const FORMAT: &CStr = c"%s";

/// Writes digests and notices through `syslog(3)` as facility `daemon`.
#[derive(Debug, Default)]
pub struct SyslogChannel {
    opened: bool,
}

impl SyslogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&mut self) {
        if !self.opened {
            // SAFETY: IDENT is a static NUL-terminated string that outlives
            // every later syslog call, as openlog requires.
            unsafe { libc::openlog(IDENT.as_ptr(), libc::LOG_PID | libc::LOG_CONS, libc::LOG_DAEMON) };
            self.opened = true;
        }
    }
}

impl Drop for SyslogChannel {
    fn drop(&mut self) {
        if self.opened {
            // SAFETY: no arguments; closes the descriptor opened above.
            unsafe { libc::closelog() };
        }
    }
}

/// Priority a message is logged at.
pub fn priority(message: &Message<'_>) -> libc::c_int {
    match message {
        Message::Notice(Notice {
            level: NoticeLevel::Alarm,
            ..
        }) => libc::LOG_ALERT,
        _ => libc::LOG_NOTICE,
    }
}

pub fn format_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Warning => format!(
            "WARNING: {} has triggered a warning for being too interesting ({})",
            notice.command, notice.score
        ),
        NoticeLevel::Alarm => format!(
            "ALERT: {} has triggered an alarm for being too interesting ({})",
            notice.command, notice.score
        ),
    }
}

pub fn format_digest(ranking: &Ranking) -> String {
    format!("Interesting Processes: {}", ranking.summary_line())
}

/// Text logged for a message.
pub fn format_line(message: &Message<'_>) -> String {
    match message {
        Message::Digest(ranking) => format_digest(ranking),
        Message::Notice(notice) => format_notice(notice),
    }
}

impl Channel for SyslogChannel {
    fn kind(&self) -> BackendKind {
        BackendKind::Log
    }

    fn deliver(&mut self, message: Message<'_>, _config: &Config) -> Result<(), DeliveryError> {
        let line = CString::new(format_line(&message))
            .map_err(|_| DeliveryError::Record("message contains a NUL byte".to_string()))?;
        self.open();
        // SAFETY: FORMAT consumes exactly one C string argument and `line`
        // is a valid NUL-terminated buffer for the duration of the call.
        unsafe { libc::syslog(priority(&message), FORMAT.as_ptr(), line.as_ptr()) };
        Ok(())
    }
}
