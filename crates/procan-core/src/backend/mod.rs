//! Notification backends: scheduled digests plus deduplicated
//! warning/alarm notices, delivered through pluggable channels.
//!
//! Each configured kind owns one [`Channel`]. The [`Dispatcher`] drives the
//! per-kind schedule every cycle and reports failures; a failed kind is
//! disabled for the rest of the run.

pub mod dispatch;
pub mod mail;
pub mod script;
pub mod syslog;

pub use dispatch::{BackendOutcome, DispatchReport, Dispatcher};

use crate::stats::Ranking;
use procan_common::ProcessId;
use procan_config::Config;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SECS_PER_HOUR: i64 = 3600;

/// Backend kinds selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Log,
    Mail,
    Script,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Log, BackendKind::Mail, BackendKind::Script];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Log => "log",
            BackendKind::Mail => "mail",
            BackendKind::Script => "script",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "syslog" => Ok(BackendKind::Log),
            "mail" => Ok(BackendKind::Mail),
            "script" => Ok(BackendKind::Script),
            other => Err(format!(
                "unknown backend '{}' (expected log, mail or script)",
                other
            )),
        }
    }
}

/// Digest period for a kind, or `None` when the kind sends no digests.
pub fn digest_interval_secs(kind: BackendKind, config: &Config) -> Option<i64> {
    let hours = match kind {
        BackendKind::Log => config.log.frequency_hours,
        BackendKind::Mail => config.mail.frequency_hours,
        BackendKind::Script => 0,
    };
    (hours > 0).then(|| i64::from(hours) * SECS_PER_HOUR)
}

/// First-use check for a kind against the current configuration.
pub fn check_config(kind: BackendKind, config: &Config) -> Result<(), BackendError> {
    let reason = match kind {
        BackendKind::Log if config.log.frequency_hours == 0 => Some("log frequency is zero"),
        BackendKind::Mail if config.mail.frequency_hours == 0 => Some("mail frequency is zero"),
        BackendKind::Mail if config.mail.admin_email.trim().is_empty() => {
            Some("no admin address configured")
        }
        BackendKind::Script
            if config.script.warn_script.trim().is_empty()
                && config.script.alarm_script.trim().is_empty() =>
        {
            Some("no warn or alarm script configured")
        }
        _ => None,
    };
    match reason {
        Some(reason) => Err(BackendError::Misconfigured {
            kind,
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Alarm,
}

impl NoticeLevel {
    /// Interest count that must be exceeded for this level.
    pub fn level(&self, config: &Config) -> u64 {
        match self {
            NoticeLevel::Warning => config.levels.warn,
            NoticeLevel::Alarm => config.levels.alarm,
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeLevel::Warning => f.write_str("warning"),
            NoticeLevel::Alarm => f.write_str("alarm"),
        }
    }
}

/// One per-process notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub pid: ProcessId,
    pub command: String,
    pub score: i64,
    pub interests: u64,
}

/// What a channel is asked to deliver.
#[derive(Debug, Clone, Copy)]
pub enum Message<'a> {
    Digest(&'a Ranking),
    Notice(&'a Notice),
}

/// Failure of a single delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The output path itself is unusable; the kind gets disabled.
    #[error("channel unavailable: {0}")]
    Channel(String),
    /// Only this message was lost.
    #[error("delivery failed: {0}")]
    Record(String),
}

/// Delivery mechanism for one backend kind.
pub trait Channel: Send {
    fn kind(&self) -> BackendKind;

    fn deliver(&mut self, message: Message<'_>, config: &Config) -> Result<(), DeliveryError>;
}

/// Create the production channel for a kind.
pub fn channel_for(kind: BackendKind) -> Box<dyn Channel> {
    match kind {
        BackendKind::Log => Box::new(syslog::SyslogChannel::new()),
        BackendKind::Mail => Box::new(mail::MailChannel::new()),
        BackendKind::Script => Box::new(script::ScriptChannel::new()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum BackendError {
    #[error("{kind} backend misconfigured: {reason}")]
    Misconfigured { kind: BackendKind, reason: String },

    #[error("{kind} backend failed: {reason}")]
    ChannelFailed { kind: BackendKind, reason: String },
}

impl BackendError {
    pub fn code(&self) -> u32 {
        match self {
            BackendError::ChannelFailed { .. } => 30,
            BackendError::Misconfigured { .. } => 31,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendError::Misconfigured { kind, .. } | BackendError::ChannelFailed { kind, .. } => {
                *kind
            }
        }
    }
}

impl From<BackendError> for procan_common::Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Misconfigured { kind, reason } => {
                procan_common::Error::BackendMisconfigured {
                    backend: kind.to_string(),
                    message: reason,
                }
            }
            BackendError::ChannelFailed { kind, reason } => procan_common::Error::Backend {
                backend: kind.to_string(),
                message: reason,
            },
        }
    }
}
