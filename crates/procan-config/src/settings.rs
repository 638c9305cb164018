//! The configuration record.
//!
//! Every section implements `Default` so partial TOML files and sparse
//! legacy files both produce a complete record.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum number of entries kept in each exclusion list.
pub const MAX_EXCLUSIONS: usize = 20;

/// Full procan configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub exclusions: Exclusions,
    pub levels: Levels,
    pub mail: MailSettings,
    pub log: LogSettings,
    pub script: ScriptSettings,
}

/// Processes that are never tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Exclusions {
    /// Owning uids to ignore.
    pub uids: Vec<u32>,
    /// Command name prefixes to ignore.
    pub commands: Vec<String>,
}

impl Exclusions {
    /// True when the uid is listed or the command starts with a listed prefix.
    pub fn is_excluded(&self, uid: u32, command: &str) -> bool {
        self.uids.contains(&uid)
            || self
                .commands
                .iter()
                .any(|prefix| !prefix.is_empty() && command.starts_with(prefix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty() && self.commands.is_empty()
    }
}

/// Cumulative interest-event counts that trigger notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Levels {
    /// A record warns once its interest count exceeds this.
    pub warn: u64,
    /// A record alarms once its interest count exceeds this.
    pub alarm: u64,
}

impl Default for Levels {
    fn default() -> Self {
        Self { warn: 10, alarm: 20 }
    }
}

/// Mail backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailSettings {
    /// Recipient of digests, warnings, and alarms.
    pub admin_email: String,
    /// Mail transport invoked as `<mta_path> -t <admin_email>`.
    pub mta_path: PathBuf,
    /// Hours between status-report digests. Zero disables the backend.
    pub frequency_hours: u32,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            admin_email: String::new(),
            mta_path: PathBuf::from("/usr/sbin/sendmail"),
            frequency_hours: 0,
        }
    }
}

/// Log backend settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Hours between digests written to the system log. Zero disables the backend.
    pub frequency_hours: u32,
}

/// Script backend settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptSettings {
    /// Command line run for each warned process.
    pub warn_script: String,
    /// Command line run for each alarmed process.
    pub alarm_script: String,
}

impl Config {
    /// Parse a TOML document into a configuration record.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Drop exclusion entries beyond [`MAX_EXCLUSIONS`], returning a warning per list.
    pub fn enforce_limits(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.exclusions.uids.len() > MAX_EXCLUSIONS {
            warnings.push(format!(
                "excludeuids lists {} entries; only the first {} are used",
                self.exclusions.uids.len(),
                MAX_EXCLUSIONS
            ));
            self.exclusions.uids.truncate(MAX_EXCLUSIONS);
        }
        if self.exclusions.commands.len() > MAX_EXCLUSIONS {
            warnings.push(format!(
                "excludeprocs lists {} entries; only the first {} are used",
                self.exclusions.commands.len(),
                MAX_EXCLUSIONS
            ));
            self.exclusions.commands.truncate(MAX_EXCLUSIONS);
        }
        warnings
    }
}
