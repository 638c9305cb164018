//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → `PROCAN_CONFIG` → system paths → XDG → working directory.

use crate::CONFIG_FILE_NAME;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "PROCAN_CONFIG";

/// XDG config directory name.
const CONFIG_DIR_NAME: &str = "procan";

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in a system location such as /etc/procan.conf.
    SystemConfig,

    /// Found in the XDG config directory.
    XdgConfig,

    /// Found in the working directory.
    WorkingDirectory,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::WorkingDirectory => write!(f, "working directory"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority). Must exist.
    pub config_path: Option<PathBuf>,
    /// Replaces the built-in search list when set.
    pub search_paths: Option<Vec<PathBuf>>,
}

impl ConfigOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            search_paths: None,
        }
    }
}

/// Built-in search list with the source each location reports.
pub fn default_candidates() -> Vec<(PathBuf, ConfigSource)> {
    let mut candidates: Vec<(PathBuf, ConfigSource)> = [
        "/etc/procan.conf",
        "/usr/etc/procan.conf",
        "/usr/local/etc/procan.conf",
        "/usr/local/etc/procan/procan.conf",
    ]
    .into_iter()
    .map(|p| (PathBuf::from(p), ConfigSource::SystemConfig))
    .collect();

    let xdg_config = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
    candidates.push((
        xdg_config.join(CONFIG_DIR_NAME).join("procan.toml"),
        ConfigSource::XdgConfig,
    ));
    candidates.push((
        PathBuf::from(".").join(CONFIG_FILE_NAME),
        ConfigSource::WorkingDirectory,
    ));
    candidates
}

/// Resolve which config file to load.
///
/// Returns `Ok(None)` when nothing was found and defaults should be used,
/// and `Err` with the missing path when an explicit file does not exist.
pub fn resolve_config_path(
    options: &ConfigOptions,
) -> Result<Option<(PathBuf, ConfigSource)>, PathBuf> {
    // 1. Explicit option
    if let Some(path) = &options.config_path {
        return require(path, ConfigSource::CliArgument);
    }

    // 2. Caller-provided search list
    if let Some(paths) = &options.search_paths {
        return Ok(first_existing(
            paths
                .iter()
                .map(|p| (p.clone(), ConfigSource::SystemConfig)),
        ));
    }

    // 3. Environment variable
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.is_empty() {
            return require(Path::new(&path), ConfigSource::Environment);
        }
    }

    // 4. System, XDG, and working directory locations
    Ok(first_existing(default_candidates()))
}

fn require(path: &Path, source: ConfigSource) -> Result<Option<(PathBuf, ConfigSource)>, PathBuf> {
    if path.is_file() {
        Ok(Some((path.to_path_buf(), source)))
    } else {
        Err(path.to_path_buf())
    }
}

fn first_existing(
    candidates: impl IntoIterator<Item = (PathBuf, ConfigSource)>,
) -> Option<(PathBuf, ConfigSource)> {
    candidates.into_iter().find(|(path, _)| path.is_file())
}
