//! Procan configuration loading and validation.
//!
//! This crate provides:
//! - The typed configuration record consumed by the analyzer
//! - Parsers for the legacy `key: value` file and for TOML
//! - Config resolution (CLI → env → system paths → XDG → cwd → defaults)
//! - Semantic validation

pub mod legacy;
pub mod load;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use load::{load_config, load_config_file, ConfigError, ResolvedConfig};
pub use resolve::{resolve_config_path, ConfigOptions, ConfigSource};
pub use settings::{
    Config, Exclusions, Levels, LogSettings, MailSettings, ScriptSettings, MAX_EXCLUSIONS,
};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Default config file name in system locations and the working directory.
pub const CONFIG_FILE_NAME: &str = "procan.conf";
