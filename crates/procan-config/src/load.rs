//! Loading a configuration record from disk.

use crate::legacy::parse_legacy;
use crate::resolve::{resolve_config_path, ConfigOptions, ConfigSource};
use crate::settings::Config;
use crate::validate::{validate_config, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } => 11,
            ConfigError::ParseError { .. } => 61,
            ConfigError::Invalid { source, .. } => source.code(),
            ConfigError::ValidationError(source) => source.code(),
            ConfigError::IoError { .. } => 60,
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    /// The loaded configuration.
    pub config: Config,
    /// Path the configuration was read from (None if using defaults).
    pub path: Option<PathBuf>,
    /// Which resolution step produced the path.
    pub source: ConfigSource,
    /// Non-fatal issues found while parsing and validating.
    pub warnings: Vec<String>,
}

/// Load configuration with the standard resolution order.
///
/// Falls back to built-in defaults when no file is found.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let Some((path, source)) =
        resolve_config_path(options).map_err(|path| ConfigError::NotFound { path })?
    else {
        let config = Config::default();
        let warnings = validate_config(&config)?;
        return Ok(ResolvedConfig {
            config,
            path: None,
            source: ConfigSource::BuiltinDefault,
            warnings,
        });
    };

    let (config, warnings) = load_config_file(&path)?;
    for warning in &warnings {
        tracing::warn!(path = %path.display(), "{}", warning);
    }

    Ok(ResolvedConfig {
        config,
        path: Some(path),
        source,
        warnings,
    })
}

/// Load and validate one file. `.toml` files are TOML; anything else is the legacy format.
pub fn load_config_file(path: &Path) -> Result<(Config, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let (config, mut warnings) = if is_toml {
        let mut config = Config::from_toml_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let warnings = config.enforce_limits();
        (config, warnings)
    } else {
        let parsed = parse_legacy(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            source: e,
        })?;
        (parsed.config, parsed.warnings)
    };

    let semantic = validate_config(&config).map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })?;
    warnings.extend(semantic);

    Ok((config, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&ConfigOptions::with_path(dir.path().join("x.conf"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert_eq!(err.code(), 11);
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: None,
            search_paths: Some(vec![dir.path().join("procan.conf")]),
        };
        let resolved = load_config(&options).unwrap();
        assert_eq!(resolved.source, ConfigSource::BuiltinDefault);
        assert!(resolved.path.is_none());
        assert_eq!(resolved.config, Config::default());
    }

    #[test]
    fn test_toml_file_selected_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("procan.toml");
        std::fs::write(&path, "[levels]\nwarn = 2\nalarm = 4\n").unwrap();
        let (config, warnings) = load_config_file(&path).unwrap();
        assert_eq!(config.levels.warn, 2);
        assert_eq!(config.levels.alarm, 4);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("procan.toml");
        std::fs::write(&path, "[levels\n").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("procan.toml"));
    }

    #[test]
    fn test_semantic_error_in_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("procan.conf");
        std::fs::write(&path, "warnscript: /bin/x\u{1b}\n").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert_eq!(err.code(), 65);
    }
}
