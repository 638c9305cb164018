//! Error types for procan.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation text for operators
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Invalid Configuration
//!   Reason: invalid configuration: /etc/procan.conf line 4: invalid warnlevel
//!   Fix: Run 'procan check' to validate the configuration file.
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for procan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Process table sampling errors.
    Collection,
    /// Notification backend errors.
    Backend,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
    /// Bugs and broken invariants.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Backend => write!(f, "backend"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Unified error type for procan.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Collection errors (20-29)
    #[error("process collection failed: {0}")]
    Collection(String),

    // Backend errors (30-39)
    #[error("backend {backend} failed: {message}")]
    Backend { backend: String, message: String },

    #[error("backend {backend} is misconfigured: {message}")]
    BackendMisconfigured { backend: String, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // Internal errors (90-99)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Collection errors
    /// - 30-39: Backend errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    /// - 90-99: Internal errors
    pub fn code(&self) -> u32 {
        match self {
            Error::ConfigNotFound { .. } => 11,
            Error::InvalidConfig(_) => 12,
            Error::Collection(_) => 20,
            Error::Backend { .. } => 30,
            Error::BackendMisconfigured { .. } => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
            Error::Internal(_) => 90,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConfigNotFound { .. } | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::Collection(_) => ErrorCategory::Collection,
            Error::Backend { .. } | Error::BackendMisconfigured { .. } => ErrorCategory::Backend,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "Run 'procan check' to validate the configuration file.",
            Error::ConfigNotFound { .. } => {
                "Create /etc/procan.conf or pass --config with the path to an existing file."
            }
            Error::Collection(_) => "Check that /proc is mounted and readable.",
            Error::Backend { .. } => {
                "Check the system log, mail transport, or script path, then restart procan."
            }
            Error::BackendMisconfigured { .. } => {
                "Set the backend's frequency, admin address, or script path in the configuration."
            }
            Error::Io(_) => "Check permissions and that the referenced paths exist.",
            Error::Json(_) => "Report this as a bug with the command line that produced it.",
            Error::UnsupportedPlatform(_) => "procan samples processes through Linux /proc.",
            Error::Internal(_) => "Report this as a bug.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::ConfigNotFound { .. } => "Configuration Not Found",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::Collection(_) => "Process Collection Error",
            Error::Backend { .. } => "Backend Failure",
            Error::BackendMisconfigured { .. } => "Backend Misconfigured",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
            Error::Internal(_) => "Internal Error",
        }
    }

    /// Render the headline/reason/fix block printed on fatal errors.
    pub fn to_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}
