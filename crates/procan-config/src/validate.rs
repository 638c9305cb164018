//! Configuration validation errors and semantic validation.

use crate::settings::Config;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::ParseError { .. } => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::SemanticError(_) => 63,
        }
    }
}

/// Validate a configuration record semantically.
///
/// Returns non-fatal warnings on success.
pub fn validate_config(config: &Config) -> ValidationResult<Vec<String>> {
    let mut warnings = Vec::new();

    let admin = &config.mail.admin_email;
    if admin.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidValue {
            field: "adminemail".to_string(),
            message: "must be a single address without whitespace".to_string(),
        });
    }
    if !admin.is_empty() && !admin.contains('@') {
        warnings.push(format!(
            "adminemail '{}' has no domain; relying on the mail transport to qualify it",
            admin
        ));
    }

    for (field, value) in [
        ("warnscript", &config.script.warn_script),
        ("alarmscript", &config.script.alarm_script),
    ] {
        if value.chars().any(char::is_control) {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: "contains control characters".to_string(),
            });
        }
    }

    if config.mail.mta_path.as_os_str().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "mtapath".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.levels.alarm < config.levels.warn {
        warnings.push(format!(
            "alarmlevel ({}) is below warnlevel ({}); alarms will precede warnings",
            config.levels.alarm, config.levels.warn
        ));
    }

    if config.mail.frequency_hours > 0 && admin.is_empty() {
        warnings.push("mailfrequency is set but adminemail is empty".to_string());
    }

    Ok(warnings)
}
