//! Parser for the line-oriented `procan.conf` format.
//!
//! ```text
//! # comment
//! excludeuids: 0 33
//! excludeprocs: kworker sshd
//! adminemail: root@example.org
//! warnlevel: 10
//! alarmlevel: 20
//! mailfrequency: 24
//! logfrequency: 1
//! warnscript: /usr/local/bin/procan-warn
//! alarmscript: /usr/local/bin/procan-alarm
//! mtapath: /usr/sbin/sendmail
//! ```
//!
//! Lists accept whitespace or commas as separators. Keys with an empty value
//! are skipped. Unknown keys produce warnings, not errors.

use crate::settings::Config;
use crate::validate::{ValidationError, ValidationResult};
use std::path::PathBuf;
use std::str::FromStr;

/// Result of parsing a legacy file.
#[derive(Debug, Clone, Default)]
pub struct LegacyParse {
    pub config: Config,
    pub warnings: Vec<String>,
}

/// Parse legacy `key: value` content.
pub fn parse_legacy(content: &str) -> ValidationResult<LegacyParse> {
    let mut config = Config::default();
    let mut warnings = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            warnings.push(format!("line {}: expected 'key: value', skipped", line_no));
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "excludeuids" => {
                config.exclusions.uids = list(value)
                    .map(|tok| number::<u32>(line_no, &key, tok))
                    .collect::<ValidationResult<_>>()?;
            }
            "excludeprocs" => {
                config.exclusions.commands = list(value).map(str::to_string).collect();
            }
            "includeuids" => {
                warnings.push(format!(
                    "line {}: includeuids is not supported and was ignored",
                    line_no
                ));
            }
            "adminemail" => config.mail.admin_email = value.to_string(),
            "mtapath" => config.mail.mta_path = PathBuf::from(value),
            "warnlevel" => config.levels.warn = number(line_no, &key, value)?,
            "alarmlevel" => config.levels.alarm = number(line_no, &key, value)?,
            "mailfrequency" => config.mail.frequency_hours = number(line_no, &key, value)?,
            "logfrequency" => config.log.frequency_hours = number(line_no, &key, value)?,
            "warnscript" => config.script.warn_script = value.to_string(),
            "alarmscript" => config.script.alarm_script = value.to_string(),
            other => {
                warnings.push(format!("line {}: unknown key '{}' ignored", line_no, other));
            }
        }
    }

    warnings.extend(config.enforce_limits());
    Ok(LegacyParse { config, warnings })
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
}

fn number<T: FromStr>(line: usize, key: &str, value: &str) -> ValidationResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ValidationError::ParseError {
        line,
        message: format!("{} expects a non-negative integer, got '{}': {}", key, value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file() {
        let parsed = parse_legacy(
            "# procan configuration\n\
             excludeuids: 0 33\n\
             excludeprocs: kworker, sshd\n\
             adminemail: root@example.org\n\
             warnlevel: 3\n\
             alarmlevel: 7\n\
             mailfrequency: 24\n\
             logfrequency: 1\n\
             warnscript: /usr/local/bin/warn --loud\n\
             alarmscript: /usr/local/bin/alarm\n\
             mtapath: /usr/lib/sendmail\n",
        )
        .unwrap();
        let config = parsed.config;
        assert!(parsed.warnings.is_empty());
        assert_eq!(config.exclusions.uids, vec![0, 33]);
        assert_eq!(config.exclusions.commands, vec!["kworker", "sshd"]);
        assert_eq!(config.mail.admin_email, "root@example.org");
        assert_eq!(config.levels.warn, 3);
        assert_eq!(config.levels.alarm, 7);
        assert_eq!(config.mail.frequency_hours, 24);
        assert_eq!(config.log.frequency_hours, 1);
        assert_eq!(config.script.warn_script, "/usr/local/bin/warn --loud");
        assert_eq!(config.script.alarm_script, "/usr/local/bin/alarm");
        assert_eq!(config.mail.mta_path, PathBuf::from("/usr/lib/sendmail"));
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let parsed = parse_legacy("warnlevel:\nadminemail:   \n").unwrap();
        assert_eq!(parsed.config, Config::default());
    }

    #[test]
    fn test_unknown_key_warns() {
        let parsed = parse_legacy("colour: blue\n").unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("unknown key 'colour'"));
    }

    #[test]
    fn test_include_uids_ignored_with_warning() {
        let parsed = parse_legacy("includeuids: 1000\n").unwrap();
        assert!(parsed.config.exclusions.uids.is_empty());
        assert!(parsed.warnings[0].contains("includeuids"));
    }

    #[test]
    fn test_line_without_colon_warns() {
        let parsed = parse_legacy("warnlevel 3\n").unwrap();
        assert_eq!(parsed.config.levels.warn, 10);
        assert!(parsed.warnings[0].starts_with("line 1"));
    }

    #[test]
    fn test_bad_number_is_error() {
        let err = parse_legacy("\n\nalarmlevel: lots\n").unwrap_err();
        match err {
            ValidationError::ParseError { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("alarmlevel"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_uid_is_error() {
        assert!(parse_legacy("excludeuids: -1\n").is_err());
    }

    #[test]
    fn test_exclusion_cap() {
        let many: Vec<String> = (0..30).map(|i| format!("proc{}", i)).collect();
        let parsed = parse_legacy(&format!("excludeprocs: {}\n", many.join(" "))).unwrap();
        assert_eq!(parsed.config.exclusions.commands.len(), 20);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_value_may_contain_colon() {
        let parsed = parse_legacy("warnscript: /opt/bin/notify --at 12:00\n").unwrap();
        assert_eq!(parsed.config.script.warn_script, "/opt/bin/notify --at 12:00");
    }
}
