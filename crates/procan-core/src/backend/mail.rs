//! Mail channel: one MTA process per message.
//!
//! The MTA is run as `<mta_path> -t <admin>` with the complete message,
//! headers included, written to its stdin.

use super::syslog::format_notice;
use super::{BackendKind, Channel, DeliveryError, Message, NoticeLevel};
use procan_config::Config;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MailChannel;

impl MailChannel {
    pub fn new() -> Self {
        Self
    }
}

pub fn subject(message: &Message<'_>) -> &'static str {
    match message {
        Message::Digest(_) => "Procan Status Report",
        Message::Notice(n) if n.level == NoticeLevel::Warning => "Procan Warning",
        Message::Notice(_) => "Procan Alarm",
    }
}

/// Full RFC 822 style message text handed to the MTA.
pub fn compose(message: &Message<'_>, admin: &str) -> String {
    let body = match message {
        Message::Digest(ranking) => ranking.render(),
        Message::Notice(notice) => format!(
            "{}\n\nProcess: {} (pid {})\nScore: {}\nInterest events: {}\n",
            format_notice(notice),
            notice.command,
            notice.pid,
            notice.score,
            notice.interests
        ),
    };
    format!("To: {}\nSubject: {}\n\n{}", admin, subject(message), body)
}

impl Channel for MailChannel {
    fn kind(&self) -> BackendKind {
        BackendKind::Mail
    }

    fn deliver(&mut self, message: Message<'_>, config: &Config) -> Result<(), DeliveryError> {
        let admin = config.mail.admin_email.trim();
        if admin.is_empty() {
            return Err(DeliveryError::Channel(
                "no admin address configured".to_string(),
            ));
        }
        let mta = &config.mail.mta_path;
        let text = compose(&message, admin);

        let mut child = Command::new(mta)
            .arg("-t")
            .arg(admin)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DeliveryError::Channel(format!("failed to spawn {}: {e}", mta.display())))?;

        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(text.as_bytes()) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    Err("mail transport closed its input early".to_string())
                }
                Err(e) => Err(format!("failed to write message: {e}")),
            },
            None => Err("mail transport has no stdin".to_string()),
        };

        // Always reap the child, even when the write failed.
        let status = child
            .wait()
            .map_err(|e| DeliveryError::Record(format!("wait failed: {e}")))?;
        written.map_err(DeliveryError::Record)?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(DeliveryError::Record(format!(
                "mail transport exited with code {code}"
            )));
        }
        debug!(mta = %mta.display(), subject = subject(&message), "mail handed to transport");
        Ok(())
    }
}
