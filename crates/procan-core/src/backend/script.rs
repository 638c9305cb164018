//! Script channel: launch the configured program per notice and move on.
//!
//! The script line is split with POSIX shell-word rules and executed
//! directly. `pid command score interests` are appended as arguments. Only
//! launch failure is observed; a detached reaper thread collects the exit
//! status so no zombie is left behind.

use super::{BackendKind, Channel, DeliveryError, Message, Notice, NoticeLevel};
use procan_config::Config;
use std::process::{Child, Command, Stdio};
use std::thread;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct ScriptChannel;

impl ScriptChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Program and argument vector for a notice.
pub fn command_line(script: &str, notice: &Notice) -> Result<(String, Vec<String>), String> {
    let mut words =
        shlex::split(script).ok_or_else(|| format!("cannot parse script line '{}'", script))?;
    if words.is_empty() {
        return Err(format!("no {} script configured", notice.level));
    }
    let program = words.remove(0);
    words.extend([
        notice.pid.to_string(),
        notice.command.clone(),
        notice.score.to_string(),
        notice.interests.to_string(),
    ]);
    Ok((program, words))
}

fn script_for<'a>(level: NoticeLevel, config: &'a Config) -> &'a str {
    match level {
        NoticeLevel::Warning => &config.script.warn_script,
        NoticeLevel::Alarm => &config.script.alarm_script,
    }
}

fn reap(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name("procan-reaper".to_string())
        .spawn(move || {
            if let Ok(status) = child.wait() {
                debug!(pid, ?status, "script exited");
            }
        });
    if let Err(e) = spawned {
        warn!(pid, error = %e, "cannot start reaper thread, script will linger as a zombie");
    }
}

impl Channel for ScriptChannel {
    fn kind(&self) -> BackendKind {
        BackendKind::Script
    }

    fn deliver(&mut self, message: Message<'_>, config: &Config) -> Result<(), DeliveryError> {
        let notice = match message {
            Message::Notice(notice) => notice,
            Message::Digest(_) => return Ok(()),
        };
        let (program, args) =
            command_line(script_for(notice.level, config), notice).map_err(DeliveryError::Channel)?;

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DeliveryError::Channel(format!("failed to spawn {program}: {e}")))?;
        debug!(pid = child.id(), %program, "script launched");
        reap(child);
        Ok(())
    }
}
