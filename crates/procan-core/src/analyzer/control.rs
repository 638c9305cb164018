//! Operator control messages and the signal bridge that produces them.
//!
//! Signals never touch analyzer state directly: the bridge thread turns
//! each one into a [`Control`] message, and the analyzer applies messages
//! between cycles.

use procan_config::Config;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::{Handle, Signals};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Requests delivered to the analyzer loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Replace the configuration.
    Reload(Box<Config>),
    /// Zero scores, interest counts and dedup flags.
    Reset,
    /// Stop after the current cycle.
    Shutdown,
}

/// What a delivered signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Reload,
    Reset,
    Shutdown,
}

pub fn action_for_signal(signal: i32) -> Option<SignalAction> {
    match signal {
        SIGHUP => Some(SignalAction::Reload),
        SIGUSR1 => Some(SignalAction::Reset),
        SIGTERM | SIGINT => Some(SignalAction::Shutdown),
        _ => None,
    }
}

/// Turn an action into a message. A reload whose loader fails yields
/// nothing, leaving the current configuration in effect.
pub fn control_for_action<F>(action: SignalAction, reload: &F) -> Option<Control>
where
    F: Fn() -> Option<Config>,
{
    match action {
        SignalAction::Reload => reload().map(|config| Control::Reload(Box::new(config))),
        SignalAction::Reset => Some(Control::Reset),
        SignalAction::Shutdown => Some(Control::Shutdown),
    }
}

/// Background thread forwarding process signals as control messages.
pub struct SignalBridge {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalBridge {
    /// Register handlers for HUP, INT, TERM and USR1 and start forwarding.
    pub fn spawn<F>(tx: Sender<Control>, reload: F) -> std::io::Result<Self>
    where
        F: Fn() -> Option<Config> + Send + 'static,
    {
        let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM, SIGUSR1])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("procan-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    let Some(action) = action_for_signal(signal) else {
                        continue;
                    };
                    info!(signal, ?action, "signal received");
                    let Some(message) = control_for_action(action, &reload) else {
                        warn!("configuration reload failed, keeping current configuration");
                        continue;
                    };
                    if tx.send(message).is_err() {
                        debug!("analyzer gone, signal bridge exiting");
                        break;
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Unregister the handlers and join the thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
