//! Mount state change notifications.
//!
//! The supervisor publishes [`MountEvent`] values on a broadcast channel.
//! Any number of listeners may subscribe; a listener that falls behind loses
//! the oldest events (`RecvError::Lagged`) rather than slowing the supervisor.
//! Events for a single name are always published in lifecycle order.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use super::constants::EVENT_CHANNEL_CAPACITY;

/// A mount lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MountEvent {
    /// The mount process started and survived the startup debounce
    Mounted { name: String },
    /// A mount request was rejected or the process died during startup
    MountFailed { name: String, reason: String },
    /// The mount was torn down (by request, or the process exited cleanly)
    Unmounted { name: String },
    /// A clean unmount was requested but every attempt failed
    UnmountFailed { name: String, reason: String },
    /// A previously mounted process exited with a non-zero code
    DiedUnexpectedly { name: String, exit_code: i32 },
}

impl MountEvent {
    /// Name of the configuration this event is about.
    pub fn name(&self) -> &str {
        match self {
            Self::Mounted { name }
            | Self::MountFailed { name, .. }
            | Self::Unmounted { name }
            | Self::UnmountFailed { name, .. }
            | Self::DiedUnexpectedly { name, .. } => name,
        }
    }

    /// `true` for events that end a mount's lifetime.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unmounted { .. } | Self::DiedUnexpectedly { .. })
    }

    /// `true` for events a user should be alerted about.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::MountFailed { .. } | Self::UnmountFailed { .. } | Self::DiedUnexpectedly { .. }
        )
    }
}

impl std::fmt::Display for MountEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mounted { name } => write!(f, "{name} mounted"),
            Self::MountFailed { name, reason } => write!(f, "{name} failed to mount: {reason}"),
            Self::Unmounted { name } => write!(f, "{name} unmounted"),
            Self::UnmountFailed { name, reason } => {
                write!(f, "{name} failed to unmount: {reason}")
            }
            Self::DiedUnexpectedly { name, exit_code } => {
                write!(f, "{name} mount process died unexpectedly (exit code {exit_code})")
            }
        }
    }
}

/// Broadcast publisher for [`MountEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MountEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Register a new listener. It only sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MountEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn emit(&self, event: MountEvent) {
        trace!("Publishing mount event: {event}");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
