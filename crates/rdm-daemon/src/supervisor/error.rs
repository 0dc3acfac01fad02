//! Error types for mount supervision

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`MountSupervisor`](super::MountSupervisor) operations.
///
/// None of these are fatal to the process; each one leaves the live-mount
/// table in a consistent state.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// No configuration with this name in the current snapshot
    #[error("no configuration named '{name}'")]
    ConfigNotFound { name: String },

    /// The configuration has an empty mountpoint
    #[error("configuration '{name}' has no mountpoint")]
    InvalidMountpoint { name: String },

    /// The mountpoint cannot be created, is not a directory, or is not empty
    #[error("mountpoint {path} is unusable: {reason}")]
    MountpointUnusable { path: PathBuf, reason: String },

    /// The OS refused to start the mount executable
    #[error("failed to launch {executable}: {source}")]
    Spawn {
        executable: PathBuf,
        source: std::io::Error,
    },

    /// The mount process exited inside the startup debounce window
    #[error("mount process for '{name}' exited during startup with code {exit_code}")]
    MountFailed { name: String, exit_code: i32 },

    /// A mount, or an unmount, is already in progress or complete for this name
    #[error("'{name}' is already mounted or has an operation in flight")]
    AlreadyActive { name: String },

    /// The name is not in the live-mount table
    #[error("'{name}' is not mounted")]
    NotMounted { name: String },

    /// Every clean unmount attempt failed and force was not requested
    #[error("failed to unmount '{name}' after {attempts} attempt(s)")]
    UnmountFailed { name: String, attempts: u32 },
}
