//! Mount lifecycle supervision
//!
//! [`MountSupervisor`] launches the mount executable for a named
//! configuration, confirms it survives startup, keeps a live-mount table,
//! and tears mounts down cleanly or by force. State changes are published as
//! [`MountEvent`]s.

pub mod constants;
pub mod error;
pub mod events;
mod handle;
pub mod launcher;
mod lifecycle;
pub mod mock;
pub mod mountpoint;

pub use error::SupervisorError;
pub use events::{EventBus, MountEvent};
pub use handle::{MountHandle, MountInfo, MountState};
pub use launcher::{
    ChildProcess, MountProcess, ProcessLauncher, SystemLauncher, UnmountCommand, Unmounter,
};
pub use lifecycle::{MountSupervisor, UnmountOptions, mount_invocation};
