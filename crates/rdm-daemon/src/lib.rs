//! rclone-drive-manager daemon
//!
//! Supervises rclone mounts for the configured remotes and exposes a line
//! based console for toggling them.

pub mod console;
pub mod daemon;
pub mod supervisor;
