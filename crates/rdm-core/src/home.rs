//! Canonical data directory resolution for rclone-drive-manager
//!
//! Provides a single source of truth for where the drive manager keeps its
//! files (currently just `config.json`). Every crate in the workspace resolves
//! paths through this module so that `RDM_HOME` is honored consistently.
//!
//! # Precedence
//!
//! 1. `RDM_HOME` environment variable (if set and non-empty)
//! 2. `dirs::data_dir()` joined with [`APP_DIR_NAME`]
//!
//! On Linux the platform default is `~/.local/share/rclone-drive-manager`,
//! on macOS `~/Library/Application Support/rclone-drive-manager`.
//!
//! # Testing
//!
//! Integration tests MUST use `RDM_HOME` to redirect the data directory:
//!
//! ```ignore
//! use assert_cmd::Command;
//! use tempfile::TempDir;
//!
//! let temp_dir = TempDir::new().unwrap();
//! let mut cmd = Command::cargo_bin("rdm").unwrap();
//! cmd.env("RDM_HOME", temp_dir.path());
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory name used under the platform data directory.
pub const APP_DIR_NAME: &str = "rclone-drive-manager";

/// File name of the persisted mount configuration.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Get the data directory for drive manager state.
///
/// # Errors
///
/// Returns an error if `RDM_HOME` is not set and the platform data
/// directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("RDM_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    let base = dirs::data_dir().context("Could not determine platform data directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// The user's home directory, used for `~` in configured mountpoints.
pub fn user_home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Path of the mount configuration file inside [`get_data_dir`].
pub fn config_file_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE_NAME))
}
