//! Mount directory preparation and cleanup.
//!
//! Both directions share one data-loss guard: a directory with content is
//! never mounted over and never removed.

use super::error::SupervisorError;
use rdm_core::home;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand `~` and `$VAR` / `${VAR}` references in a configured mountpoint.
///
/// Each variable is looked up on its own; unknown ones are left in place
/// rather than rejected, and do not stop the known ones from expanding.
pub fn expand(raw: &str) -> PathBuf {
    let expanded = shellexpand::full_with_context_no_errors(
        raw,
        || home::user_home_dir().map(|dir| dir.to_string_lossy().into_owned()),
        |var| {
            let value = std::env::var(var).ok();
            if value.is_none() {
                debug!("Leaving unresolved variable ${var} in {raw}");
            }
            value
        },
    );
    PathBuf::from(expanded.into_owned())
}

/// Make sure `path` is an empty directory, creating it if missing.
///
/// Returns `true` when the directory was created by this call.
pub fn prepare(path: &Path) -> Result<bool, SupervisorError> {
    let unusable = |reason: String| SupervisorError::MountpointUnusable {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| unusable(format!("cannot create: {e}")))?;
        debug!("Created mountpoint {}", path.display());
        return Ok(true);
    }

    if !path.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }

    let mut entries =
        std::fs::read_dir(path).map_err(|e| unusable(format!("cannot read: {e}")))?;
    if entries.next().is_some() {
        return Err(unusable("directory is not empty".to_string()));
    }

    Ok(false)
}

/// Best-effort removal of an empty mount directory.
///
/// Non-empty directories and errors are left alone; a failure here never
/// turns a successful unmount into a failed one.
pub fn remove_if_empty(path: &Path) {
    match std::fs::remove_dir(path) {
        Ok(()) => debug!("Removed mountpoint {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            // remove_dir refuses non-empty directories, which is the guard.
            if path.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) {
                debug!("Keeping non-empty mountpoint {}", path.display());
            } else {
                warn!("Failed to remove mountpoint {}: {e}", path.display());
            }
        }
    }
}
