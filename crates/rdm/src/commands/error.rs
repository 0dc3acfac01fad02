//! Error types for command execution

use thiserror::Error;

/// Command execution errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// No remote with this name in the configuration
    #[error("Remote '{name}' not found in configuration")]
    RemoteNotFound { name: String },

    /// `edit` was called without anything to change
    #[error("Nothing to change: pass --mountpoint and/or --args")]
    NothingToChange,
}
