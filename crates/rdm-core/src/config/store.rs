//! Loading and saving the mount configuration file

use super::types::ConfigSnapshot;
use crate::home;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// `count` promised an item that is not present
    #[error("config item at index {index} is missing")]
    MissingItem { index: usize },

    /// An item has no remote name
    #[error("config item at index {index} has an empty remote name")]
    EmptyName { index: usize },

    /// Two items share a remote name
    #[error("remote '{name}' is configured more than once")]
    DuplicateName { name: String },

    /// Data directory could not be resolved
    #[error("could not resolve data directory: {0}")]
    DataDir(String),
}

/// JSON-file backed store for [`ConfigSnapshot`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the canonical location (`<data dir>/config.json`).
    pub fn open_default() -> Result<Self, ConfigError> {
        let path = home::config_file_path().map_err(|e| ConfigError::DataDir(e.to_string()))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. A missing file is an empty configuration.
    pub fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using empty config", self.path.display());
                return Ok(ConfigSnapshot::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the snapshot, creating the parent directory if needed.
    ///
    /// The file is replaced atomically so a concurrent reader (the daemon's
    /// config watcher) never sees a partial document.
    pub fn save(&self, snapshot: &ConfigSnapshot) -> Result<(), ConfigError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|source| ConfigError::Io {
            path: parent.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!("Saved {} remote(s) to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}
