//! Configuration types

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Mount arguments pre-filled for a newly added remote.
pub const DEFAULT_MOUNT_ARGS: &str = "--dir-cache-time 1m0s\n--vfs-cache-mode full";

/// One remote as it is stored on disk and edited by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Name of the rclone remote (without the trailing colon)
    pub remote_name: String,
    /// Local directory; may contain `~` and environment variables
    pub mount_point: String,
    /// Free-form mount options, split on whitespace at mount time
    #[serde(default)]
    pub mount_args: String,
}

impl ConfigItem {
    /// Create an item with [`DEFAULT_MOUNT_ARGS`].
    pub fn new(remote_name: impl Into<String>, mount_point: impl Into<String>) -> Self {
        Self {
            remote_name: remote_name.into(),
            mount_point: mount_point.into(),
            mount_args: DEFAULT_MOUNT_ARGS.to_string(),
        }
    }
}

/// Immutable view of one configuration handed to the mount supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub name: String,
    /// Raw mountpoint, expanded by the supervisor before use
    pub mountpoint: String,
    /// Argument tokens, passed to the mount executable verbatim
    pub args: Vec<String>,
}

impl From<&ConfigItem> for MountConfig {
    fn from(item: &ConfigItem) -> Self {
        Self {
            name: item.remote_name.clone(),
            mountpoint: item.mount_point.clone(),
            args: item
                .mount_args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Ordered list of configured remotes.
///
/// Serialized in the index-keyed layout
/// `{"count": N, "items": {"0": {...}, "1": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot", into = "RawSnapshot")]
pub struct ConfigSnapshot {
    items: Vec<ConfigItem>,
}

#[derive(Serialize, Deserialize)]
struct RawSnapshot {
    count: usize,
    #[serde(default)]
    items: BTreeMap<String, ConfigItem>,
}

impl TryFrom<RawSnapshot> for ConfigSnapshot {
    type Error = ConfigError;

    fn try_from(mut raw: RawSnapshot) -> Result<Self, Self::Error> {
        let items = (0..raw.count)
            .map(|index| {
                raw.items
                    .remove(&index.to_string())
                    .ok_or(ConfigError::MissingItem { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }
}

impl From<ConfigSnapshot> for RawSnapshot {
    fn from(snapshot: ConfigSnapshot) -> Self {
        Self {
            count: snapshot.items.len(),
            items: snapshot
                .items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
        }
    }
}

impl ConfigSnapshot {
    /// Create a snapshot from items in display order.
    pub fn new(items: Vec<ConfigItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ConfigItem] {
        &self.items
    }

    /// Look up an item by remote name.
    pub fn get(&self, name: &str) -> Option<&ConfigItem> {
        self.items.iter().find(|item| item.remote_name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConfigItem> {
        self.items.iter_mut().find(|item| item.remote_name == name)
    }

    /// Append an item, rejecting empty or duplicate names.
    pub fn push(&mut self, item: ConfigItem) -> Result<(), ConfigError> {
        if item.remote_name.trim().is_empty() {
            return Err(ConfigError::EmptyName {
                index: self.items.len(),
            });
        }
        if self.get(&item.remote_name).is_some() {
            return Err(ConfigError::DuplicateName {
                name: item.remote_name,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove an item by remote name, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Option<ConfigItem> {
        let index = self.items.iter().position(|item| item.remote_name == name)?;
        Some(self.items.remove(index))
    }

    /// Check that every name is non-empty and unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, item) in self.items.iter().enumerate() {
            if item.remote_name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if !seen.insert(item.remote_name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    name: item.remote_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Mount configurations for the supervisor.
    ///
    /// Entries with an empty name are skipped; for duplicate names the first
    /// entry wins.
    pub fn mount_configs(&self) -> Vec<MountConfig> {
        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if item.remote_name.trim().is_empty() {
                warn!("Skipping config entry with empty remote name");
                continue;
            }
            if !seen.insert(item.remote_name.as_str()) {
                warn!("Skipping duplicate config entry for remote {}", item.remote_name);
                continue;
            }
            configs.push(MountConfig::from(item));
        }
        configs
    }
}
