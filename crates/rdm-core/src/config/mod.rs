//! Mount configuration
//!
//! The configuration is an ordered list of remotes persisted as JSON in the
//! data directory (see [`crate::home`]). The mount supervisor only ever reads
//! it, by name, through [`ConfigSnapshot::mount_configs`].

mod store;
mod types;

pub use store::{ConfigError, ConfigStore};
pub use types::{ConfigItem, ConfigSnapshot, DEFAULT_MOUNT_ARGS, MountConfig};
