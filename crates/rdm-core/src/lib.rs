//! Core types for rclone-drive-manager (rdm)
//!
//! This crate holds what the daemon and the configuration CLI share:
//! data directory resolution, logging setup, and the JSON mount
//! configuration store.

pub mod config;
pub mod home;
pub mod logging;

pub use config::{ConfigItem, ConfigSnapshot, ConfigStore, MountConfig};
