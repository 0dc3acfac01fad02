//! Add command implementation

use anyhow::Result;
use clap::Args;
use rdm_core::{ConfigItem, ConfigStore};
use tracing::debug;

use super::normalize_remote;

/// Add a remote
#[derive(Args, Debug)]
pub struct AddArgs {
    /// rclone remote name (with or without the trailing colon)
    remote: String,

    /// Local directory to mount at; `~` and environment variables are expanded at mount time
    mountpoint: String,

    /// Mount arguments (default: --dir-cache-time 1m0s --vfs-cache-mode full)
    #[arg(long, allow_hyphen_values = true, value_name = "TEXT")]
    args: Option<String>,
}

/// Execute the add command
pub fn execute(store: &ConfigStore, args: AddArgs) -> Result<()> {
    let mut snapshot = store.load()?;

    let mut item = ConfigItem::new(normalize_remote(&args.remote), args.mountpoint);
    if let Some(mount_args) = args.args {
        item.mount_args = mount_args;
    }
    let name = item.remote_name.clone();

    snapshot.push(item)?;
    store.save(&snapshot)?;
    debug!("Config now has {} remote(s)", snapshot.len());

    println!("Added remote '{name}'");
    Ok(())
}
