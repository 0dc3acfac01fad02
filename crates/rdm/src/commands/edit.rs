//! Edit command implementation

use anyhow::Result;
use clap::Args;
use rdm_core::ConfigStore;

use super::error::CommandError;
use super::normalize_remote;

/// Change the mountpoint or mount arguments of a remote
#[derive(Args, Debug)]
pub struct EditArgs {
    /// rclone remote name
    remote: String,

    /// New mount directory
    #[arg(long, value_name = "PATH")]
    mountpoint: Option<String>,

    /// New mount arguments (replaces the old ones)
    #[arg(long, allow_hyphen_values = true, value_name = "TEXT")]
    args: Option<String>,
}

/// Execute the edit command
pub fn execute(store: &ConfigStore, args: EditArgs) -> Result<()> {
    if args.mountpoint.is_none() && args.args.is_none() {
        return Err(CommandError::NothingToChange.into());
    }

    let name = normalize_remote(&args.remote);
    let mut snapshot = store.load()?;
    let item = snapshot
        .get_mut(&name)
        .ok_or_else(|| CommandError::RemoteNotFound { name: name.clone() })?;

    if let Some(mountpoint) = args.mountpoint {
        item.mount_point = mountpoint;
    }
    if let Some(mount_args) = args.args {
        item.mount_args = mount_args;
    }

    store.save(&snapshot)?;
    println!("Updated remote '{name}'");
    Ok(())
}
