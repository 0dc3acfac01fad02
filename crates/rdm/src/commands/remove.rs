//! Remove command implementation

use anyhow::Result;
use clap::Args;
use rdm_core::ConfigStore;

use super::error::CommandError;
use super::normalize_remote;

/// Remove a remote
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// rclone remote name
    remote: String,
}

/// Execute the remove command
///
/// A running mount of the remote is not touched; unmount it from the daemon.
pub fn execute(store: &ConfigStore, args: RemoveArgs) -> Result<()> {
    let name = normalize_remote(&args.remote);
    let mut snapshot = store.load()?;

    if snapshot.remove(&name).is_none() {
        return Err(CommandError::RemoteNotFound { name }.into());
    }

    store.save(&snapshot)?;
    println!("Removed remote '{name}'");
    Ok(())
}
