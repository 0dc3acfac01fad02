//! List command implementation

use anyhow::Result;
use clap::Args;
use rdm_core::ConfigStore;

/// List configured remotes
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the list command
pub fn execute(store: &ConfigStore, args: ListArgs) -> Result<()> {
    let snapshot = store.load()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(snapshot.items())?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No remotes configured ({})", store.path().display());
        return Ok(());
    }

    let width = snapshot
        .items()
        .iter()
        .map(|item| item.remote_name.len())
        .max()
        .unwrap_or(0);
    for item in snapshot.items() {
        let name = &item.remote_name;
        let mountpoint = &item.mount_point;
        let args = item.mount_args.split_whitespace().collect::<Vec<_>>().join(" ");
        println!("{name:<width$}  {mountpoint}  {args}");
    }

    Ok(())
}
