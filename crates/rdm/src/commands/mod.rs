//! CLI command dispatch and execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rdm_core::ConfigStore;
use std::path::PathBuf;

mod add;
mod edit;
mod error;
mod list;
mod path;
mod remove;

/// rdm - manage rclone remotes for rclone-drive-manager
#[derive(Parser, Debug)]
#[command(
    name = "rdm",
    version,
    about = "Manage the rclone remotes mounted by rdm-daemon",
    long_about = "Add, edit, and remove the remotes listed in the rclone-drive-manager config file"
)]
pub struct Cli {
    /// Path to configuration file (default: <data dir>/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured remotes
    List(list::ListArgs),

    /// Add a remote
    Add(add::AddArgs),

    /// Change the mountpoint or mount arguments of a remote
    Edit(edit::EditArgs),

    /// Remove a remote
    Remove(remove::RemoveArgs),

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let store = open_store(self.config)?;
        match self.command {
            Commands::List(args) => list::execute(&store, args),
            Commands::Add(args) => add::execute(&store, args),
            Commands::Edit(args) => edit::execute(&store, args),
            Commands::Remove(args) => remove::execute(&store, args),
            Commands::Path => path::execute(&store),
        }
    }
}

fn open_store(config: Option<PathBuf>) -> Result<ConfigStore> {
    match config {
        Some(path) => Ok(ConfigStore::new(path)),
        None => ConfigStore::open_default().context("Failed to determine config location"),
    }
}

/// Remote names are stored without rclone's trailing colon.
fn normalize_remote(name: &str) -> String {
    name.trim().trim_end_matches(':').to_string()
}
