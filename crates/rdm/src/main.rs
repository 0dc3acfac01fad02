//! rdm - manage the remotes rclone-drive-manager can mount
//!
//! Edits the JSON configuration read by `rdm-daemon`. A running daemon
//! picks up saved changes on its own.

use clap::Parser;

mod commands;

use commands::Cli;

fn main() {
    rdm_core::logging::init();
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
