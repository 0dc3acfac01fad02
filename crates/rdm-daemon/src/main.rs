//! rdm-daemon - keeps rclone mounts for the configured remotes

use anyhow::{Context, Result};
use clap::Parser;
use rdm_core::ConfigStore;
use rdm_daemon::console::Console;
use rdm_daemon::daemon;
use rdm_daemon::supervisor::MountSupervisor;
use rdm_daemon::supervisor::constants::SWEEP_INTERVAL;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};

/// rdm-daemon - mount and unmount rclone remotes from a console
#[derive(Parser, Debug)]
#[command(name = "rdm-daemon")]
#[command(about = "Mount supervisor for rclone remotes")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// rclone executable (default: rclone from PATH)
    #[arg(long, value_name = "PATH")]
    rclone: Option<PathBuf>,

    /// Remote to mount at startup (repeatable)
    #[arg(long = "mount", value_name = "NAME")]
    mounts: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        rdm_core::logging::init_with_level(tracing::Level::DEBUG);
    } else {
        rdm_core::logging::init();
    }

    info!("rdm-daemon starting...");

    let store = match args.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::open_default().context("Failed to determine config location")?,
    };
    let snapshot = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;
    info!(
        "Loaded {} remote(s) from {}",
        snapshot.len(),
        store.path().display()
    );

    let mut supervisor = MountSupervisor::system(snapshot.mount_configs());
    if let Some(rclone) = args.rclone {
        supervisor = supervisor.with_executable(rclone);
    }
    let supervisor = Arc::new(supervisor);

    for name in &args.mounts {
        if let Err(e) = supervisor.mount(name).await {
            error!("Startup mount of {name} failed: {e}");
        }
    }

    let (quit_tx, quit_rx) = mpsc::channel(4);
    spawn_signal_listener(quit_tx)?;

    let mut console = Console::new(
        Arc::clone(&supervisor),
        store.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    daemon::run(supervisor, store, &mut console, quit_rx, SWEEP_INTERVAL)
        .await
        .context("Daemon event loop failed")?;

    info!("rdm-daemon shutdown complete");
    Ok(())
}

/// Forward every SIGINT/SIGTERM as a shutdown request.
///
/// Signals keep flowing after an aborted shutdown, so the user can try again.
fn spawn_signal_listener(quit_tx: mpsc::Sender<()>) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to create SIGTERM handler")?;

    tokio::spawn(async move {
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for Ctrl+C: {}", e);
                            break;
                        }
                        info!("Received SIGINT (Ctrl+C)");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    break;
                }
                info!("Received Ctrl+C");
            }

            if quit_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    Ok(())
}
