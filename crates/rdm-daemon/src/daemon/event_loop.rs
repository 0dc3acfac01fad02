//! Main daemon event loop

use crate::console::{Console, Flow};
use crate::daemon::{LivenessSweep, ShutdownOutcome, notify_loop, shutdown_all, watch_config};
use crate::supervisor::MountSupervisor;
use anyhow::Result;
use rdm_core::ConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the daemon until shutdown completes.
///
/// This function:
/// 1. Starts the liveness sweep, the notifier, and the config watcher
/// 2. Executes console commands as they arrive
/// 3. On `quit` or a message on `quit_rx` (SIGINT/SIGTERM), unmounts everything
/// 4. Returns once every mount is gone; an aborted shutdown keeps running
///
/// After console input ends, only `quit_rx` can stop the daemon.
pub async fn run<R, W>(
    supervisor: Arc<MountSupervisor>,
    store: ConfigStore,
    console: &mut Console<R, W>,
    mut quit_rx: mpsc::Receiver<()>,
    sweep_interval: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    info!("Initializing daemon event loop");
    let cancel = CancellationToken::new();

    let mut sweep = LivenessSweep::new(Arc::clone(&supervisor), sweep_interval);
    sweep.start();

    let notifier_task = tokio::spawn(notify_loop(supervisor.subscribe(), cancel.clone()));

    let watcher_supervisor = Arc::clone(&supervisor);
    let watcher_cancel = cancel.clone();
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watch_config(store, watcher_supervisor, watcher_cancel).await {
            error!("Config watcher failed: {:#}", e);
        }
    });

    info!("Daemon event loop running. Type 'help' for commands.");
    let mut signals_open = true;

    loop {
        let quit = tokio::select! {
            line = console.next_line(), if !console.is_closed() => match line {
                Ok(Some(line)) => match console.handle_line(&line).await {
                    Ok(flow) => flow == Flow::Quit,
                    Err(e) => {
                        warn!("Console command failed: {:#}", e);
                        false
                    }
                },
                Ok(None) => {
                    info!("Console input closed; send SIGINT or SIGTERM to exit");
                    false
                }
                Err(e) => {
                    warn!("{:#}", e);
                    false
                }
            },
            request = quit_rx.recv(), if signals_open => {
                if request.is_none() {
                    signals_open = false;
                }
                request.is_some()
            }
            else => true,
        };

        if !quit {
            continue;
        }

        info!("Shutdown requested");
        match shutdown_all(&supervisor, &mut sweep, console).await {
            ShutdownOutcome::Completed => break,
            ShutdownOutcome::Aborted => info!("Shutdown aborted; daemon keeps running"),
        }
    }

    cancel.cancel();

    if let Err(e) = tokio::time::timeout(Duration::from_secs(5), notifier_task).await {
        error!("Notifier task did not complete in time: {}", e);
    }

    if let Err(e) = tokio::time::timeout(Duration::from_secs(5), watcher_task).await {
        error!("Watcher task did not complete in time: {}", e);
    }

    info!("Daemon event loop shutdown complete");
    Ok(())
}
