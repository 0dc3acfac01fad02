//! Periodic liveness sweep task

use crate::supervisor::MountSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run [`MountSupervisor::sweep`] at a fixed interval until cancelled.
pub async fn sweep_loop(
    supervisor: Arc<MountSupervisor>,
    interval_duration: Duration,
    cancel: CancellationToken,
) {
    info!("Starting liveness sweep (interval: {:?})", interval_duration);
    let mut ticker = interval(interval_duration);
    // The first tick completes immediately; nothing can have died yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let events = supervisor.sweep();
                debug!("Liveness sweep complete: {} change(s)", events.len());
            }
            _ = cancel.cancelled() => {
                info!("Liveness sweep stopped");
                break;
            }
        }
    }
}

/// Start/stop control over a background [`sweep_loop`].
///
/// Shutdown stops the sweep before it starts tearing mounts down, and
/// restarts it when the user aborts.
pub struct LivenessSweep {
    supervisor: Arc<MountSupervisor>,
    interval: Duration,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl LivenessSweep {
    pub fn new(supervisor: Arc<MountSupervisor>, interval: Duration) -> Self {
        Self {
            supervisor,
            interval,
            running: None,
        }
    }

    /// Spawn the sweep task. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sweep_loop(
            Arc::clone(&self.supervisor),
            self.interval,
            cancel.clone(),
        ));
        self.running = Some((cancel, task));
    }

    /// Cancel the sweep task and wait for it to finish.
    pub async fn stop(&mut self) {
        if let Some((cancel, task)) = self.running.take() {
            cancel.cancel();
            if let Err(e) = task.await {
                warn!("Liveness sweep task panicked: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for LivenessSweep {
    fn drop(&mut self) {
        if let Some((cancel, _)) = self.running.take() {
            cancel.cancel();
        }
    }
}
