//! Orderly teardown of every mount at exit

use super::sweep::LivenessSweep;
use crate::supervisor::{MountSupervisor, SupervisorError, UnmountOptions};
use tracing::{error, info, warn};

/// Answer to a failed unmount during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownChoice {
    /// Terminate the mount process and carry on
    Force,
    /// Stop shutting down and keep every remaining mount
    Abort,
}

/// Result of [`shutdown_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every mount is gone; the process may exit
    Completed,
    /// The user aborted; remaining mounts are untouched and the sweep runs again
    Aborted,
}

/// Asks the user what to do when a mount refuses to unmount.
#[async_trait::async_trait]
pub trait ShutdownPrompt: Send {
    async fn choose(&mut self, name: &str, error: &SupervisorError) -> ShutdownChoice;
}

/// Unmount every tracked name, asking `prompt` on each failure.
///
/// The sweep is stopped first so it cannot race the teardown. Names are
/// processed in sorted order. A mount started while shutdown is running is
/// picked up by the next pass.
pub async fn shutdown_all(
    supervisor: &MountSupervisor,
    sweep: &mut LivenessSweep,
    prompt: &mut dyn ShutdownPrompt,
) -> ShutdownOutcome {
    sweep.stop().await;

    let clean = UnmountOptions {
        force: false,
        suppress_notification: true,
    };

    loop {
        let names = supervisor.mounted_names();
        if names.is_empty() {
            break;
        }
        info!("Unmounting {} remote(s) before exit", names.len());

        for name in names {
            match supervisor.unmount(&name, clean).await {
                Ok(()) | Err(SupervisorError::NotMounted { .. }) => {}
                Err(e @ SupervisorError::UnmountFailed { .. }) => {
                    match prompt.choose(&name, &e).await {
                        ShutdownChoice::Force => {
                            warn!("Forcing unmount of {name}");
                            if let Err(e) = supervisor.unmount(&name, UnmountOptions::forced()).await
                            {
                                warn!("Forced unmount of {name} skipped: {e}");
                            }
                        }
                        ShutdownChoice::Abort => {
                            info!("Shutdown aborted at {name}; keeping remaining mounts");
                            sweep.start();
                            return ShutdownOutcome::Aborted;
                        }
                    }
                }
                Err(e) => error!("Unexpected error unmounting {name}: {e}"),
            }
        }
    }

    info!("All mounts released");
    ShutdownOutcome::Completed
}
