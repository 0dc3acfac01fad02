//! Surfaces mount events to the user

use crate::supervisor::MountEvent;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Log every mount event until cancelled or the supervisor goes away.
///
/// Failures are logged at warn so they stand out on a quiet console.
pub async fn notify_loop(mut events: Receiver<MountEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => notify(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notifier fell behind, {skipped} mount event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}

fn notify(event: &MountEvent) {
    if event.is_failure() {
        warn!("{event}");
    } else {
        info!("{event}");
    }
}
