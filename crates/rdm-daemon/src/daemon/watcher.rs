//! File system watcher for the configuration file

use crate::supervisor::MountSupervisor;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rdm_core::ConfigStore;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Load the config file and hand the result to the supervisor.
///
/// On error the supervisor keeps its previous snapshot.
pub fn reload_configs(store: &ConfigStore, supervisor: &MountSupervisor) -> Result<usize> {
    let snapshot = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;
    let configs = snapshot.mount_configs();
    let count = configs.len();
    supervisor.replace_configs(configs);
    Ok(count)
}

/// Watch the config file and reload it whenever it changes.
///
/// The parent directory is watched rather than the file itself: saves
/// replace the file through a rename, which would end a watch on the old
/// inode.
pub async fn watch_config(
    store: ConfigStore,
    supervisor: Arc<MountSupervisor>,
    cancel: CancellationToken,
) -> Result<()> {
    let config_path = store.path().to_path_buf();
    let config_dir = config_path
        .parent()
        .context("Config path has no parent directory")?
        .to_path_buf();
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    info!("Starting config watcher for: {}", config_path.display());

    let (tx, rx) = channel();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(e) = tx.send(event) {
                    error!("Failed to send file system event: {}", e);
                }
            }
            Err(e) => {
                error!("File system watcher error: {}", e);
            }
        })
        .context("Failed to create file system watcher")?;

    watcher
        .watch(&config_dir, RecursiveMode::NonRecursive)
        .context("Failed to watch config directory")?;

    tokio::task::spawn_blocking(move || {
        // Keep the watcher alive for the lifetime of the loop.
        let _watcher = watcher;
        loop {
            if cancel.is_cancelled() {
                info!("Config watcher cancelled");
                break;
            }

            match rx.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    // One save produces several events; reload once per burst.
                    let burst = std::iter::once(event).chain(rx.try_iter());
                    let mut relevant = false;
                    for event in burst {
                        relevant |= is_config_event(&config_path, &event);
                    }
                    if !relevant {
                        continue;
                    }

                    match reload_configs(&store, &supervisor) {
                        Ok(count) => info!("Config reloaded: {count} remote(s)"),
                        Err(e) => warn!("Keeping previous configuration: {e:#}"),
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    warn!("Watcher channel disconnected");
                    break;
                }
            }
        }
    })
    .await
    .context("Watcher task panicked")?;

    Ok(())
}

/// `true` if `event` creates, modifies, or removes the config file.
fn is_config_event(config_path: &Path, event: &Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == config_path.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::mock::{MockLauncher, MockUnmounter};
    use rdm_core::{ConfigItem, ConfigSnapshot};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    fn supervisor() -> MountSupervisor {
        MountSupervisor::new(
            Vec::new(),
            Arc::new(MockLauncher::new()),
            Arc::new(MockUnmounter::succeeding()),
        )
    }

    #[test]
    fn test_config_write_is_relevant() {
        let config = Path::new("/data/rdm/config.json");
        let modify = event(
            EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            "/data/rdm/config.json",
        );
        let create = event(
            EventKind::Create(notify::event::CreateKind::File),
            "/data/rdm/config.json",
        );
        assert!(is_config_event(config, &modify));
        assert!(is_config_event(config, &create));
    }

    #[test]
    fn test_other_files_and_access_are_ignored() {
        let config = Path::new("/data/rdm/config.json");
        let temp_file = event(
            EventKind::Create(notify::event::CreateKind::File),
            "/data/rdm/.tmpA1b2C3",
        );
        let access = event(
            EventKind::Access(notify::event::AccessKind::Read),
            "/data/rdm/config.json",
        );
        assert!(!is_config_event(config, &temp_file));
        assert!(!is_config_event(config, &access));
    }

    #[test]
    fn test_reload_replaces_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.json"));
        store
            .save(&ConfigSnapshot::new(vec![ConfigItem::new("gdrive", "~/GDrive")]))
            .unwrap();

        let supervisor = supervisor();
        assert_eq!(reload_configs(&store, &supervisor).unwrap(), 1);
        assert_eq!(supervisor.configs()[0].name, "gdrive");
    }

    #[test]
    fn test_invalid_file_keeps_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.json"));
        store
            .save(&ConfigSnapshot::new(vec![ConfigItem::new("gdrive", "~/GDrive")]))
            .unwrap();
        let supervisor = supervisor();
        reload_configs(&store, &supervisor).unwrap();

        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(reload_configs(&store, &supervisor).is_err());
        assert_eq!(supervisor.configs().len(), 1);
    }
}
