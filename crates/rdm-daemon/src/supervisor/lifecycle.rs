//! The mount supervisor: mount, unmount, and liveness sweep.

use super::constants::{
    DEFAULT_EXECUTABLE, EXIT_POLL_INTERVAL, MOUNT_SUBCOMMAND, STARTUP_DEBOUNCE, TERMINATE_GRACE,
    UNMOUNT_ATTEMPTS, UNMOUNT_RETRY_DELAY,
};
use super::error::SupervisorError;
use super::events::{EventBus, MountEvent};
use super::handle::{MountHandle, MountInfo, MountState, Reservation, SharedTable, lock};
use super::launcher::{MountProcess, ProcessLauncher, SystemLauncher, UnmountCommand, Unmounter};
use super::mountpoint;
use rdm_core::MountConfig;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Options for [`MountSupervisor::unmount`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmountOptions {
    /// Terminate, then kill, the mount process if every clean attempt fails
    pub force: bool,
    /// Do not publish `UnmountFailed`; the caller reports the failure itself
    pub suppress_notification: bool,
}

impl UnmountOptions {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// Owns the live-mount table and every process in it.
///
/// Share it behind an `Arc`; all operations take `&self`. Operations on
/// different names run concurrently, and a second operation on a name that
/// is already starting or unmounting is rejected instead of queued.
pub struct MountSupervisor {
    configs: RwLock<Arc<Vec<MountConfig>>>,
    table: SharedTable,
    launcher: Arc<dyn ProcessLauncher>,
    unmounter: Arc<dyn Unmounter>,
    events: EventBus,
    executable: PathBuf,
}

impl MountSupervisor {
    pub fn new(
        configs: Vec<MountConfig>,
        launcher: Arc<dyn ProcessLauncher>,
        unmounter: Arc<dyn Unmounter>,
    ) -> Self {
        Self {
            configs: RwLock::new(Arc::new(configs)),
            table: SharedTable::default(),
            launcher,
            unmounter,
            events: EventBus::new(),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
        }
    }

    /// Supervisor that launches real processes and unmounts through the OS.
    pub fn system(configs: Vec<MountConfig>) -> Self {
        Self::new(
            configs,
            Arc::new(SystemLauncher),
            Arc::new(UnmountCommand::default()),
        )
    }

    /// Use `executable` instead of `rclone` from `PATH`.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Current configuration snapshot.
    pub fn configs(&self) -> Arc<Vec<MountConfig>> {
        Arc::clone(&self.configs.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new configuration snapshot.
    ///
    /// Running mounts are left alone, including ones whose configuration
    /// disappeared; they can still be unmounted by name.
    pub fn replace_configs(&self, configs: Vec<MountConfig>) {
        let orphaned: Vec<String> = self
            .mounted_names()
            .into_iter()
            .filter(|name| !configs.iter().any(|c| &c.name == name))
            .collect();
        if !orphaned.is_empty() {
            info!(
                "Configuration removed for mounted remote(s): {}",
                orphaned.join(", ")
            );
        }

        info!("Loaded {} mount configuration(s)", configs.len());
        *self.configs.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(configs);
    }

    fn config(&self, name: &str) -> Option<MountConfig> {
        self.configs().iter().find(|c| c.name == name).cloned()
    }

    /// Register a listener for mount events.
    pub fn subscribe(&self) -> broadcast::Receiver<MountEvent> {
        self.events.subscribe()
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        lock(&self.table).is_mounted(name)
    }

    pub fn state(&self, name: &str) -> MountState {
        lock(&self.table).state(name)
    }

    /// Live mounts, sorted by name.
    pub fn mounted(&self) -> Vec<MountInfo> {
        lock(&self.table).infos()
    }

    pub fn mounted_names(&self) -> Vec<String> {
        lock(&self.table).names()
    }

    /// Mount the configuration called `name`.
    ///
    /// Cancel safe: dropping the returned future after the process was
    /// launched terminates it and leaves it to the sweep.
    ///
    /// # Errors
    ///
    /// Every error except [`SupervisorError::AlreadyActive`] is also
    /// published as [`MountEvent::MountFailed`], unless the name is still
    /// live from before its configuration was removed. On error nothing is
    /// added to the table and a mount directory created by this call is
    /// removed again.
    pub async fn mount(&self, name: &str) -> Result<(), SupervisorError> {
        let Some(config) = self.config(name) else {
            let error = SupervisorError::ConfigNotFound {
                name: name.to_string(),
            };
            if self.state(name) != MountState::Unmounted {
                warn!("Mount of {name} refused: {error}");
                return Err(error);
            }
            return Err(self.mount_failed(name, error));
        };

        let reservation = Reservation::for_mount(&self.table, name)?;

        match self.start(&config, &reservation).await {
            Ok(mountpoint) => {
                let shown = mountpoint.display().to_string();
                let committed = reservation.commit_launch(mountpoint, || {
                    self.events.emit(MountEvent::Mounted {
                        name: name.to_string(),
                    })
                });
                if !committed {
                    return Err(self.mount_failed(
                        name,
                        SupervisorError::NotMounted {
                            name: name.to_string(),
                        },
                    ));
                }
                info!("Mounted {name} at {shown}");
                Ok(())
            }
            Err(e) => {
                // Published before the name is released, so events for this
                // name stay in order.
                let e = self.mount_failed(name, e);
                drop(reservation);
                Err(e)
            }
        }
    }

    fn mount_failed(&self, name: &str, error: SupervisorError) -> SupervisorError {
        warn!("Mount of {name} failed: {error}");
        self.events.emit(MountEvent::MountFailed {
            name: name.to_string(),
            reason: error.to_string(),
        });
        error
    }

    /// Launch the mount process and wait out the startup debounce.
    ///
    /// On success the process is attached to `reservation` and the expanded
    /// mountpoint is returned.
    async fn start(
        &self,
        config: &MountConfig,
        reservation: &Reservation,
    ) -> Result<PathBuf, SupervisorError> {
        let name = &config.name;
        if config.mountpoint.trim().is_empty() {
            return Err(SupervisorError::InvalidMountpoint { name: name.clone() });
        }

        let mountpoint = mountpoint::expand(&config.mountpoint);
        let created = mountpoint::prepare(&mountpoint)?;
        let discard_created = |mountpoint: &Path| {
            if created {
                mountpoint::remove_if_empty(mountpoint);
            }
        };

        let args = mount_invocation(config, &mountpoint);
        debug!("Launching {} {}", self.executable.display(), args.join(" "));

        match self.launcher.launch(&self.executable, &args) {
            Ok(process) => reservation.attach(process),
            Err(source) => {
                discard_created(&mountpoint);
                return Err(SupervisorError::Spawn {
                    executable: self.executable.clone(),
                    source,
                });
            }
        }

        if let Some(exit_code) =
            wait_for_exit(name, || reservation.try_exit_code(), STARTUP_DEBOUNCE).await
        {
            reservation.discard_launch();
            discard_created(&mountpoint);
            return Err(SupervisorError::MountFailed {
                name: name.clone(),
                exit_code,
            });
        }

        Ok(mountpoint)
    }

    /// Tear down the mount called `name`.
    ///
    /// The entry leaves the table before any OS call, so a concurrent sweep
    /// cannot report the same teardown twice.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::NotMounted`] if `name` is not in the table, and
    /// [`SupervisorError::UnmountFailed`] if every clean attempt failed
    /// without `force`; the handle is then back in the table.
    pub async fn unmount(&self, name: &str, options: UnmountOptions) -> Result<(), SupervisorError> {
        let (reservation, mut handle) = Reservation::for_unmount(&self.table, name)?;
        info!("Unmounting {name} from {}", handle.mountpoint.display());

        if let Ok(Some(code)) = handle.process.try_exit_code() {
            debug!("{name} mount process had already exited with code {code}");
            self.finish_unmount(name, &handle.mountpoint, None);
            drop(reservation);
            return Ok(());
        }

        if self.clean_unmount(&handle).await {
            let leftover = settle(name, handle.process).await;
            self.finish_unmount(name, &handle.mountpoint, leftover);
        } else if options.force {
            warn!("Clean unmount of {name} failed, stopping mount process");
            let leftover = force_stop(name, handle.process).await;
            self.finish_unmount(name, &handle.mountpoint, leftover);
        } else {
            let error = SupervisorError::UnmountFailed {
                name: name.to_string(),
                attempts: UNMOUNT_ATTEMPTS,
            };
            warn!("{error}");
            let reason = error.to_string();
            reservation.commit(handle, || {
                if !options.suppress_notification {
                    self.events.emit(MountEvent::UnmountFailed {
                        name: name.to_string(),
                        reason,
                    });
                }
            });
            return Err(error);
        }

        drop(reservation);
        Ok(())
    }

    /// Run the OS unmount command until it succeeds or attempts run out.
    async fn clean_unmount(&self, handle: &MountHandle) -> bool {
        for attempt in 1..=UNMOUNT_ATTEMPTS {
            match self.unmounter.unmount(&handle.mountpoint).await {
                Ok(true) => {
                    debug!("{} unmounted on attempt {attempt}", handle.name);
                    return true;
                }
                Ok(false) => debug!("Unmount attempt {attempt} for {} failed", handle.name),
                Err(e) => warn!("Unmount attempt {attempt} for {} failed: {e}", handle.name),
            }

            if attempt < UNMOUNT_ATTEMPTS {
                sleep(UNMOUNT_RETRY_DELAY).await;
            }
        }
        false
    }

    /// Clean the directory and publish `Unmounted` while the name is still
    /// reserved.
    fn finish_unmount(
        &self,
        name: &str,
        mountpoint: &Path,
        leftover: Option<Box<dyn MountProcess>>,
    ) {
        mountpoint::remove_if_empty(mountpoint);
        if let Some(process) = leftover {
            lock(&self.table).adopt(process);
        }
        info!("Unmounted {name}");
        self.events.emit(MountEvent::Unmounted {
            name: name.to_string(),
        });
    }

    /// Remove every entry whose process has exited and publish what happened.
    ///
    /// Exit code zero is reported as `Unmounted`, anything else as
    /// `DiedUnexpectedly`. Directory cleanup and publishing happen under the
    /// table lock, so a concurrent mount of the same name cannot interleave.
    pub fn sweep(&self) -> Vec<MountEvent> {
        let mut table = lock(&self.table);
        let still_orphaned = table.reap_orphans();
        if still_orphaned > 0 {
            debug!("{still_orphaned} detached mount process(es) still running");
        }

        let mut events = Vec::new();
        for (handle, exit_code) in table.reap_exited() {
            mountpoint::remove_if_empty(&handle.mountpoint);
            let event = if exit_code == 0 {
                info!("{} mount process exited", handle.name);
                MountEvent::Unmounted { name: handle.name }
            } else {
                warn!(
                    "{} mount process died unexpectedly with code {exit_code}",
                    handle.name
                );
                MountEvent::DiedUnexpectedly {
                    name: handle.name,
                    exit_code,
                }
            };
            self.events.emit(event.clone());
            events.push(event);
        }
        events
    }
}

impl std::fmt::Debug for MountSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountSupervisor")
            .field("executable", &self.executable)
            .field("mounted", &self.mounted_names())
            .finish_non_exhaustive()
    }
}

/// Arguments for the mount executable:
/// `mount <args...> <name>:/ <mountpoint>`.
pub fn mount_invocation(config: &MountConfig, mountpoint: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(config.args.len() + 3);
    args.push(MOUNT_SUBCOMMAND.to_string());
    args.extend(config.args.iter().cloned());
    args.push(format!("{}:/", config.name));
    args.push(mountpoint.to_string_lossy().into_owned());
    args
}

/// Call `poll` every [`EXIT_POLL_INTERVAL`] for up to `window`.
async fn wait_for_exit(
    name: &str,
    mut poll: impl FnMut() -> std::io::Result<Option<i32>>,
    window: Duration,
) -> Option<i32> {
    let deadline = Instant::now() + window;
    loop {
        match poll() {
            Ok(Some(code)) => return Some(code),
            Ok(None) => {}
            Err(e) => warn!("Failed to poll mount process for {name}: {e}"),
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(EXIT_POLL_INTERVAL).await;
    }
}

/// After a clean unmount the mount process normally exits on its own.
///
/// Returns the process if it is still running after a terminate request,
/// so the sweep can keep reaping it.
async fn settle(name: &str, mut process: Box<dyn MountProcess>) -> Option<Box<dyn MountProcess>> {
    if wait_for_exit(name, || process.try_exit_code(), TERMINATE_GRACE)
        .await
        .is_some()
    {
        return None;
    }

    debug!("{name} mount process outlived its mount, terminating");
    if let Err(e) = process.terminate() {
        warn!("Failed to terminate {name} mount process: {e}");
    }
    still_running(process)
}

/// Terminate, wait [`TERMINATE_GRACE`], then kill.
async fn force_stop(name: &str, mut process: Box<dyn MountProcess>) -> Option<Box<dyn MountProcess>> {
    if let Err(e) = process.terminate() {
        warn!("Failed to terminate {name} mount process: {e}");
    }

    if wait_for_exit(name, || process.try_exit_code(), TERMINATE_GRACE)
        .await
        .is_none()
    {
        warn!("{name} mount process ignored terminate, killing it");
        if let Err(e) = process.kill() {
            warn!("Failed to kill {name} mount process: {e}");
        }
    }
    still_running(process)
}

fn still_running(mut process: Box<dyn MountProcess>) -> Option<Box<dyn MountProcess>> {
    match process.try_exit_code() {
        Ok(Some(_)) => None,
        _ => Some(process),
    }
}
