//! Live-mount table bookkeeping.
//!
//! The table maps configuration names to [`MountHandle`]s and also tracks
//! names with an operation in flight (`Starting` / `Unmounting`). It is only
//! ever touched under one mutex, and that lock is never held across an
//! `.await`. Every removal of a handle (explicit unmount or liveness sweep)
//! happens under the lock, which is what makes teardown at-most-once.

use super::error::SupervisorError;
use super::launcher::MountProcess;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A launched mount owned by the supervisor.
#[derive(Debug)]
pub struct MountHandle {
    pub name: String,
    /// Mountpoint after `~` / environment expansion
    pub mountpoint: PathBuf,
    pub process: Box<dyn MountProcess>,
    pub mounted_at: DateTime<Utc>,
}

/// Supervisor view of a single name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountState {
    Unmounted,
    Starting,
    Mounted,
    Unmounting,
}

impl std::fmt::Display for MountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmounted => write!(f, "unmounted"),
            Self::Starting => write!(f, "starting"),
            Self::Mounted => write!(f, "mounted"),
            Self::Unmounting => write!(f, "unmounting"),
        }
    }
}

/// Read-only summary of a table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub name: String,
    pub mountpoint: PathBuf,
    pub pid: Option<u32>,
    pub mounted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct MountTable {
    mounted: HashMap<String, MountHandle>,
    in_flight: HashMap<String, MountState>,
    /// Processes launched for a `Starting` name, not yet committed
    launching: HashMap<String, Box<dyn MountProcess>>,
    /// Processes whose mount is gone but which had not exited yet
    orphans: Vec<Box<dyn MountProcess>>,
}

pub(crate) type SharedTable = Arc<Mutex<MountTable>>;

/// Lock the table, recovering from a poisoned mutex.
///
/// The table holds no invariants that a panicking holder could leave half
/// applied: every mutation is a single map insert or remove.
pub(crate) fn lock(table: &SharedTable) -> MutexGuard<'_, MountTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MountTable {
    pub(crate) fn state(&self, name: &str) -> MountState {
        if let Some(state) = self.in_flight.get(name) {
            *state
        } else if self.mounted.contains_key(name) {
            MountState::Mounted
        } else {
            MountState::Unmounted
        }
    }

    pub(crate) fn is_mounted(&self, name: &str) -> bool {
        self.mounted.contains_key(name)
    }

    pub(crate) fn insert(&mut self, handle: MountHandle) {
        self.in_flight.remove(&handle.name);
        self.mounted.insert(handle.name.clone(), handle);
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mounted.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn infos(&self) -> Vec<MountInfo> {
        let mut infos: Vec<MountInfo> = self
            .mounted
            .values()
            .map(|handle| MountInfo {
                name: handle.name.clone(),
                mountpoint: handle.mountpoint.clone(),
                pid: handle.process.id(),
                mounted_at: handle.mounted_at,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Poll every tracked process and remove the ones that exited.
    pub(crate) fn reap_exited(&mut self) -> Vec<(MountHandle, i32)> {
        let mut exited = Vec::new();
        for (name, handle) in self.mounted.iter_mut() {
            match handle.process.try_exit_code() {
                Ok(Some(code)) => exited.push((name.clone(), code)),
                Ok(None) => {}
                Err(e) => warn!("Failed to poll mount process for {name}: {e}"),
            }
        }

        exited
            .into_iter()
            .filter_map(|(name, code)| self.mounted.remove(&name).map(|handle| (handle, code)))
            .collect()
    }

    /// Keep polling a detached process until it exits.
    pub(crate) fn adopt(&mut self, process: Box<dyn MountProcess>) {
        self.orphans.push(process);
    }

    /// Drop orphans that have exited. Returns how many are still alive.
    pub(crate) fn reap_orphans(&mut self) -> usize {
        self.orphans
            .retain_mut(|process| !matches!(process.try_exit_code(), Ok(Some(_))));
        self.orphans.len()
    }
}

/// Exclusive claim on a name while a mount or unmount is in flight.
///
/// Dropping the reservation releases the name; [`Reservation::commit`]
/// instead moves a handle into the table.
pub(crate) struct Reservation {
    table: SharedTable,
    name: String,
    armed: bool,
}

impl Reservation {
    /// Claim `name` for a new mount.
    pub(crate) fn for_mount(table: &SharedTable, name: &str) -> Result<Self, SupervisorError> {
        let mut guard = lock(table);
        if guard.state(name) != MountState::Unmounted {
            return Err(SupervisorError::AlreadyActive {
                name: name.to_string(),
            });
        }
        guard.in_flight.insert(name.to_string(), MountState::Starting);
        debug!("{name}: starting");
        Ok(Self::new(table, name))
    }

    /// Remove `name` from the table and claim it for teardown.
    pub(crate) fn for_unmount(
        table: &SharedTable,
        name: &str,
    ) -> Result<(Self, MountHandle), SupervisorError> {
        let mut guard = lock(table);
        let handle = guard
            .mounted
            .remove(name)
            .ok_or_else(|| SupervisorError::NotMounted {
                name: name.to_string(),
            })?;
        guard.in_flight.insert(name.to_string(), MountState::Unmounting);
        debug!("{name}: unmounting");
        Ok((Self::new(table, name), handle))
    }

    fn new(table: &SharedTable, name: &str) -> Self {
        Self {
            table: Arc::clone(table),
            name: name.to_string(),
            armed: true,
        }
    }

    /// Hand a freshly launched process to the table.
    ///
    /// If the reservation is dropped before [`Reservation::commit_launch`],
    /// the process is terminated and left to the sweep.
    pub(crate) fn attach(&self, process: Box<dyn MountProcess>) {
        lock(&self.table)
            .launching
            .insert(self.name.clone(), process);
    }

    /// Poll the attached process.
    pub(crate) fn try_exit_code(&self) -> std::io::Result<Option<i32>> {
        match lock(&self.table).launching.get_mut(&self.name) {
            Some(process) => process.try_exit_code(),
            None => Ok(None),
        }
    }

    /// Forget the attached process after it exited on its own.
    pub(crate) fn discard_launch(&self) {
        lock(&self.table).launching.remove(&self.name);
    }

    /// Turn the attached process into a live mount at `mountpoint`.
    ///
    /// Returns `false` when nothing was attached; the reservation is then
    /// released as if dropped.
    pub(crate) fn commit_launch(mut self, mountpoint: PathBuf, on_commit: impl FnOnce()) -> bool {
        let mut guard = lock(&self.table);
        let Some(process) = guard.launching.remove(&self.name) else {
            return false;
        };
        guard.insert(MountHandle {
            name: self.name.clone(),
            mountpoint,
            process,
            mounted_at: Utc::now(),
        });
        on_commit();
        self.armed = false;
        true
    }

    /// Put `handle` into the table and end the reservation.
    ///
    /// `on_commit` runs while the table is still locked, so anything it
    /// publishes is ordered before a sweep can observe the new entry.
    pub(crate) fn commit(mut self, handle: MountHandle, on_commit: impl FnOnce()) {
        debug_assert_eq!(handle.name, self.name);
        let mut guard = lock(&self.table);
        guard.insert(handle);
        on_commit();
        self.armed = false;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut guard = lock(&self.table);
        guard.in_flight.remove(&self.name);
        if let Some(mut process) = guard.launching.remove(&self.name) {
            warn!("Launch of {} was abandoned, terminating its mount process", self.name);
            if let Err(e) = process.terminate() {
                warn!("Failed to terminate abandoned {} mount process: {e}", self.name);
            }
            guard.adopt(process);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::mock::MockProcess;

    fn handle(name: &str, process: MockProcess) -> MountHandle {
        MountHandle {
            name: name.to_string(),
            mountpoint: PathBuf::from(format!("/mnt/{name}")),
            process: Box::new(process),
            mounted_at: Utc::now(),
        }
    }

    #[test]
    fn test_mount_reservation_blocks_second_claim() {
        let table = SharedTable::default();
        let first = Reservation::for_mount(&table, "a").unwrap();
        assert_eq!(lock(&table).state("a"), MountState::Starting);

        assert!(matches!(
            Reservation::for_mount(&table, "a"),
            Err(SupervisorError::AlreadyActive { .. })
        ));

        drop(first);
        assert_eq!(lock(&table).state("a"), MountState::Unmounted);
        assert!(Reservation::for_mount(&table, "a").is_ok());
    }

    #[test]
    fn test_commit_moves_handle_into_table() {
        let table = SharedTable::default();
        let reservation = Reservation::for_mount(&table, "a").unwrap();
        let mut committed = false;
        reservation.commit(handle("a", MockProcess::running()), || committed = true);
        assert!(committed);

        let guard = lock(&table);
        assert_eq!(guard.state("a"), MountState::Mounted);
        assert!(guard.is_mounted("a"));
        assert_eq!(guard.names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_commit_launch_promotes_attached_process() {
        let table = SharedTable::default();
        let process = MockProcess::running();
        let reservation = Reservation::for_mount(&table, "a").unwrap();
        reservation.attach(Box::new(process.clone()));
        assert_eq!(reservation.try_exit_code().unwrap(), None);

        assert!(reservation.commit_launch(PathBuf::from("/mnt/a"), || {}));
        let guard = lock(&table);
        assert!(guard.is_mounted("a"));
        assert!(guard.launching.is_empty());
        assert_eq!(process.terminate_count(), 0);
    }

    #[test]
    fn test_dropped_launch_is_terminated_and_adopted() {
        let table = SharedTable::default();
        let process = MockProcess::ignoring_terminate();
        let reservation = Reservation::for_mount(&table, "a").unwrap();
        reservation.attach(Box::new(process.clone()));

        drop(reservation);

        assert_eq!(process.terminate_count(), 1);
        assert_eq!(lock(&table).state("a"), MountState::Unmounted);
        assert_eq!(lock(&table).reap_orphans(), 1);
        process.exit(0);
        assert_eq!(lock(&table).reap_orphans(), 0);
    }

    #[test]
    fn test_commit_launch_without_process_releases_name() {
        let table = SharedTable::default();
        let reservation = Reservation::for_mount(&table, "a").unwrap();
        let mut committed = false;
        assert!(!reservation.commit_launch(PathBuf::from("/mnt/a"), || committed = true));
        assert!(!committed);
        assert_eq!(lock(&table).state("a"), MountState::Unmounted);
    }

    #[test]
    fn test_unmount_reservation_removes_entry() {
        let table = SharedTable::default();
        lock(&table).insert(handle("a", MockProcess::running()));

        let (reservation, handle) = Reservation::for_unmount(&table, "a").unwrap();
        assert_eq!(handle.name, "a");
        assert_eq!(lock(&table).state("a"), MountState::Unmounting);
        assert!(!lock(&table).is_mounted("a"));

        assert!(matches!(
            Reservation::for_unmount(&table, "a"),
            Err(SupervisorError::NotMounted { .. })
        ));

        drop(reservation);
        assert_eq!(lock(&table).state("a"), MountState::Unmounted);
    }

    #[test]
    fn test_reap_exited_only_removes_dead_processes() {
        let table = SharedTable::default();
        let dead = MockProcess::running();
        lock(&table).insert(handle("alive", MockProcess::running()));
        lock(&table).insert(handle("dead", dead.clone()));

        dead.exit(2);
        let reaped = lock(&table).reap_exited();

        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].0.name, "dead");
        assert_eq!(reaped[0].1, 2);
        assert_eq!(lock(&table).names(), vec!["alive".to_string()]);
        assert!(lock(&table).reap_exited().is_empty());
    }

    #[test]
    fn test_orphans_are_dropped_once_exited() {
        let table = SharedTable::default();
        let orphan = MockProcess::running();
        lock(&table).adopt(Box::new(orphan.clone()));

        assert_eq!(lock(&table).reap_orphans(), 1);
        orphan.exit(0);
        assert_eq!(lock(&table).reap_orphans(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(MountState::Unmounting.to_string(), "unmounting");
        assert_eq!(MountState::Mounted.to_string(), "mounted");
    }
}
