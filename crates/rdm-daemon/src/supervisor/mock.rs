//! Mock launcher, process, and unmounter for testing
//!
//! Lets the supervisor be exercised without rclone or FUSE. All mocks share
//! their state through `Arc<Mutex<..>>`, so a test can keep a clone and
//! script behavior (make a process exit, fail the next unmount) while the
//! supervisor owns the boxed original.

use super::launcher::{MountProcess, ProcessLauncher, Unmounter};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Exit code a mock reports after honoring a terminate request (128 + SIGTERM).
pub const MOCK_TERMINATED_CODE: i32 = 143;

/// Exit code a mock reports after being killed (128 + SIGKILL).
pub const MOCK_KILLED_CODE: i32 = 137;

#[derive(Debug, Default)]
struct MockProcessState {
    exit_code: Option<i32>,
    ignore_terminate: bool,
    terminate_calls: usize,
    kill_calls: usize,
    polls: usize,
}

/// Scriptable [`MountProcess`].
#[derive(Debug, Clone, Default)]
pub struct MockProcess {
    state: Arc<Mutex<MockProcessState>>,
}

impl MockProcess {
    /// A live process that exits when terminated.
    pub fn running() -> Self {
        Self::default()
    }

    /// A process that has already exited with `code`.
    pub fn exited(code: i32) -> Self {
        let process = Self::default();
        process.exit(code);
        process
    }

    /// A live process that only a kill can stop.
    pub fn ignoring_terminate() -> Self {
        let process = Self::default();
        process.state.lock().unwrap().ignore_terminate = true;
        process
    }

    /// Make the process exit with `code`.
    pub fn exit(&self, code: i32) {
        self.state.lock().unwrap().exit_code.get_or_insert(code);
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().unwrap().exit_code.is_none()
    }

    pub fn terminate_count(&self) -> usize {
        self.state.lock().unwrap().terminate_calls
    }

    pub fn kill_count(&self) -> usize {
        self.state.lock().unwrap().kill_calls
    }

    /// Number of exit-code polls observed.
    pub fn poll_count(&self) -> usize {
        self.state.lock().unwrap().polls
    }
}

impl MountProcess for MockProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        Ok(state.exit_code)
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminate_calls += 1;
        if !state.ignore_terminate {
            state.exit_code.get_or_insert(MOCK_TERMINATED_CODE);
        }
        Ok(())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.kill_calls += 1;
        state.exit_code.get_or_insert(MOCK_KILLED_CODE);
        Ok(())
    }
}

/// Record of one launch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLaunch {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct MockLauncherState {
    launches: Vec<(MockLaunch, MockProcess)>,
    scripted: VecDeque<MockProcess>,
    spawn_error: Option<std::io::ErrorKind>,
}

/// Scriptable [`ProcessLauncher`].
///
/// Each launch pops the next scripted process, or starts a fresh
/// [`MockProcess::running`] when none is queued.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    state: Arc<Mutex<MockLauncherState>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the process returned by the next launch.
    pub fn push_process(&self, process: MockProcess) {
        self.state.lock().unwrap().scripted.push_back(process);
    }

    /// Fail every launch with `kind` until cleared.
    pub fn set_spawn_error(&self, kind: Option<std::io::ErrorKind>) {
        self.state.lock().unwrap().spawn_error = kind;
    }

    pub fn launches(&self) -> Vec<MockLaunch> {
        self.state
            .lock()
            .unwrap()
            .launches
            .iter()
            .map(|(launch, _)| launch.clone())
            .collect()
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().launches.len()
    }

    /// Most recent process launched for remote `name`.
    pub fn process_for(&self, name: &str) -> Option<MockProcess> {
        let selector = format!("{name}:/");
        self.state
            .lock()
            .unwrap()
            .launches
            .iter()
            .rev()
            .find(|(launch, _)| launch.args.contains(&selector))
            .map(|(_, process)| process.clone())
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&self, executable: &Path, args: &[String]) -> std::io::Result<Box<dyn MountProcess>> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.spawn_error {
            return Err(std::io::Error::new(kind, "injected spawn failure"));
        }

        let process = state.scripted.pop_front().unwrap_or_default();
        state.launches.push((
            MockLaunch {
                executable: executable.to_path_buf(),
                args: args.to_vec(),
            },
            process.clone(),
        ));
        Ok(Box::new(process))
    }
}

#[derive(Debug)]
struct MockUnmounterState {
    scripted: VecDeque<bool>,
    default_result: bool,
    delay: Option<Duration>,
    calls: Vec<(PathBuf, Instant)>,
}

/// Scriptable [`Unmounter`] that records call times.
#[derive(Debug, Clone)]
pub struct MockUnmounter {
    state: Arc<Mutex<MockUnmounterState>>,
}

impl MockUnmounter {
    /// Unmounter whose attempts succeed unless scripted otherwise.
    pub fn succeeding() -> Self {
        Self::with_default(true)
    }

    /// Unmounter whose attempts fail unless scripted otherwise.
    pub fn failing() -> Self {
        Self::with_default(false)
    }

    fn with_default(default_result: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockUnmounterState {
                scripted: VecDeque::new(),
                default_result,
                delay: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Queue results for the next attempts, in order.
    pub fn script(&self, results: impl IntoIterator<Item = bool>) {
        self.state.lock().unwrap().scripted.extend(results);
    }

    /// Change the result used once the script runs out.
    pub fn set_default(&self, result: bool) {
        self.state.lock().unwrap().default_result = result;
    }

    /// Make every attempt take `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Instants at which attempts started.
    pub fn call_times(&self) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn called_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Unmounter for MockUnmounter {
    async fn unmount(&self, mountpoint: &Path) -> std::io::Result<bool> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((mountpoint.to_path_buf(), Instant::now()));
            let result = state.scripted.pop_front().unwrap_or(state.default_result);
            (result, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(result)
    }
}
