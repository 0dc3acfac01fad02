//! Process launching and OS unmount seams.
//!
//! [`ProcessLauncher`] starts the mount executable and hands back a
//! [`MountProcess`] that can be polled without blocking, asked to exit, or
//! killed. [`Unmounter`] wraps the OS-level unmount command. Both are traits
//! so the supervisor can be driven by the mocks in [`super::mock`] in tests.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// A running mount process.
///
/// `terminate` and `kill` must succeed on a process that already exited.
pub trait MountProcess: Send + Sync + std::fmt::Debug {
    /// OS process id, if one exists.
    fn id(&self) -> Option<u32>;

    /// Non-blocking check: `Some(code)` once the process has exited.
    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>>;

    /// Ask the process to exit (SIGTERM on Unix).
    fn terminate(&mut self) -> std::io::Result<()>;

    /// Force the process to exit (SIGKILL on Unix).
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts mount processes.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `executable` with `args`.
    ///
    /// # Errors
    ///
    /// Fails only if the OS refuses to start the process (binary not found,
    /// permission denied). A child that exits right away is not an error here.
    fn launch(&self, executable: &Path, args: &[String]) -> std::io::Result<Box<dyn MountProcess>>;
}

/// Detaches a mountpoint through the operating system.
#[async_trait::async_trait]
pub trait Unmounter: Send + Sync {
    /// Run one clean unmount attempt. `Ok(true)` means the command succeeded.
    async fn unmount(&self, mountpoint: &Path) -> std::io::Result<bool>;
}

/// Translate an exit status to a single integer code.
///
/// Processes killed by a signal report `128 + signal`, as shells do.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// [`ProcessLauncher`] backed by `std::process`.
#[derive(Debug, Default, Clone)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, executable: &Path, args: &[String]) -> std::io::Result<Box<dyn MountProcess>> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group: a Ctrl+C on the controlling terminal must reach
        // the daemon only, which then unmounts in order.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn()?;
        debug!("Launched {} (pid {})", executable.display(), child.id());
        Ok(Box::new(ChildProcess::new(child)))
    }
}

/// [`MountProcess`] wrapping a `std::process::Child`.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    exit_code: Option<i32>,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            exit_code: None,
        }
    }
}

impl MountProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        if self.exit_code.is_none() {
            self.exit_code = self.child.try_wait()?.map(exit_code_of);
        }
        Ok(self.exit_code)
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        if self.try_exit_code()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            // SAFETY: plain signal delivery to a child we spawned and have not
            // reaped yet, so the pid cannot have been reused.
            let rc = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    return Err(err);
                }
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            self.child.kill()
        }
    }

    fn kill(&mut self) -> std::io::Result<()> {
        if self.try_exit_code()?.is_some() {
            return Ok(());
        }
        self.child.kill()?;
        // Reap if it is already gone; otherwise the next poll will.
        let _ = self.try_exit_code();
        Ok(())
    }
}

/// [`Unmounter`] that runs an external command with the mountpoint appended.
///
/// Defaults to `fusermount -u` on Linux and `umount` on other Unix systems.
#[derive(Debug, Clone)]
pub struct UnmountCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl UnmountCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for UnmountCommand {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            Self::new("fusermount", vec!["-u".to_string()])
        } else {
            Self::new("umount", Vec::new())
        }
    }
}

#[async_trait::async_trait]
impl Unmounter for UnmountCommand {
    async fn unmount(&self, mountpoint: &Path) -> std::io::Result<bool> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(mountpoint)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                "{} {} exited with {}: {}",
                self.program.display(),
                mountpoint.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }
}
