//! Fixed timing and invocation constants for the mount supervisor.

use std::time::Duration;

/// Default mount executable, resolved through `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "rclone";

/// Subcommand passed as the first argument to the mount executable.
pub const MOUNT_SUBCOMMAND: &str = "mount";

/// How long a freshly launched process must stay alive to count as mounted.
pub const STARTUP_DEBOUNCE: Duration = Duration::from_millis(100);

/// Poll granularity inside the startup debounce and terminate windows.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Clean unmount attempts before giving up (or forcing).
pub const UNMOUNT_ATTEMPTS: u32 = 3;

/// Delay between clean unmount attempts.
pub const UNMOUNT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Time a terminated process gets to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_millis(300);

/// Interval of the periodic liveness sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the mount event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
