pub mod event_loop;
pub mod notifier;
pub mod shutdown;
pub mod sweep;
pub mod watcher;

pub use event_loop::run;
pub use notifier::notify_loop;
pub use shutdown::{ShutdownChoice, ShutdownOutcome, ShutdownPrompt, shutdown_all};
pub use sweep::{LivenessSweep, sweep_loop};
pub use watcher::{reload_configs, watch_config};
