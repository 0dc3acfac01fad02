//! Shared logging initialization for drive manager binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(value: Option<&str>) -> tracing::Level {
    match value.unwrap_or("info").to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Initialize process-level tracing output from `RDM_LOG`.
///
/// Output goes to stderr so that stdout stays free for command output.
/// Safe to call multiple times; only the first call installs the subscriber.
pub fn init() {
    let level = parse_level(std::env::var("RDM_LOG").ok().as_deref());
    init_with_level(level);
}

/// Initialize tracing output at an explicit level, ignoring `RDM_LOG`.
pub fn init_with_level(level: tracing::Level) {
    if INIT.get().is_some() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
