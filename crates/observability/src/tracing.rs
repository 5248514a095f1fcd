//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the host process.
///
/// Filter comes from `RUST_LOG`, falling back to `info`. Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    init_with_filter(filter);
}

/// Initialize tracing with an explicit filter directive, ignoring `RUST_LOG`.
///
/// Hosts embedding the client use this to pin log verbosity.
pub fn init_with(directives: &str) {
    init_with_filter(EnvFilter::new(directives));
}

fn init_with_filter(filter: EnvFilter) {
    // JSON lines with timestamps; target dropped to keep entries compact.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
