//! Structured logging configuration.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is the embedding application's call. These helpers cover the common
//! case for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Initialize a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_default_filter("info");
}

/// Initialize a fmt subscriber honoring `RUST_LOG`, with an explicit
/// fallback directive when the environment does not set one.
pub fn init_with_default_filter(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
