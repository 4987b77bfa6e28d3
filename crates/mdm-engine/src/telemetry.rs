//! Structured logging setup, in the spirit of `graph::logging::init_logger`
//! but trimmed to what this engine needs: an `EnvFilter`-driven subscriber
//! writing to stderr. There is no OpenTelemetry exporter here — nothing in
//! this crate's scope has a collector to send spans to — so unlike the
//! teacher's `init_logger` this only wires up the `fmt` layer.
//!
//! Consumers embedding this engine in a larger service are free to skip this
//! module entirely and install their own `tracing` subscriber; nothing else
//! in the crate assumes a particular subscriber is active.

use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    EnvFilter,
};

/// Initializes a global `tracing` subscriber from `RUST_LOG`, defaulting to
/// `debug` in debug builds and `warn` in release builds, matching
/// `graph::logging::init_logger`'s fallback behavior.
///
/// # Errors
///
/// Returns the [`tracing::subscriber::SetGlobalDefaultError`] if a global
/// subscriber has already been installed.
pub fn init_logger() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = std::env::var("RUST_LOG").map_or_else(
        |_| {
            if cfg!(debug_assertions) {
                EnvFilter::default().add_directive(Directive::from(LevelFilter::DEBUG))
            } else {
                EnvFilter::default().add_directive(Directive::from(LevelFilter::WARN))
            }
        },
        EnvFilter::new,
    );

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
