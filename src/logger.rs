//! Centralized logging configuration for the apex-quadric binary and benchmarks
//!
//! Library code only emits `tracing` events; installing a subscriber is left to the
//! executable. This module provides the standard setup with a default INFO level.

use tracing::Level;

/// Initialize the tracing subscriber with apex-quadric's standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// # Example
/// ```no_run
/// use apex_quadric::init_logger;
///
/// init_logger();
/// tracing::info!("Projection started");
/// ```
///
/// # Environment Variables
/// ```bash
/// RUST_LOG=debug cargo run --bin project_quadric
/// RUST_LOG=apex_quadric::factors=trace cargo run --bin project_quadric
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// Calling this more than once is harmless: later calls leave the first subscriber in place.
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
