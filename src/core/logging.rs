//! Logging configuration and initialization
//!
//! Sets up the tracing subscriber for structured logging throughout the
//! application.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system with the specified level
///
/// Sets up tracing with a filter based on the provided log level. If the
/// log level is invalid, defaults to "info". `RUST_LOG` takes precedence
/// when set.
pub fn init_logging(log_level: &str) {
    let level = log_level
        .split_whitespace()
        .next()
        .unwrap_or("info")
        .to_lowercase();

    let valid_levels = ["trace", "debug", "info", "warning", "warn", "error"];
    let final_level = if valid_levels.contains(&level.as_str()) {
        match level.as_str() {
            "warning" => "warn",
            other => other,
        }
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(final_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
