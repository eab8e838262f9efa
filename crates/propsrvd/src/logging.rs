//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Crates whose level follows the configured verbosity.
const CRATES: [&str; 4] = ["propsrv", "propsrvd", "propsrv_core", "propsrv_protocol"];

/// Builds the filter directives for `level`, e.g. `propsrvd=info,...`.
pub fn directives(level: LogLevel) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={}", level.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the filter from `RUST_LOG` if set, otherwise one derived from `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

/// Installs the global fmt subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .try_init()
}
