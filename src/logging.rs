//! Structured logging setup for the command-line tool.
//!
//! The library itself only emits `tracing` events; embedding applications
//! install their own subscriber. The `serial485` binary calls [`init`] once
//! after the configuration has been loaded.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the level filter. `RUST_LOG` takes priority over `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, String> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| format!("invalid log level '{level}': {e}"))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, which keeps
/// repeated calls from tests harmless.
pub fn init(config: &LoggingConfig) -> Result<bool, String> {
    let filter = build_filter(&config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().with_target(false).try_init(),
        LogFormat::Pretty => builder.with_target(true).try_init(),
    };
    Ok(installed.is_ok())
}
