//! Configuration module for serial485.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL485_CONFIG` environment variable (explicit path)
//! 2. `./serial485.toml` (current directory)
//! 3. `serial485.toml` in the platform config directory
//!    (`~/.config/serial485/` on Linux, `%APPDATA%\serial485\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL485_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL485_SERIAL_DEFAULT_BAUD=19200`
//! - `SERIAL485_RS485_ENABLED=true`
//! - `SERIAL485_LOGGING_FORMAT=json`
//!
//! Hardware tests also read `TEST_PORT`, `TEST_PEER_PORT` and `TEST_BAUD`.
//!
//! # Example
//!
//! ```toml
//! [serial]
//! default_baud = 19200
//! dtr_on_open = false
//!
//! [serial.port_aliases]
//! meter = "/dev/ttyUSB0"
//!
//! [rs485]
//! enabled = true
//! pin = "rts"
//! delay_after_send_us = 500
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TestingConfig};
