//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use crate::port::ControlPin;
use crate::rs485::Rs485Strategy;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL485";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial485.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL485_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL485_CONFIG` environment variable (explicit path)
    /// 2. `./serial485.toml` (current directory)
    /// 3. the platform config directory (`~/.config/serial485/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if apply_env_overrides(&mut config).is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial485").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::io("create", parent, e))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::io("write", path, e))
}

fn var(key: &str) -> Option<(String, String)> {
    let name = format!("{ENV_PREFIX}_{key}");
    std::env::var(&name).ok().map(|value| (name, value))
}

fn parse<T: FromStr>(name: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, format!("Invalid {what}: '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(
            name,
            format!("Invalid boolean: '{value}'"),
        )),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL485_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL485_SERIAL_DEFAULT_BAUD=19200`
/// - `SERIAL485_RS485_PIN=dtr`
/// - `SERIAL485_LOGGING_LEVEL=debug`
///
/// The hardware test variables `TEST_PORT`, `TEST_PEER_PORT` and
/// `TEST_BAUD` are honoured as well.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((name, val)) = var("SERIAL_DEFAULT_BAUD") {
        config.serial.default_baud = parse(&name, &val, "baud rate")?;
    }
    if let Some((name, val)) = var("SERIAL_DEFAULT_TIMEOUT_MS") {
        config.serial.default_timeout_ms = parse(&name, &val, "timeout")?;
    }
    if let Some((name, val)) = var("SERIAL_DTR_ON_OPEN") {
        config.serial.dtr_on_open = parse_bool(&name, &val)?;
    }

    // RS-485 overrides
    if let Some((name, val)) = var("RS485_ENABLED") {
        config.rs485.enabled = parse_bool(&name, &val)?;
    }
    if let Some((name, val)) = var("RS485_STRATEGY") {
        config.rs485.strategy = match val.trim().to_ascii_lowercase().as_str() {
            "auto" => Rs485Strategy::Auto,
            "manual" => Rs485Strategy::Manual,
            _ => return Err(ConfigError::env_parse(name, "Expected 'auto' or 'manual'")),
        };
    }
    if let Some((name, val)) = var("RS485_PIN") {
        config.rs485.pin = match val.trim().to_ascii_lowercase().as_str() {
            "rts" => ControlPin::Rts,
            "dtr" => ControlPin::Dtr,
            _ => return Err(ConfigError::env_parse(name, "Expected 'rts' or 'dtr'")),
        };
    }
    if let Some((name, val)) = var("RS485_RTS_ACTIVE_HIGH") {
        config.rs485.rts_active_high = parse_bool(&name, &val)?;
    }
    if let Some((name, val)) = var("RS485_DELAY_BEFORE_US") {
        config.rs485.delay_before_send_us = parse(&name, &val, "delay")?;
    }
    if let Some((name, val)) = var("RS485_DELAY_AFTER_US") {
        config.rs485.delay_after_send_us = parse(&name, &val, "delay")?;
    }

    // Logging overrides
    if let Some((_, val)) = var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((name, val)) = var("LOGGING_FORMAT") {
        config.logging.format = val
            .parse::<LogFormat>()
            .map_err(|message| ConfigError::env_parse(name, message))?;
    }

    // Testing overrides (also support plain TEST_PORT etc.)
    if let Some((_, val)) = var("TESTING_PORT").or_else(|| plain("TEST_PORT")) {
        config.testing.port = Some(val);
    }
    if let Some((_, val)) = var("TESTING_PEER_PORT").or_else(|| plain("TEST_PEER_PORT")) {
        config.testing.peer_port = Some(val);
    }
    if let Some((name, val)) = var("TESTING_BAUD").or_else(|| plain("TEST_BAUD")) {
        config.testing.baud = parse(&name, &val, "baud rate")?;
    }

    Ok(())
}

fn plain(name: &str) -> Option<(String, String)> {
    std::env::var(name).ok().map(|value| (name.to_string(), value))
}
