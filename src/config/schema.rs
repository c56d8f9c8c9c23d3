//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::link::OpenConfig;
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use crate::rs485::Rs485Config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line defaults for newly opened ports
    pub serial: SerialConfig,
    /// Default RS-485 direction control
    pub rs485: Rs485Config,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Hardware testing configuration
    pub testing: TestingConfig,
}

impl Config {
    /// Reject values no port could be opened with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.default_baud == 0 {
            return Err(ConfigError::validation(
                "serial.default_baud",
                "baud rate must be positive",
            ));
        }
        if self.testing.baud == 0 {
            return Err(ConfigError::validation(
                "testing.baud",
                "baud rate must be positive",
            ));
        }
        if let Some((alias, _)) = self
            .serial
            .port_aliases
            .iter()
            .find(|(_, target)| target.trim().is_empty())
        {
            return Err(ConfigError::validation(
                format!("serial.port_aliases.{alias}"),
                "alias points to an empty port name",
            ));
        }
        Ok(())
    }

    /// Open request for `port` (alias or device name) using the configured
    /// line and RS-485 defaults.
    pub fn open_config(&self, port: &str) -> OpenConfig {
        OpenConfig {
            port_name: self.serial.resolve_port(port),
            line: self.serial.line_configuration(),
            dtr_on_open: self.serial.dtr_on_open,
            rs485: self.rs485.clone(),
        }
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Default baud rate for new connections
    pub default_baud: u32,
    /// Default read timeout in milliseconds, before platform rounding
    pub default_timeout_ms: u64,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Assert DTR after opening
    pub dtr_on_open: bool,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 9600,
            default_timeout_ms: 1000,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            dtr_on_open: true,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Get the default timeout as Duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn line_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.default_baud,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: self.default_timeout(),
        }
    }
}

/// Hardware testing configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Device under test
    pub port: Option<String>,
    /// Second device wired to `port` (RS-485 bus or null modem)
    pub peer_port: Option<String>,
    /// Test baud rate
    pub baud: u32,
    /// Test timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            peer_port: None,
            baud: 9600,
            timeout_ms: 2000,
        }
    }
}

impl TestingConfig {
    /// Get the test timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error". `RUST_LOG` wins.
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ControlPin;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.default_baud, 9600);
        assert!(config.serial.dtr_on_open);
        assert!(!config.rs485.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("bus".to_string(), "/dev/ttyUSB0".to_string());

        assert_eq!(config.resolve_port("bus"), "/dev/ttyUSB0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[rs485]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            default_baud = 19200
            parity = "even"
            dtr_on_open = false

            [rs485]
            enabled = true
            pin = "dtr"
            delay_after_send_us = 500
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.default_baud, 19200);
        assert_eq!(config.serial.parity, Parity::Even);
        assert!(config.rs485.enabled);
        assert_eq!(config.rs485.pin, ControlPin::Dtr);
        // Defaults should still work
        assert_eq!(config.serial.stop_bits, StopBits::One);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_data_bits_rejected_by_parser() {
        let result: Result<Config, _> = toml::from_str("[serial]\ndata_bits = \"nine\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_baud() {
        let mut config = Config::default();
        config.serial.default_baud = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_open_config_uses_defaults_and_aliases() {
        let mut config = Config::default();
        config.serial.default_timeout_ms = 250;
        config.serial.dtr_on_open = false;
        config
            .serial
            .port_aliases
            .insert("meter".to_string(), "/dev/ttyS3".to_string());
        config.rs485 = Rs485Config::enabled();

        let open = config.open_config("meter");
        assert_eq!(open.port_name, "/dev/ttyS3");
        assert_eq!(open.line.timeout, Duration::from_millis(250));
        assert!(!open.dtr_on_open);
        assert!(open.rs485.enabled);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
