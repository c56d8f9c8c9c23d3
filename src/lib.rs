//! serial485 Library
//!
//! Cross-platform serial port control with RS-485 half-duplex direction
//! control. A port opened with RS-485 enabled switches its transceiver to
//! transmit for every write and back to receive once the last bit has left
//! the wire, either through the Linux kernel driver or by toggling RTS/DTR
//! from user space.
//!
//! # Modules
//!
//! - `port`: Transport abstraction, native ports, mock ports and discovery
//! - `rs485`: Direction-control configuration and strategies
//! - `link`: An open port with its direction controller
//! - `manager`: Integer-handle ownership of open ports
//! - `api`: Flat sentinel-based surface for binding layers
//! - `error`: Unified error handling
//! - `config`: Configuration management with TOML support
//! - `logging`: Subscriber setup for the command-line tool
//!
//! # Example
//!
//! ```no_run
//! use serial485::{OpenConfig, Rs485Config, SerialLink};
//!
//! let config = OpenConfig::new("/dev/ttyUSB0").with_rs485(Rs485Config::enabled());
//! let mut link = SerialLink::open(config)?;
//! link.write(b"\x01\x03\x00\x00\x00\x01")?;
//! # Ok::<(), serial485::EngineError>(())
//! ```

pub mod api;
pub mod config;
pub mod error;
mod last_error;
pub mod link;
pub mod logging;
pub mod manager;
pub mod port;
pub mod rs485;
pub mod timeout;

// Re-export commonly used types for convenience
pub use error::{EngineError, EngineResult, ErrorKind, Operation};
pub use link::{OpenConfig, SerialLink};
pub use manager::{HandleManager, PortHandle};
pub use port::{
    list_ports, ControlPin, DataBits, FlowControl, MockSerialPort, NativePort, Parity, Platform,
    PortConfiguration, PortError, PortRecord, SerialBackend, StopBits,
};
pub use rs485::{DirectionMode, Rs485Config, Rs485Strategy};
pub use timeout::{normalize_timeout, normalize_timeout_ms, TimeoutGranularity};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
