//! Transport layer for serial communication.
//!
//! Provides the `SerialBackend` capability trait with a native OS
//! implementation and an in-memory mock, plus device enumeration.

pub mod enumerate;
pub mod error;
pub mod mock;
pub mod native;
pub mod traits;

pub use enumerate::{classify, format_records, list_ports, parse_records, PortRecord};
pub use error::PortError;
pub use mock::{KernelRs485Support, MockEvent, MockSerialPort};
pub use native::NativePort;
pub use traits::*;
