//! Port-specific error types.
//!
//! Backend failures are kept separate from engine-level errors: a backend
//! only knows *what* went wrong at the OS boundary, the engine adds *which
//! operation* the caller asked for.

use thiserror::Error;

/// Errors that can occur inside a transport backend.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device or platform cannot perform the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// True when the failure means "this device can't do that" rather than
    /// "the device broke".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::unsupported("no control lines on /dev/pts/3");
        assert_eq!(
            err.to_string(),
            "Unsupported operation: no control lines on /dev/pts/3"
        );
    }

    #[test]
    fn test_is_unsupported() {
        assert!(PortError::unsupported("x").is_unsupported());
        assert!(!PortError::config("x").is_unsupported());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!PortError::from(io).is_unsupported());
    }
}
