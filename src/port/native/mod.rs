//! Operating-system serial port backend.
//!
//! Wraps the `serialport` crate's native port type (`TTYPort` on Unix,
//! `COMPort` on Windows) behind [`SerialBackend`]. The platform variant is
//! fixed at build time; everything that differs between OS families (how a
//! drain is confirmed, whether the driver can switch RTS itself) lives in
//! the cfg-selected submodule.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(all(unix, not(target_os = "linux")))]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
use linux as sys;
#[cfg(all(unix, not(target_os = "linux")))]
use unix as sys;
#[cfg(windows)]
use windows as sys;

use super::enumerate;
use super::error::PortError;
use super::traits::{BufferSelect, ControlPin, Platform, PortConfiguration, SerialBackend};
#[cfg(target_os = "linux")]
use crate::rs485::KernelRs485Settings;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// A serial device opened through the operating system.
pub struct NativePort {
    port: sys::Device,
    name: String,
    character_time: Duration,
    /// Virtual devices have no modem control lines to drive.
    pseudo_terminal: bool,
}

impl NativePort {
    /// Open `port_name` with the given line configuration.
    ///
    /// The timeout in `config` is applied as is; callers normalize it first.
    ///
    /// # Example
    /// ```no_run
    /// use serial485::port::{NativePort, PortConfiguration};
    ///
    /// let port = NativePort::open("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        config.validate()?;

        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.timeout)
            .open_native()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    PortError::not_found(port_name)
                }
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        let pseudo_terminal = enumerate::classify(port_name).is_pseudo_terminal;
        debug!(
            port = port_name,
            baud = config.baud_rate,
            pseudo_terminal,
            "native port opened"
        );

        Ok(Self {
            port,
            name: port_name.to_string(),
            character_time: config.character_time(),
            pseudo_terminal,
        })
    }

    /// True when the device is a pseudo-terminal rather than real hardware.
    pub fn is_pseudo_terminal(&self) -> bool {
        self.pseudo_terminal
    }

    /// Get a reference to the underlying serialport implementation.
    pub fn as_raw(&self) -> &dyn SerialPort {
        &self.port
    }
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

impl SerialBackend for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        Platform::current()
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            // Output buffer full for the whole timeout: nothing accepted.
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn drain(&mut self) -> Result<(), PortError> {
        sys::drain(&mut self.port, self.character_time)
    }

    fn bytes_available(&self) -> Result<u32, PortError> {
        self.port.bytes_to_read().map_err(PortError::Serial)
    }

    fn clear(&mut self, buffers: BufferSelect) -> Result<(), PortError> {
        self.port.clear(buffers.into()).map_err(PortError::Serial)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn set_pin(&mut self, pin: ControlPin, level: bool) -> Result<(), PortError> {
        if self.pseudo_terminal {
            return Err(PortError::unsupported(format!(
                "{} is a pseudo-terminal without a {pin} line",
                self.name
            )));
        }
        let result = match pin {
            ControlPin::Rts => self.port.write_request_to_send(level),
            ControlPin::Dtr => self.port.write_data_terminal_ready(level),
        };
        result.map_err(PortError::Serial)
    }

    #[cfg(target_os = "linux")]
    fn enable_kernel_rs485(&mut self, settings: &KernelRs485Settings) -> Result<bool, PortError> {
        sys::enable_kernel_rs485(&self.port, settings)
    }

    #[cfg(target_os = "linux")]
    fn disable_kernel_rs485(&mut self) -> Result<(), PortError> {
        sys::disable_kernel_rs485(&self.port)
    }
}

impl std::fmt::Debug for NativePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .field("pseudo_terminal", &self.pseudo_terminal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let config = PortConfiguration::default();
        let result = NativePort::open("/dev/nonexistent_port_12345", &config);

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) | Err(PortError::Io(_)) => {}
            other => panic!("Expected open failure, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_zero_baud_rejected_before_open() {
        let config = PortConfiguration {
            baud_rate: 0,
            ..Default::default()
        };
        let result = NativePort::open("/dev/ttyS0", &config);
        assert!(matches!(result, Err(PortError::Config(_))));
    }

    #[test]
    fn test_timeout_kinds() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "t");
        let would_block = std::io::Error::new(std::io::ErrorKind::WouldBlock, "w");
        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "b");
        assert!(is_timeout(&timed_out));
        assert!(is_timeout(&would_block));
        assert!(!is_timeout(&broken));
    }
}
