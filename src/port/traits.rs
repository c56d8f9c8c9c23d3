//! Core types and the backend capability trait.
//!
//! Defines the line configuration the engine understands and the
//! `SerialBackend` trait that every transport (native OS port, in-memory
//! mock, boxed trait object) implements. The direction controller and the
//! handle manager only ever talk to a `SerialBackend`.

use super::error::PortError;
use crate::rs485::KernelRs485Settings;
use crate::timeout::TimeoutGranularity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Line parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second). Must be positive.
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Read timeout as requested by the caller, before normalization.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfiguration {
    /// Reject values no backend can apply.
    pub fn validate(&self) -> Result<(), PortError> {
        if self.baud_rate == 0 {
            return Err(PortError::config("baud rate must be positive"));
        }
        Ok(())
    }

    /// Number of bits one character occupies on the wire, start bit included.
    pub fn bits_per_character(&self) -> u32 {
        let parity = u32::from(self.parity != Parity::None);
        1 + self.data_bits.count() + parity + self.stop_bits.count()
    }

    /// Time one character needs on the wire at the configured baud rate.
    pub fn character_time(&self) -> Duration {
        let baud = u64::from(self.baud_rate.max(1));
        let micros = (u64::from(self.bits_per_character()) * 1_000_000).div_ceil(baud);
        Duration::from_micros(micros)
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub fn count(self) -> u32 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<i32> for DataBits {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(PortError::config(format!(
                "data bits must be 5, 6, 7 or 8, got {other}"
            ))),
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl TryFrom<i32> for FlowControl {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FlowControl::None),
            1 => Ok(FlowControl::Software),
            2 => Ok(FlowControl::Hardware),
            other => Err(PortError::config(format!(
                "flow control must be 0 (none), 1 (software) or 2 (hardware), got {other}"
            ))),
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl TryFrom<i32> for Parity {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            other => Err(PortError::config(format!(
                "parity must be 0 (none), 1 (odd) or 2 (even), got {other}"
            ))),
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    pub fn count(self) -> u32 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl TryFrom<i32> for StopBits {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(PortError::config(format!(
                "stop bits must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Modem control line usable as a transceiver direction pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlPin {
    /// Request To Send.
    Rts,
    /// Data Terminal Ready.
    Dtr,
}

impl TryFrom<i32> for ControlPin {
    type Error = PortError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlPin::Rts),
            1 => Ok(ControlPin::Dtr),
            other => Err(PortError::config(format!(
                "control pin must be 0 (RTS) or 1 (DTR), got {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ControlPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlPin::Rts => f.write_str("RTS"),
            ControlPin::Dtr => f.write_str("DTR"),
        }
    }
}

/// Which OS buffer(s) a clear operation discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSelect {
    Input,
    Output,
    All,
}

impl From<BufferSelect> for serialport::ClearBuffer {
    fn from(select: BufferSelect) -> Self {
        match select {
            BufferSelect::Input => serialport::ClearBuffer::Input,
            BufferSelect::Output => serialport::ClearBuffer::Output,
            BufferSelect::All => serialport::ClearBuffer::All,
        }
    }
}

/// OS family a backend runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux: decisecond read timer, kernel RS-485 ioctls.
    Linux,
    /// macOS and the BSDs.
    Unix,
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub const fn current() -> Self {
        #[cfg(target_os = "linux")]
        {
            Platform::Linux
        }
        #[cfg(windows)]
        {
            Platform::Windows
        }
        #[cfg(not(any(target_os = "linux", windows)))]
        {
            Platform::Unix
        }
    }

    /// Resolution of the platform's blocking-read timer.
    pub const fn timeout_granularity(self) -> TimeoutGranularity {
        match self {
            Platform::Linux => TimeoutGranularity::Decisecond,
            Platform::Unix | Platform::Windows => TimeoutGranularity::Millisecond,
        }
    }

    /// Whether the OS exposes hardware-timed RTS switching.
    pub const fn has_kernel_rs485(self) -> bool {
        matches!(self, Platform::Linux)
    }
}

/// Capability interface every transport implements.
///
/// All calls are blocking and bounded by the backend's effective timeout.
/// Implementations never retry on their own; the engine decides what a
/// failure means.
pub trait SerialBackend: Send + std::fmt::Debug {
    /// Device path or port name.
    fn name(&self) -> &str;

    /// OS family this backend drives.
    fn platform(&self) -> Platform;

    /// Resolution of this backend's read timeout.
    fn timeout_granularity(&self) -> TimeoutGranularity {
        self.platform().timeout_granularity()
    }

    /// Read into `buffer`, blocking up to the effective timeout.
    ///
    /// Returns `Ok(0)` when nothing arrived in time. A serial link has no
    /// end-of-stream, so zero never means "closed".
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Hand `data` to the OS for transmission.
    ///
    /// Returns the number of bytes accepted, which may be less than
    /// `data.len()`. Accepted is not the same as transmitted; see `drain`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Block until every accepted byte has physically left the UART.
    fn drain(&mut self) -> Result<(), PortError>;

    /// Bytes waiting in the receive buffer.
    fn bytes_available(&self) -> Result<u32, PortError>;

    /// Discard buffered data.
    fn clear(&mut self, buffers: BufferSelect) -> Result<(), PortError>;

    /// Apply an already-normalized read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Drive a modem control line.
    fn set_pin(&mut self, pin: ControlPin, level: bool) -> Result<(), PortError>;

    /// Ask the driver for hardware-timed RTS switching.
    ///
    /// `Ok(true)` means the driver confirmed the configuration on read-back,
    /// `Ok(false)` that it accepted the request but did not honour it.
    fn enable_kernel_rs485(&mut self, settings: &KernelRs485Settings) -> Result<bool, PortError> {
        let _ = settings;
        Err(PortError::unsupported(format!(
            "kernel RS-485 is not available on {:?}",
            self.platform()
        )))
    }

    /// Turn hardware-timed RTS switching off again.
    fn disable_kernel_rs485(&mut self) -> Result<(), PortError> {
        Ok(())
    }
}

impl<B: SerialBackend + ?Sized> SerialBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn platform(&self) -> Platform {
        (**self).platform()
    }

    fn timeout_granularity(&self) -> TimeoutGranularity {
        (**self).timeout_granularity()
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        (**self).read_bytes(buffer)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        (**self).write_bytes(data)
    }

    fn drain(&mut self) -> Result<(), PortError> {
        (**self).drain()
    }

    fn bytes_available(&self) -> Result<u32, PortError> {
        (**self).bytes_available()
    }

    fn clear(&mut self, buffers: BufferSelect) -> Result<(), PortError> {
        (**self).clear(buffers)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        (**self).set_timeout(timeout)
    }

    fn set_pin(&mut self, pin: ControlPin, level: bool) -> Result<(), PortError> {
        (**self).set_pin(pin, level)
    }

    fn enable_kernel_rs485(&mut self, settings: &KernelRs485Settings) -> Result<bool, PortError> {
        (**self).enable_kernel_rs485(settings)
    }

    fn disable_kernel_rs485(&mut self) -> Result<(), PortError> {
        (**self).disable_kernel_rs485()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_baud_rejected() {
        let config = PortConfiguration {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PortError::Config(_))));
    }

    #[test]
    fn test_character_time() {
        // 8N1 = 10 bits; at 9600 baud that is 1042 us (rounded up)
        let config = PortConfiguration::default();
        assert_eq!(config.bits_per_character(), 10);
        assert_eq!(config.character_time(), Duration::from_micros(1042));

        let config = PortConfiguration {
            baud_rate: 115200,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            ..Default::default()
        };
        assert_eq!(config.bits_per_character(), 12);
        assert_eq!(config.character_time(), Duration::from_micros(105));
    }

    #[test]
    fn test_raw_encodings() {
        assert_eq!(DataBits::try_from(5).unwrap(), DataBits::Five);
        assert_eq!(DataBits::try_from(8).unwrap(), DataBits::Eight);
        assert!(DataBits::try_from(9).is_err());
        assert!(DataBits::try_from(4).is_err());

        assert_eq!(StopBits::try_from(2).unwrap(), StopBits::Two);
        assert!(StopBits::try_from(0).is_err());

        assert_eq!(Parity::try_from(1).unwrap(), Parity::Odd);
        assert!(Parity::try_from(3).is_err());

        assert_eq!(FlowControl::try_from(2).unwrap(), FlowControl::Hardware);
        assert!(FlowControl::try_from(-1).is_err());

        assert_eq!(ControlPin::try_from(0).unwrap(), ControlPin::Rts);
        assert_eq!(ControlPin::try_from(1).unwrap(), ControlPin::Dtr);
        assert!(ControlPin::try_from(2).is_err());
    }

    #[test]
    fn test_data_bits_conversion() {
        let serialport_bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(serialport_bits, serialport::DataBits::Seven);
    }

    #[test]
    fn test_flow_control_conversion() {
        let serialport_flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(serialport_flow, serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_parity_conversion() {
        let serialport_parity: serialport::Parity = Parity::Even.into();
        assert_eq!(serialport_parity, serialport::Parity::Even);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let serialport_stop_bits: serialport::StopBits = StopBits::Two.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }

    #[test]
    fn test_platform_granularity() {
        assert_eq!(
            Platform::Linux.timeout_granularity(),
            TimeoutGranularity::Decisecond
        );
        assert_eq!(
            Platform::Windows.timeout_granularity(),
            TimeoutGranularity::Millisecond
        );
        assert!(Platform::Linux.has_kernel_rs485());
        assert!(!Platform::Unix.has_kernel_rs485());
    }
}
