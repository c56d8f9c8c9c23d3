//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a serial device without
//! hardware. Besides read/write queues it records a timeline of everything
//! the engine did to the device (pin changes, writes, drains), which is how
//! the direction controller's ordering guarantees are verified.
//!
//! Two mocks can be linked into a null-modem pair with
//! [`MockSerialPort::pair`]: bytes written on one side show up in the other
//! side's read queue.

use super::error::PortError;
use super::traits::{BufferSelect, ControlPin, Platform, SerialBackend};
use crate::rs485::KernelRs485Settings;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something the engine did to the mock device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Pin(ControlPin, bool),
    Write(Vec<u8>),
    Drain,
    Clear(BufferSelect),
    KernelRs485(bool),
}

/// How the mock answers a kernel RS-485 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelRs485Support {
    /// Request accepted and confirmed on read-back.
    Confirmed,
    /// Request accepted but the read-back shows it was not applied.
    Ignored,
    /// Request rejected (`ENOTTY` on a real device).
    Rejected,
}

/// Inner state of the mock port, shared between clones.
#[derive(Debug)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every write call, in order.
    write_log: Vec<Vec<u8>>,
    timeline: Vec<(Instant, MockEvent)>,
    pins: HashMap<ControlPin, bool>,
    /// Effective timeout as applied by the engine.
    timeout: Duration,
    /// Actually sleep for the timeout when a read finds no data.
    real_waits: bool,
    /// Simulated wire time per byte; drain sleeps for pending bytes.
    byte_time: Duration,
    pending_tx_bytes: usize,
    max_write_chunk: Option<usize>,
    fail_next_write: Option<String>,
    fail_pins: Option<String>,
    control_lines: bool,
    kernel_support: KernelRs485Support,
    kernel_settings: Option<KernelRs485Settings>,
}

impl MockPortState {
    fn record(&mut self, event: MockEvent) {
        self.timeline.push((Instant::now(), event));
    }
}

impl Default for MockPortState {
    fn default() -> Self {
        Self {
            read_queue: VecDeque::new(),
            write_log: Vec::new(),
            timeline: Vec::new(),
            pins: HashMap::new(),
            timeout: Duration::from_secs(1),
            real_waits: false,
            byte_time: Duration::ZERO,
            pending_tx_bytes: 0,
            max_write_chunk: None,
            fail_next_write: None,
            fail_pins: None,
            control_lines: true,
            kernel_support: KernelRs485Support::Rejected,
            kernel_settings: None,
        }
    }
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test can hand one clone to the engine and
/// inspect the other.
///
/// # Example
/// ```
/// use serial485::port::{ControlPin, MockSerialPort, SerialBackend};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello");
///
/// let mut buffer = [0u8; 16];
/// assert_eq!(port.read_bytes(&mut buffer).unwrap(), 5);
///
/// // Nothing queued: a timeout, reported as zero bytes
/// assert_eq!(port.read_bytes(&mut buffer).unwrap(), 0);
///
/// port.set_pin(ControlPin::Rts, true).unwrap();
/// assert_eq!(port.pin_level(ControlPin::Rts), Some(true));
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    platform: Platform,
    state: Arc<Mutex<MockPortState>>,
    /// Read queue of the other end of a null-modem pair.
    peer: Option<Arc<Mutex<MockPortState>>>,
}

impl MockSerialPort {
    /// Create a mock with millisecond timeouts and no kernel RS-485.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: Platform::Unix,
            state: Arc::new(Mutex::new(MockPortState::default())),
            peer: None,
        }
    }

    /// Two mocks wired back to back.
    pub fn pair(name_a: impl Into<String>, name_b: impl Into<String>) -> (Self, Self) {
        let mut a = Self::new(name_a);
        let mut b = Self::new(name_b);
        a.peer = Some(Arc::clone(&b.state));
        b.peer = Some(Arc::clone(&a.state));
        (a, b)
    }

    /// Pretend to run on `platform` (affects timeout granularity and
    /// whether kernel RS-485 is attempted).
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_kernel_rs485(self, support: KernelRs485Support) -> Self {
        self.set_kernel_rs485_support(support);
        self
    }

    /// Model a device without modem control lines (a pseudo-terminal).
    pub fn without_control_lines(self) -> Self {
        self.state.lock().control_lines = false;
        self
    }

    /// Accept at most `chunk` bytes per write call.
    pub fn with_max_write_chunk(self, chunk: usize) -> Self {
        self.state.lock().max_write_chunk = Some(chunk.max(1));
        self
    }

    /// Simulate transmission time: `drain` blocks for one byte time per
    /// byte written since the previous drain.
    pub fn with_wire_time(self, byte_time: Duration) -> Self {
        self.state.lock().byte_time = byte_time;
        self
    }

    /// Make empty reads block for the configured timeout.
    pub fn with_real_waits(self) -> Self {
        self.state.lock().real_waits = true;
        self
    }

    pub fn set_kernel_rs485_support(&self, support: KernelRs485Support) {
        self.state.lock().kernel_support = support;
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Fail the next write with an I/O error.
    pub fn fail_next_write(&mut self, message: impl Into<String>) {
        self.state.lock().fail_next_write = Some(message.into());
    }

    /// Fail every subsequent pin change with an I/O error.
    pub fn fail_pins(&mut self, message: impl Into<String>) {
        self.state.lock().fail_pins = Some(message.into());
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state
            .lock()
            .timeline
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Events with the instant they happened.
    pub fn timeline(&self) -> Vec<(Instant, MockEvent)> {
        self.state.lock().timeline.clone()
    }

    /// Forget recorded events and writes.
    pub fn clear_events(&mut self) {
        let mut state = self.state.lock();
        state.timeline.clear();
        state.write_log.clear();
    }

    /// Get a copy of all data written to the port, one entry per call.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    pub fn pin_level(&self, pin: ControlPin) -> Option<bool> {
        self.state.lock().pins.get(&pin).copied()
    }

    /// Effective timeout last applied by the engine.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    pub fn kernel_rs485_enabled(&self) -> bool {
        self.state.lock().kernel_settings.is_some()
    }

    /// Kernel request currently applied, if any.
    pub fn kernel_rs485_settings(&self) -> Option<KernelRs485Settings> {
        self.state.lock().kernel_settings
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialBackend for MockSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let (empty, wait) = {
            let state = self.state.lock();
            (state.read_queue.is_empty(), state.real_waits)
        };
        if empty && wait {
            let timeout = self.state.lock().timeout;
            std::thread::sleep(timeout);
        }

        let mut state = self.state.lock();
        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let accepted = {
            let mut state = self.state.lock();
            if let Some(message) = state.fail_next_write.take() {
                return Err(PortError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    message,
                )));
            }
            let n = state.max_write_chunk.map_or(data.len(), |c| c.min(data.len()));
            let chunk = data[..n].to_vec();
            state.write_log.push(chunk.clone());
            state.pending_tx_bytes += n;
            state.record(MockEvent::Write(chunk));
            n
        };

        // Own lock released first so two paired ports can write concurrently.
        if let Some(peer) = &self.peer {
            peer.lock().read_queue.extend(&data[..accepted]);
        }
        Ok(accepted)
    }

    fn drain(&mut self) -> Result<(), PortError> {
        let wire_time = {
            let mut state = self.state.lock();
            let pending = u32::try_from(std::mem::take(&mut state.pending_tx_bytes))
                .unwrap_or(u32::MAX);
            state.byte_time * pending
        };
        if !wire_time.is_zero() {
            std::thread::sleep(wire_time);
        }
        self.state.lock().record(MockEvent::Drain);
        Ok(())
    }

    fn bytes_available(&self) -> Result<u32, PortError> {
        let n = self.state.lock().read_queue.len();
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    fn clear(&mut self, buffers: BufferSelect) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if matches!(buffers, BufferSelect::Input | BufferSelect::All) {
            state.read_queue.clear();
        }
        if matches!(buffers, BufferSelect::Output | BufferSelect::All) {
            state.pending_tx_bytes = 0;
        }
        state.record(MockEvent::Clear(buffers));
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn set_pin(&mut self, pin: ControlPin, level: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_pins {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                message.clone(),
            )));
        }
        if !state.control_lines {
            return Err(PortError::unsupported(format!(
                "{} has no {pin} line",
                self.name
            )));
        }
        state.pins.insert(pin, level);
        state.record(MockEvent::Pin(pin, level));
        Ok(())
    }

    fn enable_kernel_rs485(&mut self, settings: &KernelRs485Settings) -> Result<bool, PortError> {
        let mut state = self.state.lock();
        match state.kernel_support {
            KernelRs485Support::Rejected => Err(PortError::unsupported(format!(
                "{} does not support TIOCSRS485",
                self.name
            ))),
            KernelRs485Support::Ignored => Ok(false),
            KernelRs485Support::Confirmed => {
                state.kernel_settings = Some(*settings);
                state.record(MockEvent::KernelRs485(true));
                Ok(true)
            }
        }
    }

    fn disable_kernel_rs485(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.kernel_settings.take().is_some() {
            state.record(MockEvent::KernelRs485(false));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_empty_read_is_zero_not_error() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 10];
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_partial_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(port.available_bytes(), 8);
        assert_eq!(port.bytes_available().unwrap(), 8);
    }

    #[test]
    fn test_write_logging() {
        let mut port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"Test1").unwrap();
        port.write_bytes(b"Test2").unwrap();

        let log = port.get_write_log();
        assert_eq!(log, vec![b"Test1".to_vec(), b"Test2".to_vec()]);
        assert_eq!(port.written_bytes(), b"Test1Test2".to_vec());
    }

    #[test]
    fn test_pair_delivers_to_peer() {
        let (mut a, mut b) = MockSerialPort::pair("A", "B");
        a.write_bytes(b"ping").unwrap();

        let mut buffer = [0u8; 8];
        let n = b.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"ping");
        assert_eq!(a.available_bytes(), 0);
    }

    #[test]
    fn test_clear_input() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Should be cleared");
        port.clear(BufferSelect::Input).unwrap();
        assert_eq!(port.available_bytes(), 0);
        assert_eq!(port.events(), vec![MockEvent::Clear(BufferSelect::Input)]);
    }

    #[test]
    fn test_pins_without_control_lines() {
        let mut port = MockSerialPort::new("/dev/pts/1").without_control_lines();
        let err = port.set_pin(ControlPin::Dtr, true).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(port.pin_level(ControlPin::Dtr), None);
    }

    #[test]
    fn test_drain_simulates_wire_time() {
        let mut port = MockSerialPort::new("MOCK0").with_wire_time(Duration::from_millis(2));
        port.write_bytes(b"12345").unwrap();

        let start = Instant::now();
        port.drain().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));

        // nothing pending any more
        let start = Instant::now();
        port.drain().unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_real_waits_block_for_timeout() {
        let mut port = MockSerialPort::new("MOCK0").with_real_waits();
        port.set_timeout(Duration::from_millis(30)).unwrap();

        let start = Instant::now();
        let mut buffer = [0u8; 4];
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_kernel_support_modes() {
        let settings = crate::rs485::Rs485Config::enabled().kernel_settings();

        let mut port = MockSerialPort::new("MOCK0").with_kernel_rs485(KernelRs485Support::Confirmed);
        assert!(port.enable_kernel_rs485(&settings).unwrap());
        assert!(port.kernel_rs485_enabled());
        port.disable_kernel_rs485().unwrap();
        assert!(!port.kernel_rs485_enabled());

        port.set_kernel_rs485_support(KernelRs485Support::Ignored);
        assert!(!port.enable_kernel_rs485(&settings).unwrap());

        port.set_kernel_rs485_support(KernelRs485Support::Rejected);
        assert!(port.enable_kernel_rs485(&settings).unwrap_err().is_unsupported());
    }
}
