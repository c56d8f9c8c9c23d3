//! An open serial port with its RS-485 direction control.
//!
//! `SerialLink` owns its backend outright. Opening validates the
//! configuration, applies the normalized timeout, handles DTR-on-open and
//! resolves a direction-control strategy; dropping the link undoes the
//! strategy and closes the device. There is no half-open state: either
//! `open` returns a fully configured link or nothing was kept.

use crate::error::{EngineError, EngineResult, Operation};
use crate::port::{
    BufferSelect, ControlPin, NativePort, Platform, PortConfiguration, SerialBackend,
};
use crate::rs485::{DirectionControl, DirectionMode, Rs485Config};
use crate::timeout::normalize_timeout;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything needed to open a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenConfig {
    pub port_name: String,
    pub line: PortConfiguration,
    /// Leave DTR asserted after open. Clear it to avoid resetting boards
    /// that wire DTR to their reset line.
    pub dtr_on_open: bool,
    pub rs485: Rs485Config,
}

impl OpenConfig {
    /// 9600 8N1, one second timeout, DTR asserted, RS-485 off.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            line: PortConfiguration::default(),
            dtr_on_open: true,
            rs485: Rs485Config::disabled(),
        }
    }

    pub fn with_line(mut self, line: PortConfiguration) -> Self {
        self.line = line;
        self
    }

    pub fn with_rs485(mut self, rs485: Rs485Config) -> Self {
        self.rs485 = rs485;
        self
    }

    pub fn with_dtr_on_open(mut self, dtr_on_open: bool) -> Self {
        self.dtr_on_open = dtr_on_open;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.line.timeout = timeout;
        self
    }

    /// Reject the configuration before anything touches the OS.
    pub fn validate(&self) -> EngineResult<()> {
        if self.port_name.trim().is_empty() {
            return Err(EngineError::configuration(
                Operation::Open,
                "port name must not be empty",
            ));
        }
        self.line
            .validate()
            .map_err(|e| EngineError::from_port(Operation::Open, e))
    }
}

/// Open the OS device for `config` with its timeout already normalized.
pub(crate) fn open_native(config: &OpenConfig) -> EngineResult<NativePort> {
    config.validate()?;
    let line = PortConfiguration {
        timeout: normalize_timeout(config.line.timeout, Platform::current().timeout_granularity()),
        ..config.line.clone()
    };
    NativePort::open(&config.port_name, &line)
        .map_err(|e| EngineError::open_failure(&config.port_name, e))
}

/// An open port. Released when dropped.
///
/// # Example
/// ```no_run
/// use serial485::{OpenConfig, Rs485Config, SerialLink};
///
/// let config = OpenConfig::new("/dev/ttyUSB0").with_rs485(Rs485Config::enabled());
/// let mut link = SerialLink::open(config)?;
/// link.write(b"\x01\x03\x00\x00\x00\x02\xc4\x0b")?;
///
/// let mut reply = [0u8; 64];
/// let n = link.read(&mut reply)?; // 0 means nothing arrived in time
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SerialLink<B: SerialBackend = NativePort> {
    backend: B,
    config: OpenConfig,
    effective_timeout: Duration,
    direction: DirectionControl,
}

impl SerialLink<NativePort> {
    /// Open an OS serial device.
    pub fn open(config: OpenConfig) -> EngineResult<Self> {
        let backend = open_native(&config)?;
        Self::with_backend(backend, config)
    }
}

impl<B: SerialBackend> SerialLink<B> {
    /// Finish opening on an already-open transport.
    ///
    /// The backend is dropped (and so closed) if any step fails.
    pub fn with_backend(mut backend: B, config: OpenConfig) -> EngineResult<Self> {
        config.validate()?;
        let open_failure = |e| EngineError::open_failure(config.port_name.clone(), e);

        let effective_timeout =
            normalize_timeout(config.line.timeout, backend.timeout_granularity());
        backend.set_timeout(effective_timeout).map_err(open_failure)?;

        // A DTR direction pin is put at its receive level by the controller.
        let dtr_owned = config.rs485.enabled && config.rs485.pin == ControlPin::Dtr;
        if !dtr_owned {
            match backend.set_pin(ControlPin::Dtr, config.dtr_on_open) {
                Ok(()) => {
                    debug!(port = %config.port_name, level = config.dtr_on_open, "DTR set on open")
                }
                Err(e) if e.is_unsupported() => {
                    debug!(port = %config.port_name, "DTR not controllable: {e}")
                }
                Err(e) => return Err(open_failure(e)),
            }
        }

        let direction = DirectionControl::resolve(&mut backend, &config.rs485).map_err(open_failure)?;

        info!(
            port = %config.port_name,
            baud = config.line.baud_rate,
            timeout_ms = effective_timeout.as_millis() as u64,
            rs485 = %direction.mode(),
            "port opened"
        );

        Ok(Self {
            backend,
            config,
            effective_timeout,
            direction,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.port_name
    }

    pub fn config(&self) -> &OpenConfig {
        &self.config
    }

    pub fn rs485_config(&self) -> &Rs485Config {
        &self.config.rs485
    }

    /// Timeout the backend actually waits for, after quantization.
    pub fn effective_timeout(&self) -> Duration {
        self.effective_timeout
    }

    pub fn direction_mode(&self) -> DirectionMode {
        self.direction.mode()
    }

    /// Whether the driver is switching RTS. Check this rather than assuming
    /// a kernel request succeeded.
    pub fn is_kernel_rs485_active(&self) -> bool {
        self.direction.is_kernel()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Transmit `data` under the active direction strategy.
    ///
    /// With RS-485 enabled the call returns once the frame is on the wire
    /// and the transceiver is back in receive mode.
    pub fn write(&mut self, data: &[u8]) -> EngineResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.direction
            .write(&mut self.backend, data)
            .map_err(|e| EngineError::from_port(Operation::Write, e))
    }

    /// Read what arrived within the effective timeout; `Ok(0)` means nothing.
    pub fn read(&mut self, buffer: &mut [u8]) -> EngineResult<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }
        self.backend
            .read_bytes(buffer)
            .map_err(|e| EngineError::from_port(Operation::Read, e))
    }

    pub fn available(&self) -> EngineResult<u32> {
        self.backend
            .bytes_available()
            .map_err(|e| EngineError::from_port(Operation::Available, e))
    }

    /// Block until everything written has been transmitted.
    pub fn flush(&mut self) -> EngineResult<()> {
        self.backend
            .drain()
            .map_err(|e| EngineError::from_port(Operation::Flush, e))
    }

    pub fn clear_input(&mut self) -> EngineResult<()> {
        self.clear(BufferSelect::Input, Operation::ClearInput)
    }

    pub fn clear_output(&mut self) -> EngineResult<()> {
        self.clear(BufferSelect::Output, Operation::ClearOutput)
    }

    pub fn clear_all(&mut self) -> EngineResult<()> {
        self.clear(BufferSelect::All, Operation::ClearAll)
    }

    fn clear(&mut self, buffers: BufferSelect, operation: Operation) -> EngineResult<()> {
        self.backend
            .clear(buffers)
            .map_err(|e| EngineError::from_port(operation, e))
    }

    /// Change the read timeout; the backend waits the quantized value.
    pub fn set_timeout(&mut self, timeout_ms: u64) -> EngineResult<()> {
        let requested = Duration::from_millis(timeout_ms);
        let effective = normalize_timeout(requested, self.backend.timeout_granularity());
        self.backend
            .set_timeout(effective)
            .map_err(|e| EngineError::from_port(Operation::SetTimeout, e))?;
        if effective != requested {
            debug!(
                port = %self.config.port_name,
                requested_ms = timeout_ms,
                effective_ms = effective.as_millis() as u64,
                "timeout rounded up to timer granularity"
            );
        }
        self.config.line.timeout = requested;
        self.effective_timeout = effective;
        Ok(())
    }

    /// Drive RTS directly, outside any automatic direction control.
    pub fn set_rts(&mut self, level: bool) -> EngineResult<()> {
        self.backend
            .set_pin(ControlPin::Rts, level)
            .map_err(|e| EngineError::from_port(Operation::SetRts, e))
    }

    /// Drive DTR directly, outside any automatic direction control.
    pub fn set_dtr(&mut self, level: bool) -> EngineResult<()> {
        self.backend
            .set_pin(ControlPin::Dtr, level)
            .map_err(|e| EngineError::from_port(Operation::SetDtr, e))
    }

    /// Replace the RS-485 configuration and resolve the strategy again.
    ///
    /// Pending output is drained first so a pin change never cuts a frame
    /// short. If the new strategy cannot be activated the previous
    /// configuration is restored.
    pub fn set_rs485_config(&mut self, rs485: Rs485Config) -> EngineResult<()> {
        let op = Operation::SetRs485Config;
        self.backend
            .drain()
            .map_err(|e| EngineError::from_port(op, e))?;
        if let Err(e) = self.direction.release(&mut self.backend) {
            warn!(port = %self.config.port_name, "releasing previous direction control failed: {e}");
        }

        match DirectionControl::resolve(&mut self.backend, &rs485) {
            Ok(direction) => {
                info!(
                    port = %self.config.port_name,
                    rs485 = %direction.mode(),
                    pin = %rs485.pin,
                    "RS-485 reconfigured"
                );
                self.direction = direction;
                self.config.rs485 = rs485;
                Ok(())
            }
            Err(e) => {
                match DirectionControl::resolve(&mut self.backend, &self.config.rs485) {
                    Ok(previous) => self.direction = previous,
                    Err(restore) => {
                        warn!(
                            port = %self.config.port_name,
                            "could not restore previous RS-485 settings, direction control off: {restore}"
                        );
                        self.config.rs485.enabled = false;
                    }
                }
                Err(EngineError::from_port(op, e))
            }
        }
    }

    /// Change the before/after-send delays of the running strategy.
    pub fn set_rs485_delays(&mut self, before_us: u32, after_us: u32) -> EngineResult<()> {
        self.config.rs485.delay_before_send_us = before_us;
        self.config.rs485.delay_after_send_us = after_us;
        self.direction
            .apply_delays(&mut self.backend, &self.config.rs485)
            .map_err(|e| EngineError::from_port(Operation::SetRs485Delays, e))
    }

    /// Release direction control and close the device, reporting failures
    /// that dropping would only log.
    pub fn close(mut self) -> EngineResult<()> {
        self.direction
            .release(&mut self.backend)
            .map_err(|e| EngineError::from_port(Operation::Close, e))
    }
}

impl<B: SerialBackend> Drop for SerialLink<B> {
    fn drop(&mut self) {
        if let Err(e) = self.direction.release(&mut self.backend) {
            warn!(port = %self.config.port_name, "releasing direction control failed: {e}");
        }
        info!(port = %self.config.port_name, "port closed");
    }
}

impl<B: SerialBackend> std::fmt::Debug for SerialLink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("backend", &self.backend)
            .field("effective_timeout", &self.effective_timeout)
            .field("direction", &self.direction.mode())
            .finish()
    }
}
