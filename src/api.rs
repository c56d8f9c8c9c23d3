//! Flat call surface for host-language binding layers.
//!
//! Mirrors what a foreign-function boundary can carry: integer handles,
//! raw integer encodings and sentinel results (`0` for a failed open, `-1`
//! for failed counts, `false` for failed actions). The diagnostic for the
//! most recent failure on the calling thread is available from
//! [`get_last_error`] until the next call clears it.
//!
//! Rust callers should use [`SerialLink`](crate::SerialLink) or
//! [`HandleManager`] directly and get a `Result` per call instead.

use crate::error::{EngineError, EngineResult, Operation};
use crate::last_error;
use crate::link::OpenConfig;
use crate::manager::{HandleManager, PortHandle};
use crate::port::{
    self, ControlPin, DataBits, FlowControl, Parity, PortConfiguration, PortError, SerialBackend,
    StopBits,
};
use crate::rs485::{Rs485Config, Rs485Strategy};
use once_cell::sync::Lazy;
use std::time::Duration;
use tracing::debug;

pub use crate::last_error::{clear_last_error, get_last_error};

static MANAGER: Lazy<HandleManager> = Lazy::new(HandleManager::new);

/// The process-wide manager behind this surface.
pub fn manager() -> &'static HandleManager {
    &MANAGER
}

/// RS-485 arguments in their boundary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRs485Config {
    /// 0 = off, 1 = auto (kernel when possible), 2 = always manual.
    pub mode: i32,
    /// 0 = RTS, 1 = DTR.
    pub pin: i32,
    pub rts_active_high: bool,
    pub rx_during_tx: bool,
    pub termination_enabled: bool,
    pub delay_before_us: i32,
    pub delay_after_us: i32,
}

impl Default for RawRs485Config {
    fn default() -> Self {
        Self {
            mode: 0,
            pin: 0,
            rts_active_high: true,
            rx_during_tx: false,
            termination_enabled: false,
            delay_before_us: 0,
            delay_after_us: 0,
        }
    }
}

/// Arguments of `open` in their boundary encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOpenRequest {
    pub port_name: String,
    pub baud_rate: i32,
    /// 5, 6, 7 or 8.
    pub data_bits: i32,
    /// 1 or 2.
    pub stop_bits: i32,
    /// 0 = none, 1 = odd, 2 = even.
    pub parity: i32,
    /// 0 = none, 1 = software, 2 = hardware.
    pub flow_control: i32,
    pub dtr_on_open: bool,
    pub timeout_ms: i32,
    pub rs485: RawRs485Config,
}

impl RawOpenRequest {
    /// 9600 8N1, no flow control, DTR asserted, 1 s timeout, RS-485 off.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: 0,
            flow_control: 0,
            dtr_on_open: true,
            timeout_ms: 1000,
            rs485: RawRs485Config::default(),
        }
    }
}

fn non_negative(value: i32, what: &str, operation: Operation) -> EngineResult<u32> {
    u32::try_from(value).map_err(|_| {
        EngineError::configuration(operation, format!("{what} must not be negative, got {value}"))
    })
}

fn config_error(operation: Operation) -> impl Fn(PortError) -> EngineError {
    move |e| EngineError::from_port(operation, e)
}

impl RawRs485Config {
    fn to_config(self, operation: Operation) -> EngineResult<Rs485Config> {
        let (enabled, strategy) = match self.mode {
            0 => (false, Rs485Strategy::Auto),
            1 => (true, Rs485Strategy::Auto),
            2 => (true, Rs485Strategy::Manual),
            other => {
                return Err(EngineError::configuration(
                    operation,
                    format!("RS-485 mode must be 0 (off), 1 (auto) or 2 (manual), got {other}"),
                ))
            }
        };
        Ok(Rs485Config {
            enabled,
            strategy,
            pin: ControlPin::try_from(self.pin).map_err(config_error(operation))?,
            rts_active_high: self.rts_active_high,
            rx_during_tx: self.rx_during_tx,
            termination_enabled: self.termination_enabled,
            delay_before_send_us: non_negative(self.delay_before_us, "delay before send", operation)?,
            delay_after_send_us: non_negative(self.delay_after_us, "delay after send", operation)?,
        })
    }
}

impl TryFrom<&RawOpenRequest> for OpenConfig {
    type Error = EngineError;

    fn try_from(raw: &RawOpenRequest) -> Result<Self, Self::Error> {
        let op = Operation::Open;
        let baud_rate = u32::try_from(raw.baud_rate)
            .ok()
            .filter(|&baud| baud > 0)
            .ok_or_else(|| {
                EngineError::configuration(
                    op,
                    format!("baud rate must be positive, got {}", raw.baud_rate),
                )
            })?;
        let line = PortConfiguration {
            baud_rate,
            data_bits: DataBits::try_from(raw.data_bits).map_err(config_error(op))?,
            flow_control: FlowControl::try_from(raw.flow_control).map_err(config_error(op))?,
            parity: Parity::try_from(raw.parity).map_err(config_error(op))?,
            stop_bits: StopBits::try_from(raw.stop_bits).map_err(config_error(op))?,
            timeout: Duration::from_millis(u64::from(non_negative(
                raw.timeout_ms,
                "timeout",
                op,
            )?)),
        };
        let config = OpenConfig {
            port_name: raw.port_name.clone(),
            line,
            dtr_on_open: raw.dtr_on_open,
            rs485: raw.rs485.to_config(op)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Clear the slot, run `f`, record its failure.
fn run<T>(f: impl FnOnce() -> EngineResult<T>) -> Option<T> {
    last_error::clear_last_error();
    match f() {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(kind = ?e.kind(), "call failed: {e}");
            last_error::record(e.to_string());
            None
        }
    }
}

fn handle(raw: u64, operation: Operation) -> EngineResult<PortHandle> {
    PortHandle::from_raw(raw).ok_or_else(|| EngineError::not_open(operation))
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Open a port. Returns its handle, or `0` on failure.
pub fn open(request: &RawOpenRequest) -> u64 {
    run(|| {
        let config = OpenConfig::try_from(request)?;
        MANAGER.open(config)
    })
    .map_or(0, PortHandle::as_raw)
}

/// Open on a caller-supplied transport. Returns its handle, or `0`.
pub fn open_with_backend(backend: Box<dyn SerialBackend>, request: &RawOpenRequest) -> u64 {
    run(|| {
        let config = OpenConfig::try_from(request)?;
        MANAGER.open_with_backend(backend, config)
    })
    .map_or(0, PortHandle::as_raw)
}

/// Close a port. Unknown and already-closed handles are ignored.
pub fn close(raw: u64) {
    last_error::clear_last_error();
    if let Some(h) = PortHandle::from_raw(raw) {
        MANAGER.close(h);
    }
}

/// Bytes written, or `-1`.
pub fn write(raw: u64, data: &[u8]) -> i64 {
    run(|| MANAGER.write(handle(raw, Operation::Write)?, data)).map_or(-1, count)
}

/// Bytes read (`0` when the timeout passed without data), or `-1`.
pub fn read(raw: u64, buffer: &mut [u8]) -> i64 {
    run(|| MANAGER.read(handle(raw, Operation::Read)?, buffer)).map_or(-1, count)
}

/// Bytes waiting in the receive buffer, or `-1`.
pub fn available(raw: u64) -> i64 {
    run(|| MANAGER.available(handle(raw, Operation::Available)?)).map_or(-1, i64::from)
}

/// Block until all written data has been transmitted.
pub fn flush(raw: u64) -> bool {
    run(|| MANAGER.flush(handle(raw, Operation::Flush)?)).is_some()
}

pub fn clear_input(raw: u64) -> bool {
    run(|| MANAGER.clear_input(handle(raw, Operation::ClearInput)?)).is_some()
}

pub fn clear_output(raw: u64) -> bool {
    run(|| MANAGER.clear_output(handle(raw, Operation::ClearOutput)?)).is_some()
}

pub fn clear_all(raw: u64) -> bool {
    run(|| MANAGER.clear_all(handle(raw, Operation::ClearAll)?)).is_some()
}

/// Change the read timeout. The effective wait is rounded up to the
/// platform's timer granularity.
pub fn set_timeout(raw: u64, timeout_ms: i32) -> bool {
    run(|| {
        let h = handle(raw, Operation::SetTimeout)?;
        let ms = non_negative(timeout_ms, "timeout", Operation::SetTimeout)?;
        MANAGER.set_timeout(h, u64::from(ms))
    })
    .is_some()
}

pub fn set_rts(raw: u64, level: bool) -> bool {
    run(|| MANAGER.set_rts(handle(raw, Operation::SetRts)?, level)).is_some()
}

pub fn set_dtr(raw: u64, level: bool) -> bool {
    run(|| MANAGER.set_dtr(handle(raw, Operation::SetDtr)?, level)).is_some()
}

/// Whether the driver switches RTS itself. `false` for closed handles.
pub fn is_kernel_rs485_active(raw: u64) -> bool {
    run(|| MANAGER.is_kernel_rs485_active(handle(raw, Operation::KernelRs485Query)?))
        .unwrap_or(false)
}

/// Replace the RS-485 settings of an open port.
pub fn set_rs485_config(raw: u64, rs485: &RawRs485Config) -> bool {
    run(|| {
        let h = handle(raw, Operation::SetRs485Config)?;
        let config = rs485.to_config(Operation::SetRs485Config)?;
        MANAGER.set_rs485_config(h, config)
    })
    .is_some()
}

pub fn set_rs485_delays(raw: u64, before_us: i32, after_us: i32) -> bool {
    run(|| {
        let op = Operation::SetRs485Delays;
        let h = handle(raw, op)?;
        let before = non_negative(before_us, "delay before send", op)?;
        let after = non_negative(after_us, "delay after send", op)?;
        MANAGER.set_rs485_delays(h, before, after)
    })
    .is_some()
}

/// Enumerated devices as tab-separated lines, or `None` on failure.
pub fn list_ports() -> Option<String> {
    run(|| {
        port::list_ports()
            .map(|records| port::format_records(&records))
            .map_err(|e| EngineError::from_port(Operation::ListPorts, e))
    })
}
