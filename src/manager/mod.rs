//! Handle-based ownership of open ports.
//!
//! Binding layers that can only pass integers around use a
//! `HandleManager`: `open` returns a [`PortHandle`], every other call
//! looks the link up again. Calls on unknown or closed handles fail with
//! [`ErrorKind::NotOpen`](crate::error::ErrorKind::NotOpen), never with
//! undefined behaviour.
//!
//! # Concurrency
//!
//! Each link sits behind its own mutex, which callers that follow the
//! one-caller-per-handle rule never contend. `close` only unlinks the
//! entry; a call already running on another thread keeps its own reference
//! and completes, and the device is released when that call returns.

mod arena;

pub use arena::{Arena, PortHandle};

use crate::error::{EngineError, EngineResult, Operation};
use crate::link::{open_native, OpenConfig, SerialLink};
use crate::port::SerialBackend;
use crate::rs485::{DirectionMode, Rs485Config};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A link as stored by the manager.
pub type DynLink = SerialLink<Box<dyn SerialBackend>>;

type SharedLink = Arc<Mutex<DynLink>>;

#[derive(Debug, Default)]
pub struct HandleManager {
    ports: RwLock<Arena<SharedLink>>,
}

impl HandleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an OS serial device.
    pub fn open(&self, config: OpenConfig) -> EngineResult<PortHandle> {
        let backend = open_native(&config)?;
        self.open_with_backend(Box::new(backend), config)
    }

    /// Open on an already-constructed transport.
    pub fn open_with_backend(
        &self,
        backend: Box<dyn SerialBackend>,
        config: OpenConfig,
    ) -> EngineResult<PortHandle> {
        let link = SerialLink::with_backend(backend, config)?;
        let name = link.name().to_string();
        let handle = self
            .ports
            .write()
            .insert(Arc::new(Mutex::new(link)))
            .ok_or_else(|| EngineError::configuration(Operation::Open, "too many open ports"))?;
        debug!(port = %name, %handle, "handle issued");
        Ok(handle)
    }

    /// Close `handle`. Returns whether it was open; closing twice is fine.
    pub fn close(&self, handle: PortHandle) -> bool {
        // Dropping outside the table lock: releasing RS-485 may block.
        let removed = self.ports.write().remove(handle);
        match removed {
            Some(link) => {
                debug!(%handle, "handle closed");
                drop(link);
                true
            }
            None => false,
        }
    }

    /// Close every open port.
    pub fn close_all(&self) -> usize {
        let links = self.ports.write().drain();
        links.len()
    }

    pub fn is_open(&self, handle: PortHandle) -> bool {
        self.ports.read().get(handle).is_some()
    }

    pub fn open_count(&self) -> usize {
        self.ports.read().len()
    }

    /// Run `f` on the link behind `handle`.
    pub fn with_link<R>(
        &self,
        handle: PortHandle,
        operation: Operation,
        f: impl FnOnce(&mut DynLink) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let link = self
            .ports
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| EngineError::not_open(operation))?;
        let mut guard = link.lock();
        f(&mut guard)
    }

    pub fn write(&self, handle: PortHandle, data: &[u8]) -> EngineResult<usize> {
        self.with_link(handle, Operation::Write, |link| link.write(data))
    }

    pub fn read(&self, handle: PortHandle, buffer: &mut [u8]) -> EngineResult<usize> {
        self.with_link(handle, Operation::Read, |link| link.read(buffer))
    }

    pub fn available(&self, handle: PortHandle) -> EngineResult<u32> {
        self.with_link(handle, Operation::Available, |link| link.available())
    }

    pub fn flush(&self, handle: PortHandle) -> EngineResult<()> {
        self.with_link(handle, Operation::Flush, |link| link.flush())
    }

    pub fn clear_input(&self, handle: PortHandle) -> EngineResult<()> {
        self.with_link(handle, Operation::ClearInput, |link| link.clear_input())
    }

    pub fn clear_output(&self, handle: PortHandle) -> EngineResult<()> {
        self.with_link(handle, Operation::ClearOutput, |link| link.clear_output())
    }

    pub fn clear_all(&self, handle: PortHandle) -> EngineResult<()> {
        self.with_link(handle, Operation::ClearAll, |link| link.clear_all())
    }

    pub fn set_timeout(&self, handle: PortHandle, timeout_ms: u64) -> EngineResult<()> {
        self.with_link(handle, Operation::SetTimeout, |link| {
            link.set_timeout(timeout_ms)
        })
    }

    pub fn effective_timeout(&self, handle: PortHandle) -> EngineResult<Duration> {
        self.with_link(handle, Operation::SetTimeout, |link| {
            Ok(link.effective_timeout())
        })
    }

    pub fn set_rts(&self, handle: PortHandle, level: bool) -> EngineResult<()> {
        self.with_link(handle, Operation::SetRts, |link| link.set_rts(level))
    }

    pub fn set_dtr(&self, handle: PortHandle, level: bool) -> EngineResult<()> {
        self.with_link(handle, Operation::SetDtr, |link| link.set_dtr(level))
    }

    pub fn is_kernel_rs485_active(&self, handle: PortHandle) -> EngineResult<bool> {
        self.with_link(handle, Operation::KernelRs485Query, |link| {
            Ok(link.is_kernel_rs485_active())
        })
    }

    pub fn direction_mode(&self, handle: PortHandle) -> EngineResult<DirectionMode> {
        self.with_link(handle, Operation::KernelRs485Query, |link| {
            Ok(link.direction_mode())
        })
    }

    pub fn set_rs485_config(&self, handle: PortHandle, rs485: Rs485Config) -> EngineResult<()> {
        self.with_link(handle, Operation::SetRs485Config, |link| {
            link.set_rs485_config(rs485)
        })
    }

    pub fn set_rs485_delays(
        &self,
        handle: PortHandle,
        before_us: u32,
        after_us: u32,
    ) -> EngineResult<()> {
        self.with_link(handle, Operation::SetRs485Delays, |link| {
            link.set_rs485_delays(before_us, after_us)
        })
    }
}
