//! Strategy selection and execution for transceiver direction switching.

use super::{KernelRs485Settings, Rs485Config, Rs485Strategy};
use crate::port::{ControlPin, PortError, SerialBackend};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observable direction-control mode of an open port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionMode {
    /// RS-485 disabled.
    None,
    /// Driver switches RTS with hardware timing.
    Kernel,
    /// Engine toggles the pin around each write.
    Manual,
}

impl std::fmt::Display for DirectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectionMode::None => f.write_str("none"),
            DirectionMode::Kernel => f.write_str("kernel"),
            DirectionMode::Manual => f.write_str("manual"),
        }
    }
}

/// Software pin toggling around each write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualDirection {
    pin: ControlPin,
    transmit_level: bool,
    delay_before: Duration,
    delay_after: Duration,
    /// Cleared once the device reports it has no such control line.
    pin_supported: bool,
}

impl ManualDirection {
    pub fn new(config: &Rs485Config) -> Self {
        Self {
            pin: config.pin,
            transmit_level: config.rts_active_high,
            delay_before: config.delay_before_send(),
            delay_after: config.delay_after_send(),
            pin_supported: true,
        }
    }

    pub fn pin(&self) -> ControlPin {
        self.pin
    }

    /// Pin level that enables the transmitter.
    pub fn transmit_level(&self) -> bool {
        self.transmit_level
    }

    /// False when the device turned out to have no usable control line.
    pub fn pin_supported(&self) -> bool {
        self.pin_supported
    }

    /// Put the transceiver into receive mode.
    fn activate<B: SerialBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), PortError> {
        self.drive(backend, !self.transmit_level)
    }

    fn drive<B: SerialBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        level: bool,
    ) -> Result<(), PortError> {
        if !self.pin_supported {
            return Ok(());
        }
        match backend.set_pin(self.pin, level) {
            Ok(()) => {
                debug!(port = backend.name(), pin = %self.pin, level, "direction pin set");
                Ok(())
            }
            Err(e) if e.is_unsupported() => {
                warn!(
                    port = backend.name(),
                    pin = %self.pin,
                    "device has no usable direction pin, writing without pin control: {e}"
                );
                self.pin_supported = false;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn write<B: SerialBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        data: &[u8],
    ) -> Result<usize, PortError> {
        self.drive(backend, self.transmit_level)?;
        pause(self.delay_before);

        // The pin must stay asserted until the last bit is on the wire.
        let sent = write_all(backend, data).and_then(|n| backend.drain().map(|()| n));
        if sent.is_ok() {
            pause(self.delay_after);
        }

        // Release the bus even when the write failed.
        let released = self.drive(backend, !self.transmit_level);
        let n = sent?;
        released?;
        Ok(n)
    }
}

/// Active direction-control strategy of an open port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionControl {
    None,
    Kernel(KernelRs485Settings),
    Manual(ManualDirection),
}

impl DirectionControl {
    /// Pick and activate a strategy for `config`.
    ///
    /// Kernel mode is attempted only for RTS on a platform that offers it.
    /// A driver that rejects or silently ignores the request degrades to
    /// Manual; that is never an error. Errors come only from a Manual pin
    /// that fails for reasons other than "unsupported".
    pub fn resolve<B: SerialBackend + ?Sized>(
        backend: &mut B,
        config: &Rs485Config,
    ) -> Result<Self, PortError> {
        if !config.enabled {
            return Ok(DirectionControl::None);
        }

        if config.strategy == Rs485Strategy::Auto
            && config.pin == ControlPin::Rts
            && backend.platform().has_kernel_rs485()
        {
            let settings = config.kernel_settings();
            match backend.enable_kernel_rs485(&settings) {
                Ok(true) => {
                    info!(
                        port = backend.name(),
                        flags = settings.flags(),
                        "kernel RS-485 direction control active"
                    );
                    return Ok(DirectionControl::Kernel(settings));
                }
                Ok(false) => warn!(
                    port = backend.name(),
                    "driver did not confirm kernel RS-485, falling back to manual control"
                ),
                Err(e) => warn!(
                    port = backend.name(),
                    "kernel RS-485 unavailable, falling back to manual control: {e}"
                ),
            }
        }

        let mut manual = ManualDirection::new(config);
        manual.activate(backend)?;
        debug!(port = backend.name(), pin = %manual.pin, "manual RS-485 direction control active");
        Ok(DirectionControl::Manual(manual))
    }

    pub fn mode(&self) -> DirectionMode {
        match self {
            DirectionControl::None => DirectionMode::None,
            DirectionControl::Kernel(_) => DirectionMode::Kernel,
            DirectionControl::Manual(_) => DirectionMode::Manual,
        }
    }

    pub fn is_kernel(&self) -> bool {
        matches!(self, DirectionControl::Kernel(_))
    }

    /// Write `data` under this strategy.
    ///
    /// Without RS-485 this is a single plain write and returns what the OS
    /// accepted. Under Kernel or Manual control the whole buffer is written
    /// and drained before returning.
    pub fn write<B: SerialBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        data: &[u8],
    ) -> Result<usize, PortError> {
        match self {
            DirectionControl::None => backend.write_bytes(data),
            DirectionControl::Kernel(_) => {
                let n = write_all(backend, data)?;
                backend.drain()?;
                Ok(n)
            }
            DirectionControl::Manual(manual) => manual.write(backend, data),
        }
    }

    /// Apply changed delays from `config` to the running strategy.
    ///
    /// Kernel mode re-issues the request; if the driver no longer confirms
    /// it, the port continues under Manual control.
    pub fn apply_delays<B: SerialBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        config: &Rs485Config,
    ) -> Result<(), PortError> {
        match self {
            DirectionControl::None => Ok(()),
            DirectionControl::Manual(manual) => {
                manual.delay_before = config.delay_before_send();
                manual.delay_after = config.delay_after_send();
                Ok(())
            }
            DirectionControl::Kernel(settings) => {
                settings.delay_before_send_us = config.delay_before_send_us;
                settings.delay_after_send_us = config.delay_after_send_us;
                match backend.enable_kernel_rs485(settings) {
                    Ok(true) => Ok(()),
                    outcome => {
                        if let Err(e) = outcome {
                            warn!(port = backend.name(), "re-issuing kernel RS-485 failed: {e}");
                        }
                        warn!(port = backend.name(), "continuing with manual direction control");
                        // The driver may still hold the previous request.
                        if let Err(e) = backend.disable_kernel_rs485() {
                            warn!(port = backend.name(), "disabling kernel RS-485 failed: {e}");
                        }
                        let mut manual = ManualDirection::new(config);
                        manual.activate(backend)?;
                        *self = DirectionControl::Manual(manual);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Undo whatever the strategy set up on the device.
    ///
    /// Kernel mode is switched off (best effort); a manual pin is left at its
    /// receive level.
    pub fn release<B: SerialBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), PortError> {
        let previous = std::mem::replace(self, DirectionControl::None);
        match previous {
            DirectionControl::None => Ok(()),
            DirectionControl::Kernel(_) => {
                if let Err(e) = backend.disable_kernel_rs485() {
                    warn!(port = backend.name(), "disabling kernel RS-485 failed: {e}");
                }
                Ok(())
            }
            DirectionControl::Manual(mut manual) => manual.activate(backend),
        }
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Keep writing until the OS accepted all of `data`.
fn write_all<B: SerialBackend + ?Sized>(backend: &mut B, data: &[u8]) -> Result<usize, PortError> {
    let mut written = 0;
    while written < data.len() {
        match backend.write_bytes(&data[written..])? {
            0 => {
                return Err(PortError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("port accepted {written} of {} bytes", data.len()),
                )))
            }
            n => written += n,
        }
    }
    Ok(written)
}
