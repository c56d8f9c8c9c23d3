//! RS-485 half-duplex direction control.
//!
//! On a shared RS-485 bus the local transceiver may only drive the line
//! while our own frame is leaving the UART. This module holds the user-facing
//! configuration ([`Rs485Config`]) and the strategy that enforces it
//! ([`DirectionControl`]):
//!
//! - **Kernel**: Linux drivers that support `TIOCSRS485` toggle RTS
//!   themselves with hardware timing.
//! - **Manual**: the engine asserts the pin, writes, waits for the UART to
//!   drain, then releases the pin.
//!
//! Which strategy is active is decided by [`DirectionControl::resolve`] at
//! open time and again on every reconfiguration.

mod direction;

pub use direction::{DirectionControl, DirectionMode, ManualDirection};

pub use crate::port::ControlPin;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// Flag bits of `struct serial_rs485` (linux/serial.h).
pub const SER_RS485_ENABLED: u32 = 1 << 0;
pub const SER_RS485_RTS_ON_SEND: u32 = 1 << 1;
pub const SER_RS485_RTS_AFTER_SEND: u32 = 1 << 2;
pub const SER_RS485_RX_DURING_TX: u32 = 1 << 4;
pub const SER_RS485_TERMINATE_BUS: u32 = 1 << 5;

/// How the engine should pick a direction-control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rs485Strategy {
    /// Kernel-assisted where the platform and pin allow it, manual otherwise.
    #[default]
    Auto,
    /// Always toggle the pin in software.
    Manual,
}

/// RS-485 settings for one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rs485Config {
    pub enabled: bool,
    pub strategy: Rs485Strategy,
    pub pin: ControlPin,
    /// Level that enables the transmitter. Applies to whichever pin is used.
    pub rts_active_high: bool,
    /// Keep the receiver enabled while transmitting (kernel mode only).
    pub rx_during_tx: bool,
    /// Switch on the bus terminator if the hardware has one (kernel mode only).
    pub termination_enabled: bool,
    pub delay_before_send_us: u32,
    pub delay_after_send_us: u32,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: Rs485Strategy::Auto,
            pin: ControlPin::Rts,
            rts_active_high: true,
            rx_during_tx: false,
            termination_enabled: false,
            delay_before_send_us: 0,
            delay_after_send_us: 0,
        }
    }
}

impl Rs485Config {
    /// RS-485 off; writes go straight to the port.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// RS-485 on with RTS, active high, no delays.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_pin(mut self, pin: ControlPin) -> Self {
        self.pin = pin;
        self
    }

    pub fn with_strategy(mut self, strategy: Rs485Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_delays(mut self, before_us: u32, after_us: u32) -> Self {
        self.delay_before_send_us = before_us;
        self.delay_after_send_us = after_us;
        self
    }

    pub fn delay_before_send(&self) -> Duration {
        Duration::from_micros(u64::from(self.delay_before_send_us))
    }

    pub fn delay_after_send(&self) -> Duration {
        Duration::from_micros(u64::from(self.delay_after_send_us))
    }

    /// Kernel request derived from this configuration.
    pub fn kernel_settings(&self) -> KernelRs485Settings {
        KernelRs485Settings {
            rts_on_send: self.rts_active_high,
            rx_during_tx: self.rx_during_tx,
            termination_enabled: self.termination_enabled,
            delay_before_send_us: self.delay_before_send_us,
            delay_after_send_us: self.delay_after_send_us,
        }
    }
}

/// Parameters of a kernel-assisted RS-485 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelRs485Settings {
    /// RTS level while sending; the level after sending is the complement.
    pub rts_on_send: bool,
    pub rx_during_tx: bool,
    pub termination_enabled: bool,
    pub delay_before_send_us: u32,
    pub delay_after_send_us: u32,
}

impl KernelRs485Settings {
    /// `serial_rs485.flags` for this request.
    pub fn flags(&self) -> u32 {
        let mut flags = SER_RS485_ENABLED;
        if self.rts_on_send {
            flags |= SER_RS485_RTS_ON_SEND;
        } else {
            flags |= SER_RS485_RTS_AFTER_SEND;
        }
        if self.rx_during_tx {
            flags |= SER_RS485_RX_DURING_TX;
        }
        if self.termination_enabled {
            flags |= SER_RS485_TERMINATE_BUS;
        }
        flags
    }

    /// Before-send delay in the kernel's unit (milliseconds), rounded up.
    pub fn delay_before_send_ms(&self) -> u32 {
        self.delay_before_send_us.div_ceil(1000)
    }

    /// After-send delay in the kernel's unit (milliseconds), rounded up.
    pub fn delay_after_send_ms(&self) -> u32 {
        self.delay_after_send_us.div_ceil(1000)
    }
}
