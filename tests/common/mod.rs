//! Shared test utilities for serial485 integration tests.
//!
//! This module provides common test infrastructure including:
//! - Mock port creation with pre-programmed responses
//! - Links opened over mock ports
//! - Timeline helpers for direction-control assertions

#![allow(dead_code)]

use serial485::port::{ControlPin, MockEvent, MockSerialPort};
use serial485::{OpenConfig, Rs485Config, SerialLink};
use std::time::{Duration, Instant};

/// Create a mock serial port with pre-programmed responses.
///
/// # Example
/// ```ignore
/// let mock = create_mock_port_with_responses("MOCK0", vec![b"OK\r\n", b"READY\r\n"]);
/// ```
pub fn create_mock_port_with_responses(port_name: &str, responses: Vec<&[u8]>) -> MockSerialPort {
    let mut mock = MockSerialPort::new(port_name);
    for response in responses {
        mock.enqueue_read(response);
    }
    mock
}

/// Open a link over a clone of `port`, keeping `port` for inspection.
pub fn open_link(port: &MockSerialPort, name: &str, rs485: Rs485Config) -> SerialLink<MockSerialPort> {
    SerialLink::with_backend(port.clone(), OpenConfig::new(name).with_rs485(rs485))
        .expect("mock link opens")
}

/// Times at which `pin` was driven to `level`, in order.
pub fn pin_changes(timeline: &[(Instant, MockEvent)], pin: ControlPin, level: bool) -> Vec<Instant> {
    timeline
        .iter()
        .filter(|(_, event)| *event == MockEvent::Pin(pin, level))
        .map(|(at, _)| *at)
        .collect()
}

/// Time of the first event matching `predicate`.
pub fn first_event(
    timeline: &[(Instant, MockEvent)],
    predicate: impl Fn(&MockEvent) -> bool,
) -> Option<Instant> {
    timeline
        .iter()
        .find(|(_, event)| predicate(event))
        .map(|(at, _)| *at)
}

/// Timing margin that tolerates scheduler jitter without hiding real bugs.
pub fn slack() -> Duration {
    Duration::from_millis(1)
}
