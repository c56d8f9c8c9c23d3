//! macOS and the BSDs: no kernel RS-485, `tcdrain` is the drain.

use crate::port::error::PortError;
use std::io::Write;
use std::time::Duration;

pub(super) type Device = serialport::TTYPort;

/// `TTYPort::flush` is `tcdrain`, which returns once the queue is on the wire.
pub(super) fn drain(device: &mut Device, _character_time: Duration) -> Result<(), PortError> {
    device.flush().map_err(PortError::Io)
}
