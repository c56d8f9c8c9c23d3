//! Windows: manual direction control only.

use crate::port::error::PortError;
use std::io::Write;
use std::time::Duration;

pub(super) type Device = serialport::COMPort;

/// `COMPort::flush` calls `FlushFileBuffers`, which blocks until the
/// driver has transmitted everything.
pub(super) fn drain(device: &mut Device, character_time: Duration) -> Result<(), PortError> {
    device.flush().map_err(PortError::Io)?;
    // USB adapters report completion when the data reached the adapter,
    // not the wire; allow the last character to shift out.
    std::thread::sleep(character_time);
    Ok(())
}
