//! Linux: kernel RS-485 ioctls and transmitter-empty drain.

use crate::port::error::PortError;
use crate::rs485::{KernelRs485Settings, SER_RS485_ENABLED};
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

pub(super) type Device = serialport::TTYPort;

// linux/asm-generic/ioctls.h
const TIOCGRS485: libc::c_ulong = 0x542E;
const TIOCSRS485: libc::c_ulong = 0x542F;
const TIOCSERGETLSR: libc::c_ulong = 0x5459;
const TIOCSER_TEMT: libc::c_uint = 0x01;

/// `struct serial_rs485` from linux/serial.h.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct SerialRs485 {
    flags: u32,
    delay_rts_before_send: u32,
    delay_rts_after_send: u32,
    padding: [u32; 5],
}

fn set_rs485(device: &Device, request: &mut SerialRs485) -> io::Result<()> {
    // SAFETY: the descriptor stays open for the lifetime of `device` and
    // `request` has the layout the kernel expects for TIOCSRS485.
    let rc = unsafe {
        libc::ioctl(
            device.as_raw_fd(),
            TIOCSRS485 as _,
            request as *mut SerialRs485,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn get_rs485(device: &Device) -> io::Result<SerialRs485> {
    let mut applied = SerialRs485::default();
    // SAFETY: as above, TIOCGRS485 fills a `serial_rs485`.
    let rc = unsafe {
        libc::ioctl(
            device.as_raw_fd(),
            TIOCGRS485 as _,
            &mut applied as *mut SerialRs485,
        )
    };
    if rc == 0 {
        Ok(applied)
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Request hardware-timed RTS switching and confirm it on read-back.
pub(super) fn enable_kernel_rs485(
    device: &Device,
    settings: &KernelRs485Settings,
) -> Result<bool, PortError> {
    let mut request = SerialRs485 {
        flags: settings.flags(),
        delay_rts_before_send: settings.delay_before_send_ms(),
        delay_rts_after_send: settings.delay_after_send_ms(),
        padding: [0; 5],
    };

    if let Err(e) = set_rs485(device, &mut request) {
        return Err(match e.raw_os_error() {
            Some(libc::ENOTTY) | Some(libc::EINVAL) | Some(libc::EOPNOTSUPP) => {
                PortError::unsupported(format!("driver rejected TIOCSRS485: {e}"))
            }
            _ => PortError::Io(e),
        });
    }

    // Some UARTs accept the request and silently ignore it.
    match get_rs485(device) {
        Ok(applied) => Ok(applied.flags & SER_RS485_ENABLED != 0),
        Err(_) => Ok(false),
    }
}

pub(super) fn disable_kernel_rs485(device: &Device) -> Result<(), PortError> {
    let mut request = SerialRs485::default();
    set_rs485(device, &mut request).map_err(PortError::Io)
}

/// Block until the transmit shift register is empty.
///
/// `tcdrain` only waits for the driver's queue; the last character may
/// still be shifting out of the UART when it returns. The line status
/// register tells when it is really gone. Drivers without LSR support end
/// the drain at `tcdrain`.
pub(super) fn drain(device: &mut Device, character_time: Duration) -> Result<(), PortError> {
    let fd = device.as_raw_fd();
    loop {
        // SAFETY: `fd` belongs to `device`, which outlives this call.
        if unsafe { libc::tcdrain(fd) } == 0 {
            break;
        }
        let e = io::Error::last_os_error();
        if e.kind() != io::ErrorKind::Interrupted {
            return Err(PortError::Io(e));
        }
    }

    let poll = (character_time / 4).max(Duration::from_micros(50));
    let deadline = Instant::now() + character_time * 4;
    loop {
        let mut lsr: libc::c_uint = 0;
        // SAFETY: TIOCSERGETLSR writes one unsigned int.
        let rc = unsafe { libc::ioctl(fd, TIOCSERGETLSR as _, &mut lsr as *mut libc::c_uint) };
        if rc != 0 || lsr & TIOCSER_TEMT != 0 || Instant::now() >= deadline {
            return Ok(());
        }
        std::thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_rs485_layout() {
        // flags + two delays + five words of padding
        assert_eq!(std::mem::size_of::<SerialRs485>(), 32);
    }

    #[test]
    fn test_pseudo_terminal_has_no_kernel_rs485() {
        let Ok((master, _slave)) = serialport::TTYPort::pair() else {
            eprintln!("skipping: no pseudo-terminal available");
            return;
        };
        let settings = crate::rs485::Rs485Config::enabled().kernel_settings();
        match enable_kernel_rs485(&master, &settings) {
            Ok(confirmed) => assert!(!confirmed),
            Err(e) => assert!(e.is_unsupported() || matches!(e, PortError::Io(_))),
        }
    }
}
