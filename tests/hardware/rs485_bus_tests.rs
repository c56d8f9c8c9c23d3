//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0        # device under test
//! export TEST_PEER_PORT=/dev/ttyUSB1   # second adapter on the same RS-485 bus
//! export TEST_BAUD=19200               # optional, default: 9600
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

use pretty_assertions::assert_eq;
use serial485::{ControlPin, DirectionMode, Rs485Config, Rs485Strategy, SerialLink};
use std::time::{Duration, Instant};

use crate::hardware::utils::{read_frame, TestPortConfig};

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let link = config.open(Rs485Config::disabled());
    println!("opened {} ({})", link.name(), link.direction_mode());
    assert_eq!(link.direction_mode(), DirectionMode::None);
    link.close().expect("close failed");
}

#[test]
#[ignore]
fn test_auto_mode_reports_its_strategy() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let link = config.open(Rs485Config::enabled());
    let mode = link.direction_mode();
    println!("{}: {mode}", link.name());
    assert_ne!(mode, DirectionMode::None);
    assert_eq!(link.is_kernel_rs485_active(), mode == DirectionMode::Kernel);
}

#[test]
#[ignore]
fn test_manual_frames_cross_the_bus() {
    let Some((config, peer)) = TestPortConfig::with_peer() else {
        return;
    };

    let rs485 = Rs485Config::enabled().with_strategy(Rs485Strategy::Manual);
    let mut tx = config.open(rs485.clone());
    let mut rx = SerialLink::open(config.open_config(&peer, rs485)).expect("peer opens");
    rx.clear_input().unwrap();

    for round in 0u8..10 {
        let frame: Vec<u8> = (0..32).map(|i| i ^ round).collect();
        tx.write(&frame).unwrap();
        assert_eq!(read_frame(&mut rx, frame.len(), config.timeout), frame, "round {round}");
    }
}

#[test]
#[ignore]
fn test_reply_is_not_truncated_by_late_release() {
    // The peer answers immediately; a sender that releases the bus late
    // would still be driving it and corrupt the first reply bytes.
    let Some((config, peer)) = TestPortConfig::with_peer() else {
        return;
    };

    let mut master = config.open(Rs485Config::enabled());
    let mut slave =
        SerialLink::open(config.open_config(&peer, Rs485Config::enabled())).expect("peer opens");

    master.write(b"PING").unwrap();
    assert_eq!(read_frame(&mut slave, 4, config.timeout), b"PING");
    slave.write(b"PONG").unwrap();
    assert_eq!(read_frame(&mut master, 4, config.timeout), b"PONG");
}

#[test]
#[ignore]
fn test_switch_direction_pin_live() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let mut link = config.open(Rs485Config::enabled().with_strategy(Rs485Strategy::Manual));
    link.write(b"rts").unwrap();
    link.set_rs485_config(Rs485Config::enabled().with_pin(ControlPin::Dtr))
        .unwrap();
    assert_eq!(link.direction_mode(), DirectionMode::Manual);
    link.write(b"dtr").unwrap();
}

#[test]
#[ignore]
fn test_write_duration_covers_wire_time() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let mut link = config.open(Rs485Config::enabled().with_strategy(Rs485Strategy::Manual));
    let payload = vec![0x55u8; 64];
    // 10 bits per character at 8N1
    let wire = Duration::from_micros(64 * 10 * 1_000_000 / u64::from(config.baud_rate));

    let started = Instant::now();
    link.write(&payload).unwrap();
    let elapsed = started.elapsed();

    println!("64 bytes took {elapsed:?}, wire time {wire:?}");
    assert!(elapsed >= wire.mul_f32(0.9));
}
