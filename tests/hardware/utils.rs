//! Utility functions for hardware testing.
//!
//! Provides helpers for reading the test environment and opening links on
//! the configured devices.

use serial485::config::ConfigLoader;
use serial485::{OpenConfig, Rs485Config, SerialLink};
use std::time::{Duration, Instant};

/// Devices and line speed from `TEST_PORT`, `TEST_PEER_PORT` and `TEST_BAUD`
/// (or the `[testing]` section of the configuration file).
pub struct TestPortConfig {
    pub port_name: String,
    pub peer_name: Option<String>,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl TestPortConfig {
    pub fn from_env() -> Option<Self> {
        let testing = ConfigLoader::load()
            .map(|loader| loader.into_config().testing)
            .unwrap_or_default();
        let Some(port_name) = testing.port.clone() else {
            println!("Skipping hardware test: TEST_PORT not set");
            return None;
        };
        Some(Self {
            port_name,
            peer_name: testing.peer_port.clone(),
            baud_rate: testing.baud,
            timeout: testing.timeout(),
        })
    }

    /// Like [`from_env`](Self::from_env), but also requires a peer device.
    pub fn with_peer() -> Option<(Self, String)> {
        let config = Self::from_env()?;
        match config.peer_name.clone() {
            Some(peer) => Some((config, peer)),
            None => {
                println!("Skipping bus test: TEST_PEER_PORT not set");
                None
            }
        }
    }

    pub fn open_config(&self, name: &str, rs485: Rs485Config) -> OpenConfig {
        let mut config = OpenConfig::new(name)
            .with_timeout(self.timeout)
            .with_rs485(rs485);
        config.line.baud_rate = self.baud_rate;
        config
    }

    pub fn open(&self, rs485: Rs485Config) -> SerialLink {
        SerialLink::open(self.open_config(&self.port_name, rs485))
            .unwrap_or_else(|e| panic!("failed to open {}: {e}", self.port_name))
    }
}

/// Read until `len` bytes arrived or `limit` passed.
pub fn read_frame(link: &mut SerialLink, len: usize, limit: Duration) -> Vec<u8> {
    let mut received = Vec::with_capacity(len);
    let mut buffer = vec![0u8; len.max(1)];
    let deadline = Instant::now() + limit;
    while received.len() < len && Instant::now() < deadline {
        let n = link.read(&mut buffer).expect("read failed");
        received.extend_from_slice(&buffer[..n]);
    }
    received
}
