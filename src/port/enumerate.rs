//! Port discovery with device classification.
//!
//! Every device reported by `serialport::available_ports` is tagged as a
//! symlink, a pseudo-terminal (no hardware control lines) and/or a
//! Bluetooth serial port. Records travel across the binding boundary as
//! tab-separated lines:
//!
//! ```text
//! /dev/ttyUSB0\t0\t0\t0
//! /dev/serial/by-id/usb-FTDI\t1\t0\t0
//! /dev/rfcomm0\t0\t0\t1
//! ```

use super::error::PortError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// `/dev/pts/N`, `/dev/ptyXY`, `/dev/ptmx` and friends.
static PSEUDO_TERMINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/dev/pt(s/|y|mx)").expect("pseudo-terminal pattern is valid")
});

/// macOS `/dev/cu.Bluetooth-*`, Linux `/dev/rfcomm*`, Windows friendly names.
static BLUETOOTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)bluetooth|^/dev/rfcomm").expect("bluetooth pattern is valid")
});

/// One enumerated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    pub is_symlink: bool,
    pub is_pseudo_terminal: bool,
    pub is_bluetooth: bool,
}

impl PortRecord {
    /// Render as `name\tsymlink\tpty\tbluetooth` with `0`/`1` flags.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.name,
            flag(self.is_symlink),
            flag(self.is_pseudo_terminal),
            flag(self.is_bluetooth)
        )
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn parse_flag(field: &str, line: &str) -> Result<bool, PortError> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(PortError::config(format!(
            "invalid flag {other:?} in port record {line:?}"
        ))),
    }
}

impl FromStr for PortRecord {
    type Err = PortError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split('\t').collect();
        let [name, symlink, pty, bluetooth] = fields.as_slice() else {
            return Err(PortError::config(format!(
                "port record needs 4 tab-separated fields: {line:?}"
            )));
        };
        if name.is_empty() {
            return Err(PortError::config("port record has an empty name"));
        }
        Ok(Self {
            name: (*name).to_string(),
            is_symlink: parse_flag(symlink, line)?,
            is_pseudo_terminal: parse_flag(pty, line)?,
            is_bluetooth: parse_flag(bluetooth, line)?,
        })
    }
}

/// Classify a device path by name and, on Unix, by what it links to.
pub fn classify(name: &str) -> PortRecord {
    let (is_symlink, target) = resolve_link(name);
    let is_pseudo_terminal = PSEUDO_TERMINAL.is_match(name)
        || target.as_deref().is_some_and(|t| PSEUDO_TERMINAL.is_match(t));
    PortRecord {
        name: name.to_string(),
        is_symlink,
        is_pseudo_terminal,
        is_bluetooth: BLUETOOTH.is_match(name),
    }
}

#[cfg(unix)]
fn resolve_link(name: &str) -> (bool, Option<String>) {
    let path = std::path::Path::new(name);
    let is_symlink = std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if !is_symlink {
        return (false, None);
    }
    // Relative targets like ../../ttyUSB0 only mean something once resolved.
    let target = std::fs::canonicalize(path)
        .or_else(|_| std::fs::read_link(path))
        .ok()
        .map(|p| p.to_string_lossy().into_owned());
    (true, target)
}

#[cfg(not(unix))]
fn resolve_link(_name: &str) -> (bool, Option<String>) {
    (false, None)
}

/// List the serial devices present on this system.
pub fn list_ports() -> Result<Vec<PortRecord>, PortError> {
    let ports = serialport::available_ports()?;
    let records: Vec<PortRecord> = ports
        .into_iter()
        .map(|info| {
            let mut record = classify(&info.port_name);
            record.is_bluetooth |=
                matches!(info.port_type, serialport::SerialPortType::BluetoothPort);
            record
        })
        .collect();
    debug!(count = records.len(), "enumerated serial ports");
    Ok(records)
}

/// Join records into the newline-separated boundary format.
pub fn format_records(records: &[PortRecord]) -> String {
    records
        .iter()
        .map(PortRecord::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the boundary format back into records; blank lines are skipped.
pub fn parse_records(text: &str) -> Result<Vec<PortRecord>, PortError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}
