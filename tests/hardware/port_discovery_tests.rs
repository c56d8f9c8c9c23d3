//! Port discovery and enumeration tests.
//!
//! These tests don't require specific hardware but will use any available
//! ports on the system. They are still marked as ignored because they require
//! at least some serial hardware to be meaningful.

use serial485::port::{format_records, list_ports, parse_records};

use crate::hardware::utils::TestPortConfig;

#[test]
#[ignore] // Requires hardware
fn test_port_discovery() {
    let records = list_ports().expect("enumeration failed");
    if records.is_empty() {
        println!("No ports found - skipping test");
        return;
    }

    for record in &records {
        println!("  - {}", record.to_line());
    }

    let text = format_records(&records);
    assert_eq!(parse_records(&text).unwrap(), records);
}

#[test]
#[ignore] // Requires hardware
fn test_configured_port_is_listed() {
    let Some(config) = TestPortConfig::from_env() else {
        return;
    };

    let records = list_ports().expect("enumeration failed");
    let listed = records.iter().any(|r| r.name == config.port_name);
    assert!(listed, "{} missing from {:?}", config.port_name, records);
}
