//! Optical power extraction against captured transceiver output.

use anyhow::Result;
use lumeter::{parse, SignalStatus};

const HUAWEI_VERBOSE: &str = include_str!("fixtures/huawei_transceiver_verbose.txt");
const MIKROTIK_MONITOR: &str = include_str!("fixtures/mikrotik_monitor_sfp.txt");
const JUNIPER_OPTICS: &str = include_str!("fixtures/juniper_diagnostics_optics.txt");

#[test]
fn huawei_verbose_capture_classifies_weak() {
    let reading = parse::optical(
        HUAWEI_VERBOSE,
        "XGigabitEthernet0/0/1",
        "display transceiver interface XGigabitEthernet0/0/1 verbose",
    );
    assert!(reading.found);
    assert_eq!(reading.rx_power_dbm, Some(-21.35));
    assert_eq!(reading.tx_power_dbm, Some(-2.66));
    assert_eq!(reading.signal_status, SignalStatus::Weak);
    assert!(reading.command_used.starts_with("display transceiver"));
}

#[test]
fn mikrotik_monitor_capture_classifies_excellent() {
    let reading = parse::optical(
        MIKROTIK_MONITOR,
        "sfp-sfpplus1",
        "/interface ethernet monitor sfp-sfpplus1 once",
    );
    assert!(reading.found);
    assert_eq!(reading.rx_power_dbm, Some(-7.8));
    assert_eq!(reading.signal_status, SignalStatus::Excellent);
    assert_eq!(
        reading.rx_power_raw.as_deref(),
        Some("sfp-rx-power: -7.8dBm")
    );
}

#[test]
fn juniper_optics_capture_takes_dbm_side_of_dual_readout() {
    let reading = parse::optical(
        JUNIPER_OPTICS,
        "xe-0/0/0",
        "show interfaces diagnostics optics xe-0/0/0",
    );
    assert!(reading.found);
    assert_eq!(reading.rx_power_dbm, Some(-15.0));
    assert_eq!(reading.tx_power_dbm, Some(-2.12));
    assert_eq!(reading.signal_status, SignalStatus::Fair);
}

#[test]
fn concatenated_attempts_still_parse() {
    // A rejected command's error text followed by a later command's real
    // output; the combined buffer must still yield the reading.
    let combined = format!("% Invalid input detected at '^' marker.\n\n{HUAWEI_VERBOSE}");
    let reading = parse::optical(&combined, "XGigabitEthernet0/0/1", "");
    assert!(reading.found);
    assert_eq!(reading.rx_power_dbm, Some(-21.35));
}

#[test]
fn readings_serialize_with_snake_case_status() -> Result<()> {
    let reading = parse::optical(HUAWEI_VERBOSE, "XGigabitEthernet0/0/1", "display transceiver");
    let json = serde_json::to_string(&reading)?;
    assert!(json.contains("\"signal_status\":\"weak\""));
    assert!(json.contains("\"found\":true"));
    Ok(())
}
