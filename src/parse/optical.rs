//! Optical power extraction and signal classification.
//!
//! Vendors print transceiver diagnostics in wildly different shapes:
//! MikroTik key-value monitor output, Huawei `(dBm)`-suffixed tables,
//! Cisco prose, JunOS dual `mW / dBm` readouts. Extraction walks an
//! ordered pattern list per direction and takes the first hit; values
//! reported in milliwatts are converted to dBm.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{OpticalReading, SignalStatus};

fn power_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|src| match Regex::new(src) {
            Ok(re) => re,
            Err(err) => panic!("invalid optical power pattern: {err}"),
        })
        .collect()
}

/// Receive-power patterns, most specific dialect first. Each pattern
/// captures `val` and optionally `unit`.
static RX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    power_patterns(&[
        // MikroTik: "sfp-rx-power: -5.2dBm"
        r"(?i)sfp-rx-power\s*[:=]\s*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
        // Huawei: "RX Power(dBm)                      :-6.21"
        r"(?i)rx\s*power\s*\(dBm\)\s*[:=]?\s*(?P<val>-?\d+(?:\.\d+)?)",
        // JunOS: "Receiver signal average optical power : 0.5922 mW / -2.28 dBm"
        r"(?i)receiver signal average optical power\s*:\s*\d+(?:\.\d+)?\s*mW\s*/\s*(?P<val>-?\d+(?:\.\d+)?)\s*dBm",
        // Cisco IOS: "Receive Power: -5.40 dBm"
        r"(?i)receive\s*power\s*[:=]?\s*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
        // NX-OS tables and generic "Rx Power" lines.
        r"(?i)\brx\s*power\b[^-\d\r\n]*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
    ])
});

/// Transmit-power patterns, mirroring [`RX_PATTERNS`].
static TX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    power_patterns(&[
        r"(?i)sfp-tx-power\s*[:=]\s*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
        r"(?i)tx\s*power\s*\(dBm\)\s*[:=]?\s*(?P<val>-?\d+(?:\.\d+)?)",
        // JunOS: "Laser output power : 0.6130 mW / -2.12 dBm"
        r"(?i)laser output power\s*:\s*\d+(?:\.\d+)?\s*mW\s*/\s*(?P<val>-?\d+(?:\.\d+)?)\s*dBm",
        r"(?i)transmit\s*power\s*[:=]?\s*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
        r"(?i)\btx\s*power\b[^-\d\r\n]*(?P<val>-?\d+(?:\.\d+)?)\s*(?P<unit>dBm|mW)?",
    ])
});

/// Classifies received power into a link-health tier.
///
/// Thresholds are ordered and non-overlapping: above −8 dBm is excellent,
/// −14 to −8 good, −20 to −14 fair, −25 to −20 weak, and anything below
/// −25 critical.
pub fn classify_signal(rx_dbm: f64) -> SignalStatus {
    if rx_dbm > -8.0 {
        SignalStatus::Excellent
    } else if rx_dbm >= -14.0 {
        SignalStatus::Good
    } else if rx_dbm >= -20.0 {
        SignalStatus::Fair
    } else if rx_dbm >= -25.0 {
        SignalStatus::Weak
    } else {
        SignalStatus::Critical
    }
}

/// Runs the pattern list over `raw`; first match wins. Returns the matched
/// text and the value normalized to dBm.
fn extract(raw: &str, patterns: &[Regex]) -> Option<(String, f64)> {
    for pattern in patterns {
        let Some(caps) = pattern.captures(raw) else {
            continue;
        };
        let Some(value) = caps.name("val") else {
            continue;
        };
        let Ok(value) = value.as_str().parse::<f64>() else {
            continue;
        };

        let is_milliwatts = caps
            .name("unit")
            .map(|m| m.as_str().eq_ignore_ascii_case("mw"))
            .unwrap_or(false);
        let dbm = if is_milliwatts {
            if value <= 0.0 {
                // No light; nothing meaningful to report.
                continue;
            }
            10.0 * value.log10()
        } else {
            value
        };

        let matched = caps
            .get(0)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        return Some((matched, dbm));
    }
    None
}

/// Parses one command's output into an [`OpticalReading`].
pub(crate) fn parse(raw: &str, interface: &str, command: &str) -> OpticalReading {
    let rx = extract(raw, &RX_PATTERNS);
    let tx = extract(raw, &TX_PATTERNS);
    let found = rx.is_some() || tx.is_some();

    let signal_status = rx
        .as_ref()
        .map(|(_, dbm)| classify_signal(*dbm))
        .unwrap_or(SignalStatus::Unknown);

    OpticalReading {
        interface: interface.to_string(),
        rx_power_raw: rx.as_ref().map(|(text, _)| text.clone()),
        tx_power_raw: tx.as_ref().map(|(text, _)| text.clone()),
        rx_power_dbm: rx.map(|(_, dbm)| dbm),
        tx_power_dbm: tx.map(|(_, dbm)| dbm),
        signal_status,
        found,
        command_used: if found { command.to_string() } else { String::new() },
        raw_output: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_ordered_and_non_overlapping() {
        assert_eq!(classify_signal(-3.0), SignalStatus::Excellent);
        assert_eq!(classify_signal(-8.0), SignalStatus::Good);
        assert_eq!(classify_signal(-14.0), SignalStatus::Good);
        assert_eq!(classify_signal(-14.1), SignalStatus::Fair);
        assert_eq!(classify_signal(-20.0), SignalStatus::Fair);
        assert_eq!(classify_signal(-20.5), SignalStatus::Weak);
        assert_eq!(classify_signal(-25.0), SignalStatus::Weak);
        assert_eq!(classify_signal(-25.1), SignalStatus::Critical);
        assert_eq!(classify_signal(-40.0), SignalStatus::Critical);
    }

    #[test]
    fn mikrotik_monitor_output_parses() {
        let raw = "\
          name: sfp-sfpplus1
        status: link-ok
  sfp-rx-power: -5.2dBm
  sfp-tx-power: -2.1dBm
";
        let reading = parse(raw, "sfp-sfpplus1", "/interface ethernet monitor sfp-sfpplus1 once");
        assert!(reading.found);
        assert_eq!(reading.rx_power_dbm, Some(-5.2));
        assert_eq!(reading.tx_power_dbm, Some(-2.1));
        assert_eq!(reading.signal_status, SignalStatus::Excellent);
        assert!(!reading.command_used.is_empty());
    }

    #[test]
    fn huawei_dbm_table_parses() {
        let raw = "\
 Transceiver Diagnostic Information:
   RX Power(dBm)                      :-16.21
   TX Power(dBm)                      :-2.66
";
        let reading = parse(raw, "XGigabitEthernet0/0/1", "display transceiver");
        assert!(reading.found);
        assert_eq!(reading.rx_power_dbm, Some(-16.21));
        assert_eq!(reading.signal_status, SignalStatus::Fair);
    }

    #[test]
    fn junos_dual_unit_line_takes_the_dbm_value() {
        let raw = "\
    Laser output power                        :  0.6130 mW / -2.12 dBm
    Receiver signal average optical power     :  0.5922 mW / -2.28 dBm
";
        let reading = parse(raw, "xe-0/0/0", "show interfaces diagnostics optics xe-0/0/0");
        assert_eq!(reading.rx_power_dbm, Some(-2.28));
        assert_eq!(reading.tx_power_dbm, Some(-2.12));
    }

    #[test]
    fn milliwatt_values_convert_to_dbm() {
        let raw = "Rx Power: 0.5 mW\nTx Power: 1.0 mW\n";
        let reading = parse(raw, "eth0", "show transceiver");
        let rx = reading.rx_power_dbm.unwrap();
        assert!((rx - (-3.0103)).abs() < 0.001);
        assert_eq!(reading.tx_power_dbm, Some(0.0));
    }

    #[test]
    fn unrecognized_output_reports_not_found() {
        let reading = parse("% Invalid input detected\n", "Gi0/1", "show foo");
        assert!(!reading.found);
        assert_eq!(reading.signal_status, SignalStatus::Unknown);
        assert!(reading.command_used.is_empty());
        assert!(reading.raw_output.contains("Invalid input"));
    }
}
