//! Vendor CLI output parsing.
//!
//! One entry point per data shape: [`interfaces`] dispatches to the
//! vendor-specific interface parser (falling back to the generic one) and
//! [`optical`] extracts transceiver power from any supported dialect.
//! Parsers never error: unrecognizable input yields empty vectors or
//! `found = false` readings.

use crate::model::{InterfaceRecord, OpticalReading};
use crate::vendor::Vendor;

mod interface;
mod optical;

pub use interface::expand_interface_name;
pub use optical::classify_signal;

/// Parses an interface listing for the given vendor, preserving device
/// emission order.
pub fn interfaces(raw: &str, vendor: Vendor) -> Vec<InterfaceRecord> {
    match vendor {
        Vendor::MikroTik => interface::parse_mikrotik(raw),
        Vendor::CiscoNxos => interface::parse_nxos(raw),
        _ => interface::parse_generic(raw),
    }
}

/// Extracts the row count from a count-only interface query
/// (e.g. MikroTik `/interface print count-only`).
pub fn interface_count(raw: &str) -> Option<usize> {
    raw.split_whitespace().find_map(|token| token.parse().ok())
}

/// Parses optical power values out of one command's output.
pub fn optical(raw: &str, interface: &str, command: &str) -> OpticalReading {
    optical::parse(raw, interface, command)
}
