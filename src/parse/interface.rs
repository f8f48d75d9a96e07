//! Interface-listing parsers.
//!
//! Three dialect families are handled: a token-based generic parser that
//! covers most `show ... brief`/`description` layouts, a column-positional
//! parser for Cisco NX-OS `show interface status` (whose description field
//! contains spaces and cannot be tokenized), and a numbered-row parser for
//! MikroTik `/interface print`.

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{InterfaceRecord, InterfaceStatus};

/// Column-header keywords that mark a line as a header, not a row.
const HEADER_KEYWORDS: &[&str] = &[
    "interface",
    "port",
    "status",
    "protocol",
    "description",
    "method",
    "ip-address",
];

/// Abbreviation table. Matching is exact on the alphabetic prefix, so
/// organic names like MikroTik's `ether1` are left untouched.
const NAME_EXPANSIONS: &[(&str, &str)] = &[
    ("twe", "TwentyFiveGigE"),
    ("two", "TwoGigabitEthernet"),
    ("eth", "Ethernet"),
    ("te", "TenGigabitEthernet"),
    ("hu", "HundredGigE"),
    ("fo", "FortyGigE"),
    ("fa", "FastEthernet"),
    ("gi", "GigabitEthernet"),
    ("et", "Ethernet"),
    ("po", "Port-channel"),
    ("vl", "Vlan"),
    ("lo", "Loopback"),
    ("tu", "Tunnel"),
    ("se", "Serial"),
    ("mg", "mgmt"),
];

/// Expands an abbreviated interface name (`Gi0/1`) to its canonical form
/// (`GigabitEthernet0/1`). Returns `None` when the name is already
/// canonical or the prefix is not recognized.
pub fn expand_interface_name(name: &str) -> Option<String> {
    let split = name
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(name.len());
    let (alpha, rest) = name.split_at(split);
    if alpha.len() < 2 {
        return None;
    }

    let lower = alpha.to_ascii_lowercase();
    for (abbr, full) in NAME_EXPANSIONS {
        if full.eq_ignore_ascii_case(alpha) {
            return None;
        }
        if lower == *abbr {
            return Some(format!("{full}{rest}"));
        }
    }
    None
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3
        && trimmed
            .chars()
            .all(|c| c == '-' || c == '=' || c.is_whitespace())
}

fn is_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    !first.chars().any(|c| c.is_ascii_digit())
        && HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Generic token-based parser covering most brief/description layouts.
pub(crate) fn parse_generic(raw: &str) -> Vec<InterfaceRecord> {
    let mut records = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() || is_separator(line) || is_header(line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };
        // An interface row starts with something like Gi0/1, ether1, xe-0/0/0.
        if !first.chars().any(|c| c.is_ascii_digit()) && !first.contains('/') {
            continue;
        }

        let mut status = InterfaceStatus::Unknown;
        let mut last_status_idx = None;
        for (idx, token) in tokens.iter().enumerate() {
            let lower = token.to_ascii_lowercase();
            if lower == "up" || lower == "down" {
                // Any "down" token wins: "up down" means protocol down.
                if lower == "down" || status == InterfaceStatus::Unknown {
                    status = if lower == "down" {
                        InterfaceStatus::Down
                    } else {
                        InterfaceStatus::Up
                    };
                }
                last_status_idx = Some(idx);
            }
        }

        let description = last_status_idx
            .map(|idx| tokens[idx + 1..].join(" "))
            .unwrap_or_default();

        let name = (*first).to_string();
        let full_name = expand_interface_name(&name);
        records.push(InterfaceRecord {
            name,
            status,
            description,
            flags: String::new(),
            full_name,
        });
    }

    trace!("generic parser produced {} records", records.len());
    records
}

/// Character offsets of the NX-OS `show interface status` columns.
struct StatusColumns {
    name: usize,
    status: usize,
    vlan: usize,
    duplex: usize,
}

fn find_status_columns(line: &str) -> Option<StatusColumns> {
    let lower = line.to_ascii_lowercase();
    if !lower.contains("port") || !lower.contains("status") {
        return None;
    }
    Some(StatusColumns {
        name: lower.find("name")?,
        status: lower.find("status")?,
        vlan: lower.find("vlan").unwrap_or(line.len()),
        duplex: lower.find("duplex").unwrap_or(line.len()),
    })
}

fn column_slice(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

/// NX-OS status keywords that mean the link is down.
const NXOS_DOWN_KEYWORDS: &[&str] = &[
    "notconnect",
    "notconnec",
    "disabled",
    "err-disabled",
    "sfpabsent",
    "xcvrabsen",
    "suspended",
    "down",
];

fn classify_nxos_status(text: &str) -> InterfaceStatus {
    let lower = text.to_ascii_lowercase();
    if lower.contains("connected") && !lower.contains("notconnect") {
        return InterfaceStatus::Up;
    }
    if NXOS_DOWN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return InterfaceStatus::Down;
    }
    InterfaceStatus::Unknown
}

/// Cisco NX-OS column-positional parser.
///
/// `show interface status` aligns fields by column, and the Name field
/// holds free text with internal spaces, so fields are sliced by the
/// header's character offsets instead of tokenized. Without a header the
/// parser falls back to a keyword-position heuristic.
pub(crate) fn parse_nxos(raw: &str) -> Vec<InterfaceRecord> {
    let mut records = Vec::new();
    let mut columns: Option<StatusColumns> = None;

    for line in raw.lines() {
        if line.trim().is_empty() || is_separator(line) {
            continue;
        }

        if columns.is_none() {
            if let Some(found) = find_status_columns(line) {
                columns = Some(found);
                continue;
            }
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };
        if !first.chars().any(|c| c.is_ascii_digit()) && !first.contains('/') {
            continue;
        }
        let name = (*first).to_string();

        let (description, status) = match &columns {
            Some(cols) => {
                let description = column_slice(line, cols.name, cols.status).trim().to_string();
                let status_text = column_slice(line, cols.status, cols.vlan.min(cols.duplex));
                (description, classify_nxos_status(status_text))
            }
            None => keyword_position_fallback(line, &name),
        };

        let full_name = expand_interface_name(&name);
        records.push(InterfaceRecord {
            name,
            status,
            description,
            flags: String::new(),
            full_name,
        });
    }

    records
}

/// Headerless fallback: locate the first status keyword and treat the text
/// between the interface name and that keyword as the description.
fn keyword_position_fallback(line: &str, name: &str) -> (String, InterfaceStatus) {
    let lower = line.to_ascii_lowercase();
    let mut earliest: Option<(usize, &str)> = None;

    for keyword in ["connected"].iter().chain(NXOS_DOWN_KEYWORDS) {
        if let Some(pos) = lower.find(keyword) {
            if earliest.map(|(p, _)| pos < p).unwrap_or(true) {
                earliest = Some((pos, keyword));
            }
        }
    }

    match earliest {
        Some((pos, keyword)) => {
            let after_name = line.find(name).map(|p| p + name.len()).unwrap_or(0);
            let description = column_slice(line, after_name, pos).trim().to_string();
            (description, classify_nxos_status(keyword))
        }
        None => (String::new(), InterfaceStatus::Unknown),
    }
}

static MIKROTIK_ROW: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^\s*(\d+)\s+(\S.*)$") {
    Ok(re) => re,
    Err(err) => panic!("invalid MikroTik row regex: {err}"),
});

/// Characters RouterOS uses in the flags column of `/interface print`.
const MIKROTIK_FLAG_CHARS: &str = "DRSXIP";

/// MikroTik numbered-row parser.
///
/// Handles the `Flags:` legend, `;;;` comment lines (which RouterOS prints
/// above the row they describe), and the compact flags column between the
/// row index and the interface name.
pub(crate) fn parse_mikrotik(raw: &str) -> Vec<InterfaceRecord> {
    let mut records = Vec::new();
    let mut pending_comment: Option<String> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_separator(line) {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix(";;;") {
            pending_comment = Some(comment.trim().to_string());
            continue;
        }

        let Some(caps) = MIKROTIK_ROW.captures(line) else {
            continue;
        };
        let rest = match caps.get(2) {
            Some(m) => m.as_str(),
            None => continue,
        };

        let mut flags = String::new();
        let mut name = String::new();
        for token in rest.split_whitespace() {
            let is_flag_token = token.len() <= 3
                && token.chars().all(|c| MIKROTIK_FLAG_CHARS.contains(c));
            if name.is_empty() && is_flag_token {
                flags.push_str(token);
            } else if name.is_empty() {
                name = token.to_string();
            } else {
                break;
            }
        }
        if name.is_empty() {
            continue;
        }

        // X (disabled) beats R (running); a row with neither is present
        // but not running.
        let status = if flags.contains('X') {
            InterfaceStatus::Down
        } else if flags.contains('R') {
            InterfaceStatus::Up
        } else {
            InterfaceStatus::Down
        };

        records.push(InterfaceRecord {
            name,
            status,
            description: pending_comment.take().unwrap_or_default(),
            flags,
            full_name: None,
        });
    }

    records
}
