//! Vendor profile registry.
//!
//! A [`VendorProfile`] bundles everything tuned per device family: the
//! paging-disable command, ordered interface-list and optical-power command
//! candidates, prompt regexes, and a timeout profile. Profiles are built
//! once in `Lazy` statics and shared read-only across concurrent sessions.
//!
//! Resolution is a case-insensitive substring match of the caller's
//! free-text vendor tag against registry keys, first match wins, so
//! `"cisco_nxos"` routes to the NX-OS profile before the plain Cisco one
//! and unmatched tags fall back to a conservative generic profile.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Device families with dedicated command sets and parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    MikroTik,
    CiscoIos,
    CiscoNxos,
    Huawei,
    Juniper,
    Generic,
}

/// Timing knobs for the command read loop and connect sequence.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutProfile {
    /// Silence after the last byte that is treated as command completion.
    pub idle_timeout: Duration,
    /// Grace wait after connect before draining the login banner.
    pub initial_wait: Duration,
    /// Absolute ceiling on one command execution.
    pub hard_timeout: Duration,
    /// How long to wait for a shell prompt before assuming readiness.
    pub prompt_timeout: Duration,
    /// Pause between sending a command and the first read, compensating
    /// for device processing latency.
    pub command_wait: Duration,
}

/// Static per-vendor tuning shared by every session for that vendor.
pub struct VendorProfile {
    pub vendor: Vendor,
    pub display_name: &'static str,
    /// Command issued once after connect to turn off output paging.
    /// `None` when the vendor pages per-command (MikroTik) or not at all.
    pub disable_paging: Option<&'static str>,
    /// Interface-list commands, primary first; later entries are fallbacks
    /// tried when the earlier ones yield nothing parseable.
    pub interface_commands: &'static [&'static str],
    /// Optional count-only query used as a parsed-row sanity check.
    pub interface_count_command: Option<&'static str>,
    /// Optical-power command candidates; `{interface}` is substituted.
    pub optical_commands: &'static [&'static str],
    /// Raw prompt regexes, kept for diagnostics and Telnet expect waits.
    pub prompt_pattern_sources: &'static [&'static str],
    /// Compiled form of `prompt_pattern_sources`.
    pub prompt_patterns: RegexSet,
    pub timeouts: TimeoutProfile,
}

fn prompt_set(patterns: &[&str]) -> RegexSet {
    match RegexSet::new(patterns) {
        Ok(set) => set,
        Err(err) => panic!("invalid vendor prompt pattern: {err}"),
    }
}

const DEFAULT_TIMEOUTS: TimeoutProfile = TimeoutProfile {
    idle_timeout: Duration::from_secs(3),
    initial_wait: Duration::from_millis(1500),
    hard_timeout: Duration::from_secs(30),
    prompt_timeout: Duration::from_secs(10),
    command_wait: Duration::from_millis(500),
};

static MIKROTIK_PROMPTS: &[&str] = &[r"\[[^\[\]\r\n]+\] >\s*$", r"\[[^\[\]\r\n]+\]\s*$"];
static CISCO_PROMPTS: &[&str] = &[r"[\w.()/-]+[>#]\s*$"];
static HUAWEI_PROMPTS: &[&str] = &[r"<[\w.-]+>\s*$", r"\[[\w.~-]+\]\s*$"];
static JUNIPER_PROMPTS: &[&str] = &[r"[\w.@-]+[>#%]\s*$"];
static GENERIC_PROMPTS: &[&str] = &[r"[\w.()/-]+[>#\]]\s*$", r"<[\w.-]+>\s*$"];

static MIKROTIK: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::MikroTik,
    display_name: "MikroTik RouterOS",
    disable_paging: None,
    interface_commands: &["/interface print without-paging", "/interface print"],
    interface_count_command: Some("/interface print count-only"),
    optical_commands: &["/interface ethernet monitor {interface} once"],
    prompt_pattern_sources: MIKROTIK_PROMPTS,
    prompt_patterns: prompt_set(MIKROTIK_PROMPTS),
    timeouts: TimeoutProfile {
        idle_timeout: Duration::from_secs(2),
        command_wait: Duration::from_millis(300),
        ..DEFAULT_TIMEOUTS
    },
});

static CISCO_IOS: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::CiscoIos,
    display_name: "Cisco IOS",
    disable_paging: Some("terminal length 0"),
    interface_commands: &[
        "show ip interface brief",
        "show interfaces description",
        "show interfaces status",
    ],
    interface_count_command: None,
    optical_commands: &[
        "show interfaces {interface} transceiver",
        "show interfaces {interface} transceiver detail",
    ],
    prompt_pattern_sources: CISCO_PROMPTS,
    prompt_patterns: prompt_set(CISCO_PROMPTS),
    timeouts: DEFAULT_TIMEOUTS,
});

static CISCO_NXOS: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::CiscoNxos,
    display_name: "Cisco NX-OS",
    disable_paging: Some("terminal length 0"),
    interface_commands: &["show interface status", "show interface brief"],
    interface_count_command: None,
    optical_commands: &[
        "show interface {interface} transceiver details",
        "show interface {interface} transceiver",
    ],
    prompt_pattern_sources: CISCO_PROMPTS,
    prompt_patterns: prompt_set(CISCO_PROMPTS),
    timeouts: TimeoutProfile {
        // Nexus chassis can take a while to assemble transceiver tables.
        idle_timeout: Duration::from_secs(4),
        hard_timeout: Duration::from_secs(45),
        ..DEFAULT_TIMEOUTS
    },
});

static HUAWEI: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::Huawei,
    display_name: "Huawei VRP",
    disable_paging: Some("screen-length 0 temporary"),
    interface_commands: &["display interface brief", "display ip interface brief"],
    interface_count_command: None,
    optical_commands: &[
        "display transceiver interface {interface} verbose",
        "display transceiver diagnosis interface {interface}",
    ],
    prompt_pattern_sources: HUAWEI_PROMPTS,
    prompt_patterns: prompt_set(HUAWEI_PROMPTS),
    timeouts: TimeoutProfile {
        idle_timeout: Duration::from_secs(4),
        command_wait: Duration::from_millis(800),
        ..DEFAULT_TIMEOUTS
    },
});

static JUNIPER: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::Juniper,
    display_name: "Juniper JunOS",
    disable_paging: Some("set cli screen-length 0"),
    interface_commands: &["show interfaces terse", "show interfaces descriptions"],
    interface_count_command: None,
    optical_commands: &["show interfaces diagnostics optics {interface}"],
    prompt_pattern_sources: JUNIPER_PROMPTS,
    prompt_patterns: prompt_set(JUNIPER_PROMPTS),
    timeouts: DEFAULT_TIMEOUTS,
});

static GENERIC: Lazy<VendorProfile> = Lazy::new(|| VendorProfile {
    vendor: Vendor::Generic,
    display_name: "Generic",
    disable_paging: Some("terminal length 0"),
    interface_commands: &[
        "show interfaces description",
        "show interface brief",
        "show ip interface brief",
        "display interface brief",
    ],
    interface_count_command: None,
    optical_commands: &[
        "show interfaces {interface} transceiver",
        "display transceiver interface {interface}",
    ],
    prompt_pattern_sources: GENERIC_PROMPTS,
    prompt_patterns: prompt_set(GENERIC_PROMPTS),
    timeouts: TimeoutProfile {
        // Conservative: unknown gear gets longer silence thresholds.
        idle_timeout: Duration::from_secs(4),
        hard_timeout: Duration::from_secs(45),
        ..DEFAULT_TIMEOUTS
    },
});

/// Registry keys in match order. More specific keys come first so
/// `"cisco_nxos"` hits the NX-OS entry before the generic `"cisco"` one.
static REGISTRY: Lazy<Vec<(&'static str, &'static Lazy<VendorProfile>)>> = Lazy::new(|| {
    vec![
        ("mikrotik", &MIKROTIK),
        ("routeros", &MIKROTIK),
        ("nxos", &CISCO_NXOS),
        ("nx-os", &CISCO_NXOS),
        ("nexus", &CISCO_NXOS),
        ("cisco", &CISCO_IOS),
        ("ios", &CISCO_IOS),
        ("huawei", &HUAWEI),
        ("vrp", &HUAWEI),
        ("juniper", &JUNIPER),
        ("junos", &JUNIPER),
    ]
});

/// Resolves a free-text vendor tag to a profile.
///
/// Pure and deterministic: the same tag always yields the same shared
/// profile instance. Unmatched tags resolve to the generic profile.
pub fn resolve(vendor_tag: &str) -> &'static VendorProfile {
    let needle = vendor_tag.to_ascii_lowercase();
    for &(key, profile) in REGISTRY.iter() {
        if needle.contains(key) {
            return profile;
        }
    }
    &GENERIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_is_case_insensitive() {
        assert_eq!(resolve("MikroTik RB4011").vendor, Vendor::MikroTik);
        assert_eq!(resolve("ROUTEROS v7").vendor, Vendor::MikroTik);
    }

    #[test]
    fn nxos_routes_before_plain_cisco() {
        assert_eq!(resolve("cisco_nxos").vendor, Vendor::CiscoNxos);
        assert_eq!(resolve("cisco_ios").vendor, Vendor::CiscoIos);
        assert_eq!(resolve("Cisco Nexus 9300").vendor, Vendor::CiscoNxos);
    }

    #[test]
    fn unmatched_tag_falls_back_to_generic() {
        assert_eq!(resolve("").vendor, Vendor::Generic);
        assert_eq!(resolve("some-unknown-box").vendor, Vendor::Generic);
    }

    #[test]
    fn resolve_returns_the_same_instance_across_calls() {
        let a = resolve("huawei") as *const VendorProfile;
        let b = resolve("Huawei VRP S5720") as *const VendorProfile;
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn prompt_patterns_match_representative_prompts() {
        assert!(resolve("mikrotik")
            .prompt_patterns
            .is_match("[admin@MikroTik] > "));
        assert!(resolve("cisco").prompt_patterns.is_match("core-sw1#"));
        assert!(resolve("huawei").prompt_patterns.is_match("<HUAWEI>"));
        assert!(resolve("juniper").prompt_patterns.is_match("admin@mx1> "));
    }
}
