//! Canonical data model for sessions, interfaces, and optical readings.
//!
//! Every vendor parser in [`crate::parse`] normalizes into these types, so
//! callers never see vendor-specific CLI text except in the free-form
//! `flags` and `raw_output` fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport protocol used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ssh,
    Telnet,
}

impl Protocol {
    /// Well-known port for the protocol (22 for SSH, 23 for Telnet).
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }
}

/// Connection parameters for one device session.
///
/// Immutable once constructed; build with [`ConnectionConfig::new`] and the
/// `with_*` methods, then hand it to [`crate::Session::new`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    host: String,
    username: String,
    password: String,
    protocol: Protocol,
    port: Option<u16>,
    timeout: Duration,
    vendor: String,
    enable_password: Option<String>,
}

impl ConnectionConfig {
    /// Creates a config with the default port, a 15 second connect timeout,
    /// and no vendor tag (resolves to the generic profile).
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        protocol: Protocol,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            protocol,
            port: None,
            timeout: Duration::from_secs(15),
            vendor: String::new(),
            enable_password: None,
        }
    }

    /// Overrides the transport port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Overrides the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the free-text vendor tag.
    ///
    /// Matched case-insensitively by substring against the profile registry,
    /// so tags like `"cisco_nxos"` or `"MikroTik RB4011"` route correctly.
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Sets the enable/privileged-mode password.
    ///
    /// The session does not escalate on its own; callers that need
    /// privileged mode run the vendor's escalation command themselves
    /// (e.g. `execute("enable")` followed by this password) after
    /// connecting. The value is carried here so one config describes the
    /// device completely.
    pub fn with_enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(password.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Explicit port if one was set, otherwise the protocol default.
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(self.protocol.default_port())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn enable_password(&self) -> Option<&str> {
        self.enable_password.as_deref()
    }
}

/// Operational status of an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

/// One interface row normalized from vendor CLI output.
///
/// Rows keep the device's emission order; the parsers never re-sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Interface name as printed by the device (may be abbreviated).
    pub name: String,
    pub status: InterfaceStatus,
    /// Free-text description, empty when the device has none.
    pub description: String,
    /// Vendor-specific flag text (e.g. MikroTik `R`/`X`/`S` flags).
    pub flags: String,
    /// Canonical name when `name` is a known abbreviation
    /// (e.g. `Gi0/1` expands to `GigabitEthernet0/1`).
    pub full_name: Option<String>,
}

impl InterfaceRecord {
    /// Placeholder record for an interface that could not be found.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Link-health tier derived from received optical power.
///
/// `VeryWeak` is accepted on deserialization for compatibility with older
/// consumers but is never produced by [`crate::parse::classify_signal`];
/// readings below the weak floor classify as `Critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Excellent,
    Good,
    Fair,
    Weak,
    VeryWeak,
    Critical,
    #[default]
    Unknown,
}

/// Optical transceiver reading for one interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalReading {
    pub interface: String,
    /// Text matched for the receive power, exactly as the device printed it.
    pub rx_power_raw: Option<String>,
    /// Text matched for the transmit power.
    pub tx_power_raw: Option<String>,
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub signal_status: SignalStatus,
    /// Whether any power value was extracted.
    pub found: bool,
    /// Command whose output produced this reading, empty when none did.
    pub command_used: String,
    /// Output the reading was parsed from; on a miss this carries every
    /// attempted command's output so operators can inspect what came back.
    pub raw_output: String,
}

impl OpticalReading {
    /// Reading for an interface where no candidate command produced data.
    pub fn not_found(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_follows_protocol() {
        let ssh = ConnectionConfig::new("10.0.0.1", "admin", "pw", Protocol::Ssh);
        assert_eq!(ssh.resolved_port(), 22);

        let telnet = ConnectionConfig::new("10.0.0.1", "admin", "pw", Protocol::Telnet);
        assert_eq!(telnet.resolved_port(), 23);
    }

    #[test]
    fn explicit_port_overrides_protocol_default() {
        let config =
            ConnectionConfig::new("10.0.0.1", "admin", "pw", Protocol::Ssh).with_port(2222);
        assert_eq!(config.resolved_port(), 2222);
    }

    #[test]
    fn status_enums_serialize_lowercase() {
        let up = serde_json::to_string(&InterfaceStatus::Up).unwrap();
        assert_eq!(up, "\"up\"");

        let very_weak = serde_json::to_string(&SignalStatus::VeryWeak).unwrap();
        assert_eq!(very_weak, "\"very_weak\"");
    }

    #[test]
    fn very_weak_still_deserializes() {
        let status: SignalStatus = serde_json::from_str("\"very_weak\"").unwrap();
        assert_eq!(status, SignalStatus::VeryWeak);
    }
}
