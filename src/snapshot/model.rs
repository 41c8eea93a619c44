use crate::{enums::RiskLevel, error::ParseDegraded};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub name: String,
    pub ipv4: Option<String>,
    pub mac: Option<String>,
    pub is_up: bool,
    pub is_wireless: bool,
}

impl InterfaceRecord {
    /// Up and carrying a non-empty IPv4 address.
    pub fn is_selectable(&self) -> bool {
        self.is_up && self.ipv4().is_some()
    }

    /// IPv4 address, treating blank strings as absent.
    pub fn ipv4(&self) -> Option<&str> {
        non_blank(self.ipv4.as_deref())
    }

    pub fn mac(&self) -> Option<&str> {
        non_blank(self.mac.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskyPortFinding {
    pub port: u16,
    pub service: String,
    pub binding: String,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostureSummary {
    pub firewall_enabled: bool,
    pub active_interface_count: usize,
    pub risky_port_count: usize,
    pub suspicious_connection_count: usize,
}

/// Which extraction tier produced the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Valid JSON.
    #[default]
    Strict,
    /// JSON5 leniency (trailing commas, comments).
    Lenient,
    /// Truncated document closed off before parsing.
    Repaired,
    /// No tree could be built; bounded-window marker scanning.
    Scanned,
}

/// Immutable view of one collector run. Counts in the posture are derived at
/// construction and cannot drift from the records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    interfaces: Vec<InterfaceRecord>,
    risky_ports: Vec<RiskyPortFinding>,
    suspicious_connections: usize,
    posture: PostureSummary,
    parse_mode: ParseMode,
    degraded: Option<ParseDegraded>,
}

impl Snapshot {
    pub fn new(
        interfaces: Vec<InterfaceRecord>,
        risky_ports: Vec<RiskyPortFinding>,
        suspicious_connections: usize,
        firewall_enabled: bool,
    ) -> Self {
        let posture = PostureSummary {
            firewall_enabled,
            active_interface_count: interfaces.iter().filter(|i| i.is_up).count(),
            risky_port_count: risky_ports.len(),
            suspicious_connection_count: suspicious_connections,
        };
        Self {
            interfaces,
            risky_ports,
            suspicious_connections,
            posture,
            parse_mode: ParseMode::default(),
            degraded: None,
        }
    }

    pub(crate) fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub(crate) fn with_degraded(mut self, degraded: Option<ParseDegraded>) -> Self {
        self.degraded = degraded;
        self
    }

    pub fn interfaces(&self) -> &[InterfaceRecord] {
        &self.interfaces
    }

    pub fn risky_ports(&self) -> &[RiskyPortFinding] {
        &self.risky_ports
    }

    pub fn suspicious_connections(&self) -> usize {
        self.suspicious_connections
    }

    pub fn posture(&self) -> &PostureSummary {
        &self.posture
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    pub fn degraded(&self) -> Option<&ParseDegraded> {
        self.degraded.as_ref()
    }

    pub fn wireless_interfaces(&self) -> impl Iterator<Item = &InterfaceRecord> {
        self.interfaces.iter().filter(|i| i.is_wireless)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn iface(name: &str, ipv4: Option<&str>, is_up: bool) -> InterfaceRecord {
        InterfaceRecord {
            name: name.to_string(),
            ipv4: ipv4.map(String::from),
            is_up,
            ..Default::default()
        }
    }

    #[test]
    fn selectable_needs_up_and_address() {
        assert!(iface("eth0", Some("10.0.0.2"), true).is_selectable());
        assert!(!iface("eth1", Some("10.0.0.3"), false).is_selectable());
        assert!(!iface("eth2", Some("  "), true).is_selectable());
        assert!(!iface("eth3", None, true).is_selectable());
    }

    #[test]
    fn posture_is_derived_from_records() {
        let snapshot = Snapshot::new(
            vec![iface("eth0", Some("10.0.0.2"), true), iface("lo", None, true), iface("wlan0", None, false)],
            vec![RiskyPortFinding {
                port: 23,
                service: "telnet".into(),
                binding: "0.0.0.0:23".into(),
                risk_level: RiskLevel::High,
            }],
            4,
            true,
        );
        assert_eq!(
            *snapshot.posture(),
            PostureSummary {
                firewall_enabled: true,
                active_interface_count: 2,
                risky_port_count: 1,
                suspicious_connection_count: 4,
            }
        );
    }
}
