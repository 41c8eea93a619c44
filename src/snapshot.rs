//! Snapshot extraction.
//!
//! The collector and the analyzer are independent binaries, so the snapshot file may
//! arrive slightly malformed or cut off mid-write. Extraction therefore never fails:
//!
//! ```text
//! raw text ──► strict JSON ──► JSON5 ──► repaired JSON5 ──► typed records
//!                  │ all three failed
//!                  ▼
//!          bounded-window marker scan ──► typed records
//! ```
//!
//! Whatever tier succeeds, the result is a [`Snapshot`]. When records are missing the
//! snapshot carries a [`ParseDegraded`] note and the report renders placeholders.

use crate::error::ParseDegraded;

pub mod lenient;
pub mod model;
pub mod window;

pub use model::{InterfaceRecord, ParseMode, PostureSummary, RiskyPortFinding, Snapshot};

/// Default lookahead past an interface `"name"` marker.
pub const DEFAULT_INTERFACE_WINDOW: usize = 200;

/// Default lookahead past a finding `"type"` marker.
pub const DEFAULT_FINDING_WINDOW: usize = 1000;

/// Lookahead bounds for the positional scanner, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindows {
    pub interface: usize,
    pub finding: usize,
}

impl Default for ScanWindows {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE_WINDOW,
            finding: DEFAULT_FINDING_WINDOW,
        }
    }
}

/// Parse raw snapshot text into records. Never fails; see the module docs.
pub fn extract(raw: &str, windows: &ScanWindows) -> Snapshot {
    let (snapshot, mode) = match lenient::parse_tree(raw) {
        Some((tree, mode)) => {
            let (risky_ports, suspicious) = lenient::findings(&tree);
            let snapshot = Snapshot::new(
                lenient::interfaces(&tree),
                risky_ports,
                suspicious,
                lenient::firewall_enabled(&tree),
            );
            (snapshot, mode)
        }
        None => {
            let snapshot = Snapshot::new(
                window::interfaces(raw, windows),
                window::risky_ports(raw, windows),
                window::suspicious_connections(raw),
                window::firewall_enabled(raw),
            );
            (snapshot, ParseMode::Scanned)
        }
    };

    let degraded = degradation(raw, &snapshot, mode);
    if let Some(ref d) = degraded {
        log::warn!("{} (mode: {:?})", d, mode);
    } else {
        log::debug!(
            "Snapshot extracted: {} interfaces, {} risky ports, {} suspicious connections ({:?})",
            snapshot.interfaces().len(),
            snapshot.risky_ports().len(),
            snapshot.suspicious_connections(),
            mode
        );
    }
    snapshot.with_parse_mode(mode).with_degraded(degraded)
}

fn degradation(raw: &str, snapshot: &Snapshot, mode: ParseMode) -> Option<ParseDegraded> {
    if raw.trim().is_empty() {
        return Some(ParseDegraded::new("snapshot is empty"));
    }
    if snapshot.interfaces().is_empty() {
        return Some(ParseDegraded::new("no interface records found"));
    }
    match mode {
        ParseMode::Repaired => Some(ParseDegraded::new("snapshot was truncated; records may be partial")),
        ParseMode::Scanned => Some(ParseDegraded::new("snapshot is not well-formed; fields located by marker scan")),
        ParseMode::Strict | ParseMode::Lenient => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::RiskLevel;
    use pretty_assertions::assert_eq;

    const FULL: &str = include_str!("../tests/fixtures/snapshot_full.json");
    const TRUNCATED: &str = include_str!("../tests/fixtures/snapshot_truncated.txt");

    #[test]
    fn collector_snapshot_extracts_every_record() {
        let snapshot = extract(FULL, &ScanWindows::default());
        assert_eq!(snapshot.parse_mode(), ParseMode::Strict);
        assert_eq!(snapshot.degraded(), None);

        let names: Vec<&str> = snapshot.interfaces().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["lo", "eth0", "wlan0", "docker0"]);
        assert_eq!(snapshot.risky_ports().len(), 2);
        assert_eq!(snapshot.risky_ports()[0].port, 23);
        assert_eq!(snapshot.risky_ports()[1].risk_level, RiskLevel::Critical);
        assert_eq!(snapshot.suspicious_connections(), 3);
        assert_eq!(
            *snapshot.posture(),
            PostureSummary {
                firewall_enabled: true,
                active_interface_count: 3,
                risky_port_count: 2,
                suspicious_connection_count: 3,
            }
        );
    }

    #[test]
    fn unparsable_snapshot_falls_back_to_marker_scan() {
        let snapshot = extract(TRUNCATED, &ScanWindows::default());
        assert_eq!(snapshot.parse_mode(), ParseMode::Scanned);
        assert!(snapshot.degraded().is_some());
        assert_eq!(snapshot.interfaces().len(), 2);
        assert_eq!(snapshot.interfaces()[1].ipv4.as_deref(), Some("10.0.0.15"));
        assert_eq!(snapshot.risky_ports().len(), 1);
        assert!(!snapshot.posture().firewall_enabled);
    }

    #[test]
    fn banner_before_snapshot_does_not_change_records() {
        let body = r#"{"interfaces": [
            {"name": "eth0", "ipv4": "10.0.0.2", "mac": "00:11:22:33:44:55", "is_up": 1, "is_wireless": "true"},
            {"name": "eth1", "ipv4": "10.0.1.2", "is_up": "False", "is_wireless": 0}
        ], "firewall_enabled": "true"}"#;
        let clean = extract(body, &ScanWindows::default());
        let bannered = extract(&format!("collector banner\n{}", body), &ScanWindows::default());

        assert_eq!(clean.parse_mode(), ParseMode::Strict);
        assert_eq!(bannered.parse_mode(), ParseMode::Scanned);
        assert_eq!(bannered.interfaces(), clean.interfaces());
        assert_eq!(bannered.posture(), clean.posture());
        assert!(bannered.posture().firewall_enabled);
        assert!(bannered.interfaces()[0].is_selectable());
    }

    #[test]
    fn empty_snapshot_is_degraded_not_fatal() {
        let snapshot = extract("", &ScanWindows::default());
        assert!(snapshot.interfaces().is_empty());
        assert_eq!(snapshot.degraded().map(|d| d.reason.as_str()), Some("snapshot is empty"));
    }
}
