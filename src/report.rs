//! Turns a [`Snapshot`] into the eight report sections the front end renders.
//!
//! Every section is always present and never empty: absent data renders a
//! placeholder line, so a caller can build a fixed tab set from any scan.

use std::fmt::Write;

use strum::IntoEnumIterator;

use crate::{enums::RiskLevel, enums::SectionKind, snapshot::Snapshot};

/// Overview warns once suspicious connections exceed this count.
const CONNECTION_WARNING_THRESHOLD: usize = 5;

/// Findings raise a MEDIUM entry once suspicious connections exceed this count.
const CONNECTION_FINDING_THRESHOLD: usize = 10;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub body: String,
}

impl ReportSection {
    pub fn title(&self) -> String {
        self.kind.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        // Sections are built from SectionKind::iter(), so the index is the discriminant.
        &self.sections[kind as usize]
    }
}

/// A synthetic, severity-ranked statement derived from the posture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: RiskLevel,
    pub title: String,
    pub remediation: &'static str,
}

/// Render all eight sections. `raw_output` is the streamed process output, passed
/// through untouched into the Raw section.
pub fn categorize(snapshot: &Snapshot, raw_output: &str) -> Report {
    let sections = SectionKind::iter()
        .map(|kind| {
            let body = match kind {
                SectionKind::Overview => overview(snapshot),
                SectionKind::Interfaces => interfaces(snapshot),
                SectionKind::Ports => ports(snapshot),
                SectionKind::Services => services(),
                SectionKind::Wifi => wifi(snapshot),
                SectionKind::Connections => connections(snapshot),
                SectionKind::Findings => findings_section(snapshot),
                SectionKind::Raw => raw(raw_output),
            };
            ReportSection { kind, body }
        })
        .collect();
    Report { sections }
}

fn overview(snapshot: &Snapshot) -> String {
    let posture = snapshot.posture();
    let mut out = String::from("=== SECURITY OVERVIEW ===\n\n");
    let _ = writeln!(out, "Active Interfaces: {}", posture.active_interface_count);
    let _ = writeln!(out, "Open Ports: {}", posture.risky_port_count);
    let _ = writeln!(out, "Suspicious Connections: {}", posture.suspicious_connection_count);

    if posture.firewall_enabled {
        out.push_str("Firewall: ENABLED\n");
    } else {
        out.push_str("Firewall: DISABLED\n");
        out.push_str("[!!] CRITICAL: Firewall is DISABLED\n");
    }
    if posture.risky_port_count > 0 {
        let _ = writeln!(out, "[!] {} risky ports detected", posture.risky_port_count);
    }
    if posture.suspicious_connection_count > CONNECTION_WARNING_THRESHOLD {
        let _ = writeln!(
            out,
            "[!] {} suspicious connections detected",
            posture.suspicious_connection_count
        );
    }
    if let Some(degraded) = snapshot.degraded() {
        let _ = writeln!(out, "\n[i] {}", degraded);
    }
    out
}

fn interfaces(snapshot: &Snapshot) -> String {
    if snapshot.interfaces().is_empty() {
        return "No interface data found\n".to_string();
    }
    let mut out = String::new();
    for iface in snapshot.interfaces() {
        let _ = writeln!(out, "Interface: {}", iface.name);
        let _ = writeln!(out, "  IP:     {}", iface.ipv4().unwrap_or(NOT_AVAILABLE));
        let _ = writeln!(out, "  MAC:    {}", iface.mac().unwrap_or(NOT_AVAILABLE));
        let _ = writeln!(out, "  Status: {}", if iface.is_up { "UP" } else { "DOWN" });
        let _ = writeln!(out, "  Type:   {}\n", if iface.is_wireless { "Wireless" } else { "Wired" });
    }
    out
}

fn ports(snapshot: &Snapshot) -> String {
    if snapshot.risky_ports().is_empty() {
        return "[OK] No risky ports found\n".to_string();
    }
    let mut out = String::new();
    for finding in snapshot.risky_ports() {
        let service = if finding.service.is_empty() { NOT_AVAILABLE } else { &finding.service };
        let binding = if finding.binding.is_empty() { NOT_AVAILABLE } else { &finding.binding };
        let _ = writeln!(out, "{} Port {}", finding.risk_level.tag(), finding.port);
        let _ = writeln!(out, "  Service: {}", service);
        let _ = writeln!(out, "  Binding: {}", binding);
        let _ = writeln!(out, "  Risk:    {}\n", finding.risk_level);
    }
    out
}

fn services() -> String {
    "Service enumeration is not available yet\n".to_string()
}

fn wifi(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for iface in snapshot.wireless_interfaces() {
        let _ = writeln!(out, "WiFi Interface: {}", iface.name);
        let _ = writeln!(out, "  IP: {}\n", iface.ipv4().unwrap_or(NOT_AVAILABLE));
    }
    if out.is_empty() {
        out.push_str("No active WiFi interfaces\n");
    }
    out
}

fn connections(snapshot: &Snapshot) -> String {
    let count = snapshot.suspicious_connections();
    let mut out = String::new();
    let _ = writeln!(out, "Suspicious Connections: {}", count);
    if count > 0 {
        let _ = writeln!(out, "[!] {} suspicious connections require review", count);
    } else {
        out.push_str("[OK] No suspicious connections detected\n");
    }
    out
}

/// Findings derived from the posture, most severe first.
pub fn findings(snapshot: &Snapshot) -> Vec<Finding> {
    let posture = snapshot.posture();
    let mut findings = Vec::new();

    if !posture.firewall_enabled {
        findings.push(Finding {
            severity: RiskLevel::Critical,
            title: "Firewall is disabled".to_string(),
            remediation: "Enable the host firewall and default-deny inbound traffic",
        });
    }
    if posture.risky_port_count > 0 {
        findings.push(Finding {
            severity: RiskLevel::High,
            title: format!("{} risky ports exposed", posture.risky_port_count),
            remediation: "Close unused services or restrict them to trusted addresses",
        });
    }
    if posture.suspicious_connection_count > CONNECTION_FINDING_THRESHOLD {
        findings.push(Finding {
            severity: RiskLevel::Medium,
            title: format!("{} suspicious connections", posture.suspicious_connection_count),
            remediation: "Identify the owning processes and block unknown remote endpoints",
        });
    }
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    findings
}

fn findings_section(snapshot: &Snapshot) -> String {
    let findings = findings(snapshot);
    if findings.is_empty() {
        return "[OK] No security findings\n".to_string();
    }
    let mut out = String::new();
    for finding in findings {
        let _ = writeln!(out, "{} {}: {}", finding.severity.tag(), finding.severity, finding.title);
        let _ = writeln!(out, "  Fix: {}\n", finding.remediation);
    }
    out
}

fn raw(raw_output: &str) -> String {
    if raw_output.is_empty() {
        "No process output captured\n".to_string()
    } else {
        raw_output.to_string()
    }
}
