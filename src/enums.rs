use serde::Deserialize;
use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

/// Risk level of a finding. Parsed case-insensitively, displayed upper-case.
#[derive(
    Default, Clone, Copy, Display, EnumString, EnumIter, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RiskLevel {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Lenient parse: anything unrecognized becomes `Info`.
    pub fn parse(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "[CRIT]",
            RiskLevel::High => "[HIGH]",
            RiskLevel::Medium => "[MED]",
            RiskLevel::Low => "[LOW]",
            RiskLevel::Info => "[i]",
        }
    }
}

/// Report sections, in the order they are always rendered.
#[derive(
    Default,
    Clone,
    Copy,
    Display,
    FromRepr,
    EnumIter,
    EnumCount,
    PartialEq,
    Eq,
    Hash,
    Debug,
    clap::ValueEnum,
)]
pub enum SectionKind {
    #[default]
    #[strum(to_string = "Overview")]
    Overview,
    #[strum(to_string = "Interfaces")]
    Interfaces,
    #[strum(to_string = "Open Ports")]
    Ports,
    #[strum(to_string = "Services")]
    Services,
    #[strum(to_string = "WiFi")]
    Wifi,
    #[strum(to_string = "Connections")]
    Connections,
    #[strum(to_string = "Findings")]
    Findings,
    #[strum(to_string = "Raw")]
    Raw,
}

/// What a non-zero collector exit means for the pipeline.
#[derive(Default, Clone, Copy, Display, PartialEq, Eq, Debug, Deserialize)]
pub enum ExitPolicy {
    /// Exit codes are observed and logged, never authoritative.
    #[default]
    Lenient,
    /// A non-zero collector exit aborts before the analyzer runs.
    Strict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn risk_tags_ignore_case() {
        for raw in ["critical", "CRITICAL", "Critical", " critical "] {
            assert_eq!(RiskLevel::parse(raw).tag(), "[CRIT]");
        }
        assert_eq!(RiskLevel::parse("High").tag(), "[HIGH]");
        assert_eq!(RiskLevel::parse("medium").tag(), "[MED]");
        assert_eq!(RiskLevel::parse("LOW").tag(), "[LOW]");
    }

    #[test]
    fn unknown_risk_maps_to_info() {
        assert_eq!(RiskLevel::parse("severe").tag(), "[i]");
        assert_eq!(RiskLevel::parse("").tag(), "[i]");
        assert_eq!(RiskLevel::parse("bogus"), RiskLevel::Info);
    }

    #[test]
    fn risk_levels_normalize_on_output() {
        assert_eq!(RiskLevel::parse("hIgH").to_string(), "HIGH");
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn sections_are_fixed() {
        let titles: Vec<String> = SectionKind::iter().map(|s| s.to_string()).collect();
        assert_eq!(
            titles,
            vec!["Overview", "Interfaces", "Open Ports", "Services", "WiFi", "Connections", "Findings", "Raw"]
        );
        assert_eq!(SectionKind::COUNT, 8);
        assert_eq!(SectionKind::from_repr(2), Some(SectionKind::Ports));
    }
}
