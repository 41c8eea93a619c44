use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    enumerator::{InterfaceChoice, ALL_INTERFACES},
    enums::SectionKind,
    utils::version,
};

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the interfaces that can be scanned
    Interfaces,
    /// Run the collector and the analyzer, then print the report
    Scan(ScanArgs),
    /// Print the report for an existing snapshot file without running anything
    Report {
        #[arg(value_name = "SNAPSHOT")]
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Interface as listed by `interfaces`, e.g. "eth0 - 10.0.0.2"
    #[arg(short, long, default_value = ALL_INTERFACES)]
    pub interface: InterfaceChoice,

    /// Only print these sections (repeatable); all eight by default
    #[arg(short, long = "section", value_enum, value_name = "SECTION")]
    pub sections: Vec<SectionKind>,

    /// Cancel the scan and kill the running tool after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not stream tool output while the scan runs
    #[arg(short, long)]
    pub quiet: bool,

    /// Strip ANSI escapes from streamed lines
    #[arg(long)]
    pub plain: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_defaults_to_all_interfaces() {
        let cli = Cli::try_parse_from(["hostscan", "scan"]).unwrap();
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.interface, InterfaceChoice::AllInterfaces);
                assert!(args.sections.is_empty());
                assert_eq!(args.timeout, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scan_flags_parse() {
        let cli = Cli::try_parse_from([
            "hostscan",
            "scan",
            "--interface",
            "eth0 - 10.0.0.2",
            "--section",
            "ports",
            "-s",
            "findings",
            "--timeout",
            "30",
            "--plain",
            "--config",
            "/etc/hostscan.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/hostscan.toml")));
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.interface.name(), "eth0");
        assert_eq!(args.sections, vec![SectionKind::Ports, SectionKind::Findings]);
        assert_eq!(args.timeout, Some(30));
        assert!(args.plain && !args.quiet);
    }

    #[test]
    fn report_requires_a_path() {
        assert!(Cli::try_parse_from(["hostscan", "report"]).is_err());
    }
}
