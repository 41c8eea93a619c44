//! Lists the interfaces a user can scan.
//!
//! The collector runs in network mode against a scratch file of its own, so an
//! enumeration never touches the snapshot of a scan in progress. The resulting list
//! is never empty: when nothing qualifies, or the collector fails, it holds the
//! single [`ALL_INTERFACES`] entry.

use std::{
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use tokio::task::JoinHandle;

use crate::{
    action::{Action, ActionSender},
    config::ScanSettings,
    error::{EnumerationError, ScanError, ScanResult},
    runner::ProcessRunner,
    session::unique_id,
    snapshot::{extract, InterfaceRecord, Snapshot},
};

pub const ALL_INTERFACES: &str = "All Interfaces (Default)";

const DISPLAY_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum InterfaceChoice {
    Named {
        name: String,
        ipv4: Option<String>,
    },
    #[default]
    AllInterfaces,
}

impl InterfaceChoice {
    pub fn from_record(record: &InterfaceRecord) -> Self {
        InterfaceChoice::Named {
            name: record.name.clone(),
            ipv4: record.ipv4().map(str::to_string),
        }
    }

    /// Interface name, or the sentinel text.
    pub fn name(&self) -> &str {
        match self {
            InterfaceChoice::Named { name, .. } => name,
            InterfaceChoice::AllInterfaces => ALL_INTERFACES,
        }
    }
}

impl fmt::Display for InterfaceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceChoice::Named { name, ipv4: Some(ip) } => write!(f, "{}{}{}", name, DISPLAY_SEPARATOR, ip),
            InterfaceChoice::Named { name, ipv4: None } => f.write_str(name),
            InterfaceChoice::AllInterfaces => f.write_str(ALL_INTERFACES),
        }
    }
}

impl FromStr for InterfaceChoice {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == ALL_INTERFACES {
            return Ok(InterfaceChoice::AllInterfaces);
        }
        let choice = match s.split_once(DISPLAY_SEPARATOR) {
            Some((name, ip)) => InterfaceChoice::Named {
                name: name.trim().to_string(),
                ipv4: Some(ip.trim().to_string()).filter(|ip| !ip.is_empty()),
            },
            None => InterfaceChoice::Named {
                name: s.to_string(),
                ipv4: None,
            },
        };
        Ok(choice)
    }
}

/// Result of one enumeration. `choices` is never empty.
#[derive(Debug)]
pub struct InterfaceListing {
    pub choices: Vec<InterfaceChoice>,
    pub warning: Option<EnumerationError>,
}

impl InterfaceListing {
    pub fn display_strings(&self) -> Vec<String> {
        self.choices.iter().map(ToString::to_string).collect()
    }
}

/// Selectable interfaces in snapshot order, deduplicated, or the sentinel alone.
pub fn selectable(snapshot: &Snapshot) -> Vec<InterfaceChoice> {
    let choices: Vec<InterfaceChoice> = snapshot
        .interfaces()
        .iter()
        .filter(|record| record.is_selectable())
        .map(InterfaceChoice::from_record)
        .unique()
        .collect();
    if choices.is_empty() {
        vec![InterfaceChoice::AllInterfaces]
    } else {
        choices
    }
}

#[derive(Clone)]
pub struct InterfaceEnumerator {
    settings: ScanSettings,
    runner: ProcessRunner,
    action_tx: Option<ActionSender>,
}

impl InterfaceEnumerator {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            settings,
            runner: ProcessRunner::new(),
            action_tx: None,
        }
    }

    pub fn register_action_handler(&mut self, tx: ActionSender) {
        self.action_tx = Some(tx);
    }

    pub async fn list_interfaces(&self) -> InterfaceListing {
        let scratch = self.settings.snapshot_dir.join(format!("interfaces-{}.json", unique_id()));
        let collected = self.collect(&scratch).await;
        remove_scratch(&scratch).await;

        match collected {
            Ok(snapshot) => {
                let choices = selectable(&snapshot);
                log::info!("Enumerated {} interface choices", choices.len());
                InterfaceListing { choices, warning: None }
            }
            Err(e) => {
                let warning = EnumerationError::from(e);
                log::warn!("{}; falling back to {}", warning, ALL_INTERFACES);
                InterfaceListing {
                    choices: vec![InterfaceChoice::AllInterfaces],
                    warning: Some(warning),
                }
            }
        }
    }

    /// Enumerate on a separate task and report through the registered channel.
    pub fn spawn(&self) -> JoinHandle<()> {
        let enumerator = self.clone();
        tokio::spawn(async move {
            let listing = enumerator.list_interfaces().await;
            if let Some(tx) = &enumerator.action_tx {
                if tx.send(Action::InterfacesListed(listing)).is_err() {
                    log::debug!("Interface listing dropped: receiver closed");
                }
            }
        })
    }

    async fn collect(&self, scratch: &Path) -> ScanResult<Snapshot> {
        tokio::fs::create_dir_all(&self.settings.snapshot_dir).await?;
        let invocation = self
            .settings
            .collector
            .invocation(["-m".into(), "network".into(), "-o".into(), scratch.as_os_str().to_os_string()])
            .working_dir(self.settings.working_dir.clone());
        self.runner
            .run(&invocation, |line| log::debug!("collector: {}", line))
            .await?;

        let raw = tokio::fs::read_to_string(scratch)
            .await
            .map_err(|source| ScanError::SnapshotUnavailable {
                path: PathBuf::from(scratch),
                source,
            })?;
        Ok(extract(&raw, &self.settings.windows))
    }
}

async fn remove_scratch(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
    }
}
