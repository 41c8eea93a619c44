//! Error taxonomy for the scan pipeline.
//!
//! Launch and snapshot-availability failures abort the current operation and are
//! reported once to the caller. Parse degradation is never an `Err`: it travels on the
//! [`Snapshot`](crate::snapshot::Snapshot) as a [`ParseDegraded`] value and the report
//! renders placeholders instead.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The executable could not be found or started.
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The collector finished but its snapshot file is missing or unreadable.
    #[error("snapshot unavailable at {}: {source}", path.display())]
    SnapshotUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Non-zero collector exit under the strict exit policy.
    #[error("collector exited with status {}", display_code(*code))]
    CollectorExit { code: Option<i32> },

    #[error("scan cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "unknown (terminated by signal)".to_string(),
    }
}

impl ScanError {
    /// Short stable label shown next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Launch { .. } => "LaunchError",
            ScanError::SnapshotUnavailable { .. } => "SnapshotUnavailable",
            ScanError::CollectorExit { .. } => "CollectorExit",
            ScanError::Cancelled => "Cancelled",
            ScanError::Io(_) => "IOError",
        }
    }
}

/// Enumeration failed, but the caller still gets the sentinel list.
#[derive(Debug, Error)]
#[error("interface enumeration degraded: {0}")]
pub struct EnumerationError(#[from] pub ScanError);

impl EnumerationError {
    pub fn kind(&self) -> &'static str {
        "EnumerationError"
    }
}

/// Extraction produced zero or partial records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("snapshot parse degraded: {reason}")]
pub struct ParseDegraded {
    pub reason: String,
}

impl ParseDegraded {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn kind(&self) -> &'static str {
        "ParseDegraded"
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
