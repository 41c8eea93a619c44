//! Notifications flowing from the scan core back to its caller.
//!
//! Every enumeration and scan reports through exactly one channel of [`Action`]
//! values, so the caller can marshal updates onto whatever thread its presentation
//! layer requires. The channel is unbounded: streamed lines are never dropped.
//!
//! # Message Flow
//!
//! ```text
//! caller spawns a scan
//!     │
//!     ▼
//! PhaseChanged(CollectorRunning)
//! CollectorLine(..) × n            ◄── collector output, in order
//! PhaseChanged(CollectorDone)
//! SnapshotReady(path)              ◄── caller may extract now
//! PhaseChanged(EngineRunning)
//! EngineLine(..) × n               ◄── analyzer output, in order
//! PhaseChanged(EngineDone)
//! ScanComplete { interface }
//! ```
//!
//! Any failure ends the sequence with a single `ScanFailed`.

use std::path::PathBuf;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{enumerator::InterfaceListing, phase::ScanPhase};

#[derive(Debug)]
pub enum Action {
    /// Enumeration finished; the listing is never empty.
    InterfacesListed(InterfaceListing),

    /// The scan state machine moved.
    PhaseChanged(ScanPhase),
    /// One line of collector output.
    CollectorLine(String),
    /// One line of analyzer output.
    EngineLine(String),
    /// The collector's snapshot file exists and is readable.
    SnapshotReady(PathBuf),
    /// The pipeline completed for the named interface.
    ScanComplete { interface: String },
    /// Terminal failure; `kind` is a short stable label.
    ScanFailed { kind: &'static str, message: String },
}

pub type ActionSender = UnboundedSender<Action>;
pub type ActionReceiver = UnboundedReceiver<Action>;

/// A fresh notification channel for one session.
pub fn channel() -> (ActionSender, ActionReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
