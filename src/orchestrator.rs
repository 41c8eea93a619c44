//! The two-stage scan pipeline: the collector writes a snapshot, the analyzer reads it.
//!
//! ```text
//! Idle ─► CollectorRunning ─► CollectorDone ─► EngineRunning ─► EngineDone
//!               │                   │                │
//!               └───────────────────┴────────────────┴──► Error
//! ```
//!
//! Collector lines are all delivered before the first analyzer line. A non-zero
//! collector exit proceeds under [`ExitPolicy::Lenient`]; a missing snapshot always
//! stops the scan before the analyzer is invoked.

use std::{ffi::OsString, io, path::Path};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    action::{Action, ActionSender},
    config::ScanSettings,
    enumerator::InterfaceChoice,
    enums::ExitPolicy,
    error::{ScanError, ScanResult},
    phase::ScanPhase,
    runner::{ExitOutcome, ProcessRunner},
    session::ScanSession,
};

/// What a finished scan hands back.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub session: ScanSession,
    pub collector_exit: ExitOutcome,
    pub engine_exit: ExitOutcome,
    /// Collector lines then analyzer lines, newline-terminated, as streamed.
    pub raw_output: String,
}

/// A scan running on its own task.
pub struct ScanTask {
    handle: JoinHandle<ScanResult<ScanOutcome>>,
    cancel: CancellationToken,
}

impl ScanTask {
    /// Kill whichever child is running; the task then ends with [`ScanError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn join(self) -> ScanResult<ScanOutcome> {
        self.handle
            .await
            .map_err(|e| ScanError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    settings: ScanSettings,
    runner: ProcessRunner,
    action_tx: Option<ActionSender>,
}

impl ScanOrchestrator {
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

    pub fn spawn_scan(&self, interface: InterfaceChoice) -> ScanTask {
        let orchestrator = self.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { orchestrator.run_scan(interface, &token).await });
        ScanTask { handle, cancel }
    }

    /// Run the whole pipeline on the current task. Ends with exactly one
    /// `ScanComplete` or `ScanFailed` on the channel.
    #[tracing::instrument(skip_all, fields(interface = %interface))]
    pub async fn run_scan(&self, interface: InterfaceChoice, cancel: &CancellationToken) -> ScanResult<ScanOutcome> {
        let mut session = ScanSession::new(interface, &self.settings.snapshot_dir);
        log::info!(
            "Scan {} started on {} (snapshot {})",
            session.id(),
            session.interface(),
            session.snapshot_path().display()
        );

        let mut phase = ScanPhase::Idle;
        let result = self.pipeline(&session, &mut phase, cancel).await;
        session.finish();

        match result {
            Ok((collector_exit, engine_exit, raw_output)) => {
                log::info!("Scan {} finished in {:?}", session.id(), session.elapsed());
                self.notify(Action::ScanComplete {
                    interface: session.interface().name().to_string(),
                });
                Ok(ScanOutcome {
                    session,
                    collector_exit,
                    engine_exit,
                    raw_output,
                })
            }
            Err(e) => {
                if phase.can_transition(ScanPhase::Error) {
                    self.advance(&mut phase, ScanPhase::Error);
                }
                log::error!("Scan {} failed: {}", session.id(), e);
                self.notify(Action::ScanFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn pipeline(
        &self,
        session: &ScanSession,
        phase: &mut ScanPhase,
        cancel: &CancellationToken,
    ) -> ScanResult<(ExitOutcome, ExitOutcome, String)> {
        let snapshot_path = session.snapshot_path();
        let mut raw_output = String::new();

        self.advance(phase, ScanPhase::CollectorRunning);
        tokio::fs::create_dir_all(&self.settings.snapshot_dir).await?;
        let collector = self
            .settings
            .collector
            .invocation(collector_args(snapshot_path, self.settings.verbose))
            .working_dir(self.settings.working_dir.clone());
        let collector_exit = self
            .runner
            .spawn(&collector)?
            .stream_to(cancel, |line| {
                raw_output.push_str(&line);
                raw_output.push('\n');
                self.notify(Action::CollectorLine(line));
            })
            .await?;
        self.advance(phase, ScanPhase::CollectorDone);

        if self.settings.exit_policy == ExitPolicy::Strict && !collector_exit.success() {
            return Err(ScanError::CollectorExit {
                code: collector_exit.code,
            });
        }

        tokio::fs::File::open(snapshot_path)
            .await
            .map_err(|source| ScanError::SnapshotUnavailable {
                path: snapshot_path.to_path_buf(),
                source,
            })?;
        self.notify(Action::SnapshotReady(snapshot_path.to_path_buf()));

        self.advance(phase, ScanPhase::EngineRunning);
        let analyzer = self
            .settings
            .analyzer
            .invocation([snapshot_path.as_os_str()])
            .working_dir(self.settings.working_dir.clone());
        let engine_exit = self
            .runner
            .spawn(&analyzer)?
            .stream_to(cancel, |line| {
                raw_output.push_str(&line);
                raw_output.push('\n');
                self.notify(Action::EngineLine(line));
            })
            .await?;
        self.advance(phase, ScanPhase::EngineDone);

        Ok((collector_exit, engine_exit, raw_output))
    }

    fn advance(&self, phase: &mut ScanPhase, next: ScanPhase) {
        if !phase.can_transition(next) {
            log::error!("Illegal scan phase transition {} -> {}", phase, next);
        }
        log::info!("Scan phase {} -> {}", phase, next);
        *phase = next;
        self.notify(Action::PhaseChanged(next));
    }

    fn notify(&self, action: Action) {
        if let Some(tx) = &self.action_tx {
            if tx.send(action).is_err() {
                log::debug!("Action dropped: receiver closed");
            }
        }
    }
}

/// `-m network -o <path> [-v]`. The selected interface is not passed: the collector
/// has no interface flag.
fn collector_args(snapshot_path: &Path, verbose: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-m".into(), "network".into(), "-o".into(), snapshot_path.into()];
    if verbose {
        args.push("-v".into());
    }
    args
}
