use strum::Display;

/// Where a scan is in its pipeline.
///
/// `Idle → CollectorRunning → CollectorDone → EngineRunning → EngineDone`, with
/// `Error` reachable from any running state.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum ScanPhase {
    #[default]
    Idle,
    CollectorRunning,
    CollectorDone,
    EngineRunning,
    EngineDone,
    Error,
}

impl ScanPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(&self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        matches!(
            (self, next),
            (Idle, CollectorRunning)
                | (CollectorRunning, CollectorDone)
                | (CollectorDone, EngineRunning)
                | (EngineRunning, EngineDone)
                | (CollectorRunning | CollectorDone | EngineRunning, Error)
        )
    }
}
