//! Conductor states

use cox_protocol::RecoveryBuilder;

use crate::handler::ExecutionContext;

/// Per-conductor state.
///
/// At most one context is ever in `WillExecute` or `Executing`; while there,
/// it is not in the queue.
#[derive(Debug)]
pub enum State {
    /// Idle; the next dequeue may dispatch
    Ground,
    /// Bytes written, response not yet started
    WillExecute(ExecutionContext),
    /// First response event received, end boundary pending
    Executing(ExecutionContext),
    /// Remote framer disabled; raw passthrough
    Unhooked,
    /// Reading (or about to read) a recovery banner
    Recovery(RecoveryState),
    /// Recovery finished; waiting for the parser to catch up
    Recovered,
}

/// Sub-state while the recovery banner protocol runs
#[derive(Debug)]
pub enum RecoveryState {
    /// Waiting for `:begin-recovery`
    Ground,
    /// Accumulating `:recovery:` fields
    Building(RecoveryBuilder),
}

impl State {
    /// A context is in flight (written or executing)
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::WillExecute(_) | Self::Executing(_))
    }

    /// States in which the next queued command may be dispatched
    pub fn can_dispatch(&self) -> bool {
        matches!(self, Self::Ground | Self::Recovery(_))
    }

    /// States that tolerate unexpected parser events (log and discard)
    pub fn is_tolerant(&self) -> bool {
        matches!(
            self,
            Self::Ground | Self::Unhooked | Self::Recovery(_) | Self::Recovered
        )
    }

    /// Short label for logs
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::WillExecute(_) => "will-execute",
            Self::Executing(_) => "executing",
            Self::Unhooked => "unhooked",
            Self::Recovery(RecoveryState::Ground) => "recovery",
            Self::Recovery(RecoveryState::Building(_)) => "recovery-building",
            Self::Recovered => "recovered",
        }
    }
}
