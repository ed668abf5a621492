// src/engine/outcome.rs

//! Result of a complete process run.

use std::fmt;

/// Why a run ended without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// At least one critical node failed; the run stopped immediately.
    CriticalNodesFailed(Vec<String>),
    /// Every node finished and these ones failed.
    NodesFailed(Vec<String>),
}

/// How a run of the process ended.
///
/// A loop in the task graph is not an outcome: it is reported as
/// [`FleetError::LoopDetected`](crate::errors::FleetError::LoopDetected)
/// before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed(FailureReason),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }

    /// Names of the nodes the failure is attributed to.
    pub fn failed_nodes(&self) -> &[String] {
        match self {
            RunOutcome::Succeeded => &[],
            RunOutcome::Failed(FailureReason::CriticalNodesFailed(names))
            | RunOutcome::Failed(FailureReason::NodesFailed(names)) => names,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Succeeded => write!(f, "succeeded"),
            RunOutcome::Failed(FailureReason::CriticalNodesFailed(names)) => {
                write!(f, "failed: critical nodes failed: {}", names.join(", "))
            }
            RunOutcome::Failed(FailureReason::NodesFailed(names)) => {
                write!(f, "failed: nodes failed: {}", names.join(", "))
            }
        }
    }
}
