//! Errors surfaced by the coordinator.

use thiserror::Error;

use aerolink_comm::{CommError, GroupError};
use aerolink_core::{ConfigError, Phase, SolverStatus, TurbineId};
use aerolink_restart::RestartError;

use crate::coordinator::CoordinatorState;

/// Everything that can stop a coupled run.
///
/// Every variant is fatal: the coordinator moves to
/// [`CoordinatorState::Failed`] and only [`end`](crate::Coordinator::end)
/// remains callable.
#[derive(Debug, Error)]
pub enum CouplingError {
    /// The configuration or a restart file is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A solver call failed.
    #[error("turbine {turbine} failed in {phase}")]
    Solver {
        /// The failing turbine.
        turbine: TurbineId,
        /// Which stepper call failed.
        phase: Phase,
        /// Status reported by the solver.
        #[source]
        status: SolverStatus,
    },
    /// Reading or writing a checkpoint or velocity history failed.
    #[error("persistence: {0}")]
    Persistence(#[from] RestartError),
    /// A collective operation failed.
    #[error("communication: {0}")]
    Comm(#[from] CommError),
    /// An operation was called out of order.
    #[error("{operation} is not valid in state {state:?}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the coordinator was in.
        state: CoordinatorState,
    },
    /// Another rank of the turbine group failed this step.
    #[error("a peer rank failed; aborting the step")]
    PeerFailed,
    /// A substep fraction outside `(0, 1]`.
    #[error("substep fraction must lie in (0, 1], got {value}")]
    InvalidSubstepFraction {
        /// The rejected fraction.
        value: f64,
    },
}

impl From<GroupError> for CouplingError {
    fn from(e: GroupError) -> Self {
        match e {
            GroupError::Config(e) => CouplingError::Config(e),
            GroupError::Comm(e) => CouplingError::Comm(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn solver_error_keeps_status_as_source() {
        let err = CouplingError::Solver {
            turbine: TurbineId(3),
            phase: Phase::Advance,
            status: SolverStatus::new(2, "ElastoDyn diverged"),
        };
        assert_eq!(err.to_string(), "turbine 3 failed in advance");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("solver status 2: ElastoDyn diverged"));
    }

    #[test]
    fn group_errors_flatten() {
        let err: CouplingError = GroupError::Config(ConfigError::EmptyGroup).into();
        assert!(matches!(err, CouplingError::Config(ConfigError::EmptyGroup)));
    }
}
