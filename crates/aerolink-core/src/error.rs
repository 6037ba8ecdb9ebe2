//! Error types shared across the Aerolink workspace.
//!
//! [`ConfigError`] covers everything that is wrong with the run before a
//! solver is ever called. [`RangeError`] describes programming-contract
//! violations; accessors panic with it rather than returning it.

use thiserror::Error;

use crate::id::{Rank, TurbineId};

/// Fatal configuration problems, surfaced before any solver call.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The configuration lists no turbines.
    #[error("no turbines configured")]
    NoTurbines,
    /// The process group has no ranks.
    #[error("process group has no ranks")]
    NoRanks,
    /// The group of turbine-owning ranks came out empty.
    #[error("no rank owns a turbine")]
    EmptyGroup,
    /// A turbine is placed on a rank outside the process group.
    #[error("turbine {turbine} assigned to rank {rank}, but the group has {size} ranks")]
    RankOutOfRange {
        /// The turbine being placed.
        turbine: TurbineId,
        /// The requested rank.
        rank: Rank,
        /// Number of ranks in the group.
        size: u32,
    },
    /// An explicit placement does not cover every turbine.
    #[error("turbine {turbine} has no rank assignment")]
    UnassignedTurbine {
        /// The turbine left without a rank.
        turbine: TurbineId,
    },
    /// A turbine record failed validation.
    #[error("turbine {turbine}: {reason}")]
    InvalidTurbine {
        /// The offending turbine.
        turbine: TurbineId,
        /// What is wrong with the record.
        reason: String,
    },
    /// A time step or time bound is NaN, infinite, or non-positive.
    #[error("{name} must be finite and positive, got {value}")]
    InvalidTime {
        /// Which parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// `dt_driver / dt_solver` is not an integer.
    #[error("driver step {dt_driver} is not an integer multiple of solver step {dt_solver} (ratio {ratio})")]
    NonIntegerSubsteps {
        /// Driver time step.
        dt_driver: f64,
        /// Solver time step.
        dt_solver: f64,
        /// The computed ratio.
        ratio: f64,
    },
    /// A turbine's solver time step disagrees with the run's solver step.
    #[error("turbine {turbine} solver step {dt} differs from the run's solver step {dt_solver}")]
    MixedSolverSteps {
        /// The offending turbine.
        turbine: TurbineId,
        /// The turbine's step.
        dt: f64,
        /// The run-wide step.
        dt_solver: f64,
    },
    /// A restart file describes a turbine with different dimensions.
    #[error("restart for turbine {turbine}: {what} is {recorded} on disk but {current} in the configuration")]
    RestartDimensionMismatch {
        /// The turbine being restored.
        turbine: TurbineId,
        /// Which dimension disagrees.
        what: &'static str,
        /// Value found in the file.
        recorded: u64,
        /// Value expected from the configuration.
        current: u64,
    },
    /// Ranks restored checkpoints taken at different driver steps.
    #[error("checkpoints disagree on the restart step: earliest {earliest}, latest {latest}")]
    RestartStepMismatch {
        /// Earliest checkpointed step over all ranks.
        earliest: u64,
        /// Latest checkpointed step over all ranks.
        latest: u64,
    },
    /// The configuration document could not be parsed.
    #[error("cannot parse configuration: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
    },
}

/// Programming-contract violations.
///
/// These are not recoverable: accessors that receive an out-of-range
/// index or a turbine owned by another rank panic with this value's
/// message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The turbine number is outside `0..n_turbines`.
    #[error("turbine {turbine} out of range (n_turbines = {n_turbines})")]
    TurbineOutOfRange {
        /// The requested turbine.
        turbine: TurbineId,
        /// Number of turbines in the simulation.
        n_turbines: u32,
    },
    /// The turbine is owned by another rank.
    #[error("turbine {turbine} is owned by rank {owner}, not rank {rank}")]
    NotOwned {
        /// The requested turbine.
        turbine: TurbineId,
        /// Rank that owns it.
        owner: Rank,
        /// Rank that asked.
        rank: Rank,
    },
    /// The node index is outside the turbine's node range.
    #[error("node {node} out of range for turbine {turbine} ({n_nodes} nodes)")]
    NodeOutOfRange {
        /// The owning turbine.
        turbine: TurbineId,
        /// The requested node.
        node: usize,
        /// Number of nodes of that kind.
        n_nodes: usize,
    },
}
