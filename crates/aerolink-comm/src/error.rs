//! Errors raised by the process-group substrate.

use aerolink_core::ConfigError;
use thiserror::Error;

/// Failure of a collective operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommError {
    /// A peer did not take part in a collective within the deadline.
    #[error("rank {rank} timed out waiting for a collective on context {context:#x}")]
    Timeout {
        /// Rank (in the communicator) that gave up.
        rank: usize,
        /// Communicator context.
        context: u64,
    },
    /// Every channel to the peers has closed.
    #[error("process group disconnected")]
    Disconnected,
    /// A sub-group member list is unsorted, duplicated, or out of range.
    #[error("invalid sub-group member list {members:?} for a group of {size}")]
    InvalidGroup {
        /// The rejected member list.
        members: Vec<usize>,
        /// Size of the parent communicator.
        size: usize,
    },
}

/// Failure while building the group of turbine-owning ranks.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GroupError {
    /// The partition cannot produce a valid group.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The collective that creates the group failed.
    #[error(transparent)]
    Comm(#[from] CommError),
}
