//! Strongly-typed identifiers for turbines, ranks, and driver steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Global turbine number.
///
/// Runs `0..n_turbines` across the whole simulation, in the order the
/// turbines appear in the configuration. This is distinct from the
/// free-form label carried in [`TurbineRecord::turb_id`](crate::TurbineRecord).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurbineId(pub u32);

impl TurbineId {
    /// The turbine number as a `usize` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TurbineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TurbineId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Rank of a participant in a process group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rank(pub u32);

impl Rank {
    /// The rank as a `usize` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rank {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing driver time-step counter.
///
/// Incremented each time a driver step is accepted. Step `0` is the
/// state established by `solution0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
