//! Persisted records.

use aerolink_core::{ConfigError, NodeFields, StepId, TurbineId, TurbineRecord};

/// Dimensions a restart file must agree with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurbineDims {
    /// Global turbine number.
    pub turbine: TurbineId,
    /// Number of blades.
    pub n_blades: u32,
    /// Total velocity nodes.
    pub n_vel: u32,
    /// Total force nodes.
    pub n_force: u32,
}

impl TurbineDims {
    /// Dimensions of the configured turbine `turbine`.
    pub fn from_record(turbine: TurbineId, record: &TurbineRecord) -> Self {
        Self {
            turbine,
            n_blades: record.num_blades,
            n_vel: record.num_vel_pts,
            n_force: record.num_force_pts,
        }
    }

    /// Fail if the dimensions recorded in a file differ from `current`.
    pub fn ensure_matches(&self, current: &TurbineDims) -> Result<(), ConfigError> {
        let pairs = [
            ("turbine", self.turbine.0, current.turbine.0),
            ("n_blades", self.n_blades, current.n_blades),
            ("n_vel", self.n_vel, current.n_vel),
            ("n_force", self.n_force, current.n_force),
        ];
        for (what, recorded, expected) in pairs {
            if recorded != expected {
                return Err(ConfigError::RestartDimensionMismatch {
                    turbine: current.turbine,
                    what,
                    recorded: u64::from(recorded),
                    current: u64::from(expected),
                });
            }
        }
        Ok(())
    }
}

/// Everything needed to resume one turbine's coupling state.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    /// Dimensions of the turbine when the checkpoint was taken.
    pub dims: TurbineDims,
    /// Last completed driver step.
    pub step: StepId,
    /// Number of valid past slots (1 to 3) available for extrapolation.
    pub history_depth: u8,
    /// Opaque handle returned by the solver for its own checkpoint.
    pub solver_handle: String,
    /// Slots ordered n-2, n-1, n, n+1.
    pub slots: [NodeFields; 4],
}

/// Header of a velocity-history file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryHeader {
    /// Global turbine number.
    pub turbine: TurbineId,
    /// Velocity nodes per record.
    pub n_vel: u32,
}

/// How a recorded sample was fed to the solver substeps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubstepDrive {
    /// A nonlinear iteration: every substep of the step interpolates
    /// between n and n+1, and the solution is pulled once at the end.
    Interpolated,
    /// Every substep holds n+1 and the solution is pulled after each.
    Held,
    /// A single driver-issued substep ending at this fraction of the step,
    /// followed by a pull.
    Fraction(f64),
}

impl SubstepDrive {
    pub(crate) fn tag(self) -> u8 {
        match self {
            SubstepDrive::Interpolated => 0,
            SubstepDrive::Held => 1,
            SubstepDrive::Fraction(_) => 2,
        }
    }
}

/// Velocity-node samples at one `(step, iteration)` key.
///
/// For [`SubstepDrive::Fraction`] samples the iteration is the index of the
/// substep call within the step.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRecord {
    /// Driver step the sample belongs to.
    pub step: u64,
    /// Position of the sample within the step.
    pub iteration: u32,
    /// How the sample drove the solver.
    pub drive: SubstepDrive,
    /// Velocity-node positions.
    pub x_vel: Vec<f64>,
    /// Sampled flow velocity at the velocity nodes.
    pub vel_vel: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> TurbineDims {
        TurbineDims {
            turbine: TurbineId(2),
            n_blades: 3,
            n_vel: 31,
            n_force: 61,
        }
    }

    #[test]
    fn equal_dims_match() {
        assert!(dims().ensure_matches(&dims()).is_ok());
    }

    #[test]
    fn force_count_mismatch_reported() {
        let mut current = dims();
        current.n_force = 41;
        assert_eq!(
            dims().ensure_matches(&current),
            Err(ConfigError::RestartDimensionMismatch {
                turbine: TurbineId(2),
                what: "n_force",
                recorded: 61,
                current: 41,
            })
        );
    }
}
