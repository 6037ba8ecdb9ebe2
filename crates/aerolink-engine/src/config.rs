//! Run-wide coupling configuration.
//!
//! [`CouplingConfig`] is plain data. The driver fills it (directly or from
//! a TOML document), optionally adds explicit turbine placements, and hands
//! it to [`Coordinator::new`](crate::Coordinator::new), which validates it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use aerolink_core::{ConfigError, Rank, StartType, TurbineId, TurbineRecord};

/// Largest relative distance from an integer accepted for
/// `dt_driver / dt_solver`.
pub const SUBSTEP_RATIO_TOLERANCE: f64 = 1e-6;

/// Largest relative disagreement between a turbine's solver step and the
/// run's solver step.
const SOLVER_STEP_TOLERANCE: f64 = 1e-12;

// ── CouplingConfig ─────────────────────────────────────────────────

/// Complete configuration of one coupled run.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    /// Walk allocation and teardown without calling any solver or touching
    /// the file system.
    pub dry_run: bool,
    /// Log every driver step.
    pub debug: bool,
    /// Simulation start time. For restarts, the time being resumed.
    pub t_start: f64,
    /// How the run begins.
    pub start_type: StartType,
    /// Checkpoint every this many driver steps. Zero disables checkpoints.
    pub restart_freq: u64,
    /// Log a per-turbine summary every this many driver steps. Zero
    /// disables the summary.
    pub output_freq: u64,
    /// Simulation end time, passed to the solvers.
    pub t_max: f64,
    /// Driver time step.
    pub dt_driver: f64,
    /// Solver time step, shared by every turbine.
    pub dt_solver: f64,
    /// Record the velocity history used by driver-initialised restarts.
    pub record_velocity_history: bool,
    /// Every turbine of the run, indexed by global turbine number.
    pub turbines: Vec<TurbineRecord>,
    /// Explicit turbine placement. Empty means round-robin.
    #[serde(skip)]
    pub placement: IndexMap<TurbineId, Rank>,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            debug: false,
            t_start: 0.0,
            start_type: StartType::Init,
            restart_freq: 0,
            output_freq: 0,
            t_max: 0.0,
            dt_driver: 0.0,
            dt_solver: 0.0,
            record_velocity_history: false,
            turbines: Vec::new(),
            placement: IndexMap::new(),
        }
    }
}

impl CouplingConfig {
    /// Parse a TOML document. The result is not yet validated.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Number of turbines in the run.
    pub fn n_turbines(&self) -> u32 {
        self.turbines.len() as u32
    }

    /// Place `turbine` on `rank` instead of the round-robin default.
    ///
    /// Once any placement is given, every turbine must be placed.
    pub fn set_turbine_proc_no(&mut self, turbine: TurbineId, rank: Rank) {
        self.placement.insert(turbine, rank);
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turbines.is_empty() {
            return Err(ConfigError::NoTurbines);
        }
        for (name, value) in [("dt_driver", self.dt_driver), ("dt_solver", self.dt_solver)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTime { name, value });
            }
        }
        if !self.t_start.is_finite() || self.t_start < 0.0 {
            return Err(ConfigError::InvalidTime {
                name: "t_start",
                value: self.t_start,
            });
        }
        if !self.t_max.is_finite() || self.t_max <= 0.0 {
            return Err(ConfigError::InvalidTime {
                name: "t_max",
                value: self.t_max,
            });
        }
        for (i, record) in self.turbines.iter().enumerate() {
            let turbine = TurbineId(i as u32);
            record.validate(turbine)?;
            if (record.dt - self.dt_solver).abs() > SOLVER_STEP_TOLERANCE * self.dt_solver {
                return Err(ConfigError::MixedSolverSteps {
                    turbine,
                    dt: record.dt,
                    dt_solver: self.dt_solver,
                });
            }
        }
        Ok(())
    }

    /// Solver substeps per driver step, `round(dt_driver / dt_solver)`.
    ///
    /// A ratio further than [`SUBSTEP_RATIO_TOLERANCE`] (relative) from an
    /// integer, or one that rounds to zero, is rejected.
    pub fn substep_count(&self) -> Result<u32, ConfigError> {
        let ratio = self.dt_driver / self.dt_solver;
        let n = ratio.round();
        let reject = || ConfigError::NonIntegerSubsteps {
            dt_driver: self.dt_driver,
            dt_solver: self.dt_solver,
            ratio,
        };
        if !ratio.is_finite() || n < 1.0 || n > f64::from(u32::MAX) {
            return Err(reject());
        }
        if (ratio - n).abs() > SUBSTEP_RATIO_TOLERANCE * n {
            return Err(reject());
        }
        Ok(n as u32)
    }

    /// Driver step index the run starts from: zero for a fresh start,
    /// `round(t_start / dt_driver)` for restarts.
    pub fn start_step(&self) -> u64 {
        match self.start_type {
            StartType::Init => 0,
            StartType::TrueRestart | StartType::RestartDriverInitFast => {
                (self.t_start / self.dt_driver).round().max(0.0) as u64
            }
        }
    }
}

impl fmt::Debug for CouplingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouplingConfig")
            .field("start_type", &self.start_type)
            .field("t_start", &self.t_start)
            .field("t_max", &self.t_max)
            .field("dt_driver", &self.dt_driver)
            .field("dt_solver", &self.dt_solver)
            .field("restart_freq", &self.restart_freq)
            .field("dry_run", &self.dry_run)
            .field("turbines", &self.turbines.len())
            .field("placement", &self.placement.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerolink_test_utils::fixtures::turbine_record;

    fn coupling_config(n_turbines: u32, dt_driver: f64, dt_solver: f64) -> CouplingConfig {
        CouplingConfig {
            t_max: 10.0,
            dt_driver,
            dt_solver,
            turbines: (0..n_turbines)
                .map(|i| {
                    let mut r = turbine_record(i);
                    r.dt = dt_solver;
                    r
                })
                .collect(),
            ..CouplingConfig::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(coupling_config(2, 1.0, 0.1).validate().is_ok());
    }

    #[test]
    fn empty_turbine_list_fails() {
        let mut cfg = coupling_config(1, 1.0, 0.1);
        cfg.turbines.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoTurbines));
    }

    #[test]
    fn non_positive_steps_fail() {
        let cfg = coupling_config(1, 0.0, 0.1);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTime { name: "dt_driver", .. })
        ));
        let cfg = coupling_config(1, 1.0, f64::NAN);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTime { name: "dt_solver", .. })
        ));
    }

    #[test]
    fn mixed_solver_steps_fail() {
        let mut cfg = coupling_config(2, 1.0, 0.1);
        cfg.turbines[1].dt = 0.05;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MixedSolverSteps { turbine: TurbineId(1), .. })
        ));
    }

    #[test]
    fn integer_ratio_gives_substeps() {
        assert_eq!(coupling_config(1, 1.0, 0.1).substep_count(), Ok(10));
        assert_eq!(coupling_config(1, 0.5, 0.5).substep_count(), Ok(1));
    }

    #[test]
    fn fractional_ratio_rejected() {
        let err = coupling_config(1, 1.0, 0.3).substep_count().unwrap_err();
        assert!(matches!(err, ConfigError::NonIntegerSubsteps { .. }));
        assert!(coupling_config(1, 0.01, 0.1).substep_count().is_err());
    }

    #[test]
    fn start_step_only_for_restarts() {
        let mut cfg = coupling_config(1, 0.5, 0.05);
        cfg.t_start = 10.0;
        assert_eq!(cfg.start_step(), 0);
        cfg.start_type = StartType::TrueRestart;
        assert_eq!(cfg.start_step(), 20);
    }

    #[test]
    fn toml_document_parses() {
        let doc = r#"
            t_max = 100.0
            dt_driver = 0.5
            dt_solver = 0.05
            restart_freq = 20
            start_type = "TrueRestart"

            [[turbines]]
            turb_id = 1
            input_file = "t1.fst"
            out_file_root = "out/t1"
            dt = 0.05
            base_pos = [0.0, 0.0, 0.0]
            hub_pos = [0.0, 0.0, 90.0]
            num_blades = 3
            num_vel_pts_blade = 10
            num_vel_pts_twr = 5
            num_vel_pts = 36
            num_force_pts_blade = 20
            num_force_pts_twr = 10
            num_force_pts = 71
        "#;
        let cfg = CouplingConfig::from_toml_str(doc).unwrap();
        assert_eq!(cfg.start_type, StartType::TrueRestart);
        assert_eq!(cfg.turbines.len(), 1);
        assert_eq!(cfg.turbines[0].air_density, 1.225);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.substep_count(), Ok(10));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = CouplingConfig::from_toml_str("dt_driver = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn placement_recorded() {
        let mut cfg = coupling_config(2, 1.0, 0.1);
        cfg.set_turbine_proc_no(TurbineId(1), Rank(0));
        assert_eq!(cfg.placement.get(&TurbineId(1)), Some(&Rank(0)));
    }
}
