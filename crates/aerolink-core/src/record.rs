//! Per-turbine configuration.
//!
//! A [`TurbineRecord`] is created once from driver-supplied input and
//! never mutated after the coordinator's `init`. Node counts follow the
//! fixed layout hub, blades, tower: every total must equal
//! `1 + num_blades * per_blade + tower`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::id::TurbineId;
use crate::layout::NodeLayout;

/// How the turbine couples to the flow driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimType {
    /// Actuator coupling: the driver supplies inflow, the solver returns
    /// lumped forces at the force nodes.
    #[default]
    ExtInflow,
    /// Blade-resolved coupling: the solver returns deflections, the driver
    /// supplies loads along blades and tower.
    ExtLoads,
}

/// Where the solver takes its inflow from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InflowType {
    /// The solver's own inflow model.
    InflowWind,
    /// Velocities pushed by the driver every substep.
    #[default]
    External,
}

/// Distribution of force nodes along each blade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClustering {
    /// Equal spacing along the span.
    #[default]
    Uniform,
    /// Nodes clustered toward root and tip.
    NonUniform,
}

/// Immutable configuration for one turbine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurbineRecord {
    /// Free-form turbine label used in file names and logs.
    pub turb_id: i32,
    /// Solver input file.
    pub input_file: PathBuf,
    /// Solver restart file, used when resuming the solver itself.
    #[serde(default)]
    pub restart_file: PathBuf,
    /// Root for every file this layer writes for the turbine.
    pub out_file_root: PathBuf,
    /// Solver time step for this turbine, in seconds.
    pub dt: f64,
    /// Turbine base position in global coordinates.
    pub base_pos: [f64; 3],
    /// Approximate hub position in global coordinates.
    pub hub_pos: [f64; 3],
    /// Coupling mode.
    #[serde(default)]
    pub sim_type: SimType,
    /// Number of blades.
    pub num_blades: u32,
    /// Velocity nodes per blade.
    pub num_vel_pts_blade: u32,
    /// Velocity nodes on the tower.
    pub num_vel_pts_twr: u32,
    /// Total velocity nodes (hub + blades + tower).
    pub num_vel_pts: u32,
    /// Force nodes per blade.
    pub num_force_pts_blade: u32,
    /// Force nodes on the tower.
    pub num_force_pts_twr: u32,
    /// Total force nodes (hub + blades + tower).
    pub num_force_pts: u32,
    /// Force-node clustering along the blades.
    #[serde(default)]
    pub node_cluster_type: NodeClustering,
    /// Inflow source.
    #[serde(default)]
    pub inflow_type: InflowType,
    /// Nacelle drag coefficient. Zero disables nacelle drag.
    #[serde(default)]
    pub nacelle_cd: f64,
    /// Nacelle frontal area.
    #[serde(default)]
    pub nacelle_area: f64,
    /// Air density around the turbine.
    #[serde(default = "default_air_density")]
    pub air_density: f64,
    /// Blade-resolved FSI nodes per blade (one entry per blade).
    #[serde(default)]
    pub br_fsi_pts_blade: SmallVec<[u32; 3]>,
    /// Blade-resolved FSI nodes on the tower.
    #[serde(default)]
    pub br_fsi_pts_twr: u32,
    /// Mean azimuth at which solver and driver loads are blended.
    #[serde(default)]
    pub az_blend_mean: f64,
    /// Azimuth width of the load blending window.
    #[serde(default)]
    pub az_blend_delta: f64,
    /// Mean wind speed at the reference height.
    #[serde(default)]
    pub vel_mean: f64,
    /// Compass direction of the wind, in degrees.
    #[serde(default = "default_wind_dir")]
    pub wind_dir: f64,
    /// Reference height of the wind profile.
    #[serde(default = "default_z_ref")]
    pub z_ref: f64,
    /// Shear exponent of the wind profile.
    #[serde(default)]
    pub shear_exp: f64,
}

fn default_air_density() -> f64 {
    1.225
}

fn default_wind_dir() -> f64 {
    270.0
}

fn default_z_ref() -> f64 {
    90.0
}

impl TurbineRecord {
    /// Layout of the velocity (sampling) nodes.
    pub fn vel_layout(&self) -> NodeLayout {
        NodeLayout::new(self.num_blades, self.num_vel_pts_blade, self.num_vel_pts_twr)
    }

    /// Layout of the force (actuation) nodes.
    pub fn force_layout(&self) -> NodeLayout {
        NodeLayout::new(
            self.num_blades,
            self.num_force_pts_blade,
            self.num_force_pts_twr,
        )
    }

    /// Total blade-resolved FSI nodes over all blades.
    pub fn total_br_fsi_pts_blade(&self) -> usize {
        self.br_fsi_pts_blade.iter().map(|&n| n as usize).sum()
    }

    /// Check structural invariants of the record.
    pub fn validate(&self, turbine: TurbineId) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTurbine { turbine, reason };

        if self.num_blades == 0 {
            return Err(invalid("a turbine needs at least one blade".into()));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(invalid(format!("solver dt must be positive, got {}", self.dt)));
        }
        let vel_total = self.vel_layout().len() as u64;
        if vel_total != u64::from(self.num_vel_pts) {
            return Err(invalid(format!(
                "num_vel_pts is {} but hub + blades + tower gives {vel_total}",
                self.num_vel_pts
            )));
        }
        let force_total = self.force_layout().len() as u64;
        if force_total != u64::from(self.num_force_pts) {
            return Err(invalid(format!(
                "num_force_pts is {} but hub + blades + tower gives {force_total}",
                self.num_force_pts
            )));
        }
        if self.num_vel_pts_blade > 0 && self.num_force_pts_blade == 0 {
            return Err(invalid(
                "blade velocity nodes need at least one blade force node".into(),
            ));
        }
        if self.num_vel_pts_twr > 0 && self.num_force_pts_twr == 0 {
            return Err(invalid(
                "tower velocity nodes need at least one tower force node".into(),
            ));
        }
        for (name, value) in [
            ("nacelle_cd", self.nacelle_cd),
            ("nacelle_area", self.nacelle_area),
            ("air_density", self.air_density),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        if self.sim_type == SimType::ExtLoads
            && self.br_fsi_pts_blade.len() != self.num_blades as usize
        {
            return Err(invalid(format!(
                "blade-resolved coupling needs one FSI node count per blade, got {} for {} blades",
                self.br_fsi_pts_blade.len(),
                self.num_blades
            )));
        }
        Ok(())
    }
}
