//! Turbine record fixtures.
//!
//! - [`turbine_record`] a small three-blade actuator turbine.
//! - [`turbine_record_in`] the same, writing its files under a directory.
//! - [`blade_resolved_record`] a turbine coupled through blade loads.

use std::path::Path;

use aerolink_core::{InflowType, NodeClustering, SimType, TurbineRecord};

/// Velocity nodes per blade in every fixture.
pub const VEL_PTS_BLADE: u32 = 4;
/// Velocity nodes on the tower.
pub const VEL_PTS_TWR: u32 = 2;
/// Force nodes per blade.
pub const FORCE_PTS_BLADE: u32 = 6;
/// Force nodes on the tower.
pub const FORCE_PTS_TWR: u32 = 3;

/// A three-blade actuator turbine numbered `i`, 500 m downstream of
/// turbine `i - 1`, with a 0.1 s solver step and a 90 m hub.
pub fn turbine_record(i: u32) -> TurbineRecord {
    let x = 500.0 * f64::from(i);
    TurbineRecord {
        turb_id: i as i32,
        input_file: format!("turb{i}.fst").into(),
        restart_file: Default::default(),
        out_file_root: format!("turb{i}").into(),
        dt: 0.1,
        base_pos: [x, 0.0, 0.0],
        hub_pos: [x, 0.0, 90.0],
        sim_type: SimType::ExtInflow,
        num_blades: 3,
        num_vel_pts_blade: VEL_PTS_BLADE,
        num_vel_pts_twr: VEL_PTS_TWR,
        num_vel_pts: 1 + 3 * VEL_PTS_BLADE + VEL_PTS_TWR,
        num_force_pts_blade: FORCE_PTS_BLADE,
        num_force_pts_twr: FORCE_PTS_TWR,
        num_force_pts: 1 + 3 * FORCE_PTS_BLADE + FORCE_PTS_TWR,
        node_cluster_type: NodeClustering::Uniform,
        inflow_type: InflowType::External,
        nacelle_cd: 0.0,
        nacelle_area: 0.0,
        air_density: 1.225,
        br_fsi_pts_blade: Default::default(),
        br_fsi_pts_twr: 0,
        az_blend_mean: 0.0,
        az_blend_delta: 0.0,
        vel_mean: 8.0,
        wind_dir: 270.0,
        z_ref: 90.0,
        shear_exp: 0.2,
    }
}

/// [`turbine_record`] with its output root inside `dir`.
pub fn turbine_record_in(dir: &Path, i: u32) -> TurbineRecord {
    TurbineRecord {
        out_file_root: dir.join(format!("turb{i}")),
        ..turbine_record(i)
    }
}

/// [`turbine_record`] coupled through blade-resolved loads, five FSI nodes
/// per blade and four on the tower.
pub fn blade_resolved_record(i: u32) -> TurbineRecord {
    TurbineRecord {
        sim_type: SimType::ExtLoads,
        br_fsi_pts_blade: [5, 5, 5].into_iter().collect(),
        br_fsi_pts_twr: 4,
        ..turbine_record(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerolink_core::TurbineId;

    #[test]
    fn fixtures_validate() {
        for i in 0..3 {
            assert!(turbine_record(i).validate(TurbineId(i)).is_ok());
            assert!(blade_resolved_record(i).validate(TurbineId(i)).is_ok());
        }
    }

    #[test]
    fn node_totals() {
        let r = turbine_record(0);
        assert_eq!(r.num_vel_pts, 15);
        assert_eq!(r.num_force_pts, 22);
    }
}
