//! Blade-resolved fluid-structure interaction data.
//!
//! Only turbines coupled with [`SimType::ExtLoads`](crate::SimType) carry
//! this record. It holds the single current value; it is not ringed.
//! Motion entries have six components per node (three translational,
//! three rotational as Wiener-Milenkovic parameters). Loads have six
//! components per node (force, moment).

use serde::{Deserialize, Serialize};

use crate::field::l2_diff;

/// Components per node for positions, deflections, velocities and loads.
pub const FSI_DOF: usize = 6;

/// Current blade-resolved FSI state of one turbine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrFsiData {
    /// Tower reference positions.
    pub twr_ref_pos: Vec<f64>,
    /// Tower deflections.
    pub twr_def: Vec<f64>,
    /// Tower velocities.
    pub twr_vel: Vec<f64>,
    /// Blade radial location of each blade node.
    pub bld_rloc: Vec<f64>,
    /// Blade chord at each blade node.
    pub bld_chord: Vec<f64>,
    /// Blade reference positions.
    pub bld_ref_pos: Vec<f64>,
    /// Blade deflections.
    pub bld_def: Vec<f64>,
    /// Blade velocities.
    pub bld_vel: Vec<f64>,
    /// Hub reference position.
    pub hub_ref_pos: Vec<f64>,
    /// Hub deflection.
    pub hub_def: Vec<f64>,
    /// Hub velocity.
    pub hub_vel: Vec<f64>,
    /// Nacelle reference position.
    pub nac_ref_pos: Vec<f64>,
    /// Nacelle deflection.
    pub nac_def: Vec<f64>,
    /// Nacelle velocity.
    pub nac_vel: Vec<f64>,
    /// Blade root reference positions, one entry per blade.
    pub bld_root_ref_pos: Vec<f64>,
    /// Blade root deflections, one entry per blade.
    pub bld_root_def: Vec<f64>,
    /// Blade pitch angle, one per blade.
    pub bld_pitch: Vec<f64>,
    /// Tower loads supplied by the driver.
    pub twr_ld: Vec<f64>,
    /// Blade loads supplied by the driver.
    pub bld_ld: Vec<f64>,
}

impl BrFsiData {
    /// Zero-filled record for `n_blades` blades carrying `n_blade_pts` FSI
    /// nodes in total and `n_twr_pts` tower FSI nodes.
    pub fn new(n_blades: usize, n_blade_pts: usize, n_twr_pts: usize) -> Self {
        let twr = || vec![0.0; FSI_DOF * n_twr_pts];
        let bld = || vec![0.0; FSI_DOF * n_blade_pts];
        let point = || vec![0.0; FSI_DOF];
        Self {
            twr_ref_pos: twr(),
            twr_def: twr(),
            twr_vel: twr(),
            bld_rloc: vec![0.0; n_blade_pts],
            bld_chord: vec![0.0; n_blade_pts],
            bld_ref_pos: bld(),
            bld_def: bld(),
            bld_vel: bld(),
            hub_ref_pos: point(),
            hub_def: point(),
            hub_vel: point(),
            nac_ref_pos: point(),
            nac_def: point(),
            nac_vel: point(),
            bld_root_ref_pos: vec![0.0; FSI_DOF * n_blades],
            bld_root_def: vec![0.0; FSI_DOF * n_blades],
            bld_pitch: vec![0.0; n_blades],
            twr_ld: twr(),
            bld_ld: bld(),
        }
    }

    /// Number of tower FSI nodes.
    pub fn n_twr_pts(&self) -> usize {
        self.twr_ref_pos.len() / FSI_DOF
    }

    /// Total number of blade FSI nodes.
    pub fn n_blade_pts(&self) -> usize {
        self.bld_rloc.len()
    }
}

/// Change in the FSI fields between two successive nonlinear iterates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrFsiResiduals {
    /// Tower deflection residual.
    pub twr_def: f64,
    /// Tower velocity residual.
    pub twr_vel: f64,
    /// Blade deflection residual.
    pub bld_def: f64,
    /// Blade velocity residual.
    pub bld_vel: f64,
    /// Tower load residual.
    pub twr_ld: f64,
    /// Blade load residual.
    pub bld_ld: f64,
}

impl BrFsiResiduals {
    /// Residuals of `current` against `previous`.
    pub fn between(previous: &BrFsiData, current: &BrFsiData) -> Self {
        Self {
            twr_def: l2_diff(&previous.twr_def, &current.twr_def),
            twr_vel: l2_diff(&previous.twr_vel, &current.twr_vel),
            bld_def: l2_diff(&previous.bld_def, &current.bld_def),
            bld_vel: l2_diff(&previous.bld_vel, &current.bld_vel),
            twr_ld: l2_diff(&previous.twr_ld, &current.twr_ld),
            bld_ld: l2_diff(&previous.bld_ld, &current.bld_ld),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_counts() {
        let d = BrFsiData::new(3, 30, 8);
        assert_eq!(d.n_twr_pts(), 8);
        assert_eq!(d.n_blade_pts(), 30);
        assert_eq!(d.bld_def.len(), 180);
        assert_eq!(d.bld_pitch.len(), 3);
        assert_eq!(d.bld_root_def.len(), 18);
        assert_eq!(d.hub_ref_pos.len(), FSI_DOF);
    }

    #[test]
    fn residuals_only_see_changed_fields() {
        let a = BrFsiData::new(2, 4, 2);
        let mut b = a.clone();
        b.bld_ld[0] = 2.0;
        let r = BrFsiResiduals::between(&a, &b);
        assert_eq!(r.bld_ld, 2.0);
        assert_eq!(r.twr_def, 0.0);
        assert_eq!(r.bld_vel, 0.0);
    }
}
