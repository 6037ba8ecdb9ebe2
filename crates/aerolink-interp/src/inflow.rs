//! Power-law inflow profile.
//!
//! Used to drive turbines without a flow solver: the streamwise speed
//! follows `vel_mean * (z / z_ref)^shear_exp` and is turned by the wind
//! direction, with 270 degrees (wind from the west) along +x.

use serde::{Deserialize, Serialize};

use aerolink_core::TurbineRecord;

/// Parameters of a power-law wind profile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerLawProfile {
    /// Speed at the reference height.
    pub vel_mean: f64,
    /// Compass direction the wind comes from, in degrees.
    pub wind_dir: f64,
    /// Reference height.
    pub z_ref: f64,
    /// Shear exponent.
    pub shear_exp: f64,
}

impl PowerLawProfile {
    /// Profile described by a turbine record.
    pub fn from_record(record: &TurbineRecord) -> Self {
        Self {
            vel_mean: record.vel_mean,
            wind_dir: record.wind_dir,
            z_ref: record.z_ref,
            shear_exp: record.shear_exp,
        }
    }

    /// Wind velocity at height `z`. Zero at or below the ground.
    pub fn velocity_at(&self, z: f64) -> [f64; 3] {
        if z <= 0.0 {
            return [0.0; 3];
        }
        let speed = self.vel_mean * (z / self.z_ref).powf(self.shear_exp);
        let angle = (self.wind_dir - 270.0).to_radians();
        [speed * angle.cos(), speed * angle.sin(), 0.0]
    }

    /// Fill `vel` with the profile evaluated at every node of `x`.
    pub fn fill(&self, x: &[f64], vel: &mut [f64]) {
        for (p, v) in x.chunks_exact(3).zip(vel.chunks_exact_mut(3)) {
            v.copy_from_slice(&self.velocity_at(p[2]));
        }
    }
}
