//! Benchmark profiles and utilities for the Aerolink coupling layer.
//!
//! - [`utility_scale_record`]: a three-blade turbine with actuator-line
//!   resolution typical of production runs
//! - [`span_fields`]: node fields with positions along every span and
//!   seeded random flow samples

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use aerolink_core::{FieldKind, NodeFields, NodeLayout, Span, TurbineRecord};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Blade length of the benchmark rotor, in metres.
pub const BLADE_LENGTH: f64 = 63.0;
/// Hub height, in metres.
pub const HUB_HEIGHT: f64 = 90.0;

/// A 5 MW class turbine numbered `i`: 100 velocity and 300 force nodes per
/// blade, 50 and 100 on the tower.
pub fn utility_scale_record(i: u32) -> TurbineRecord {
    let x = 630.0 * f64::from(i);
    TurbineRecord {
        turb_id: i as i32,
        input_file: format!("nrel5mw_{i}.fst").into(),
        restart_file: Default::default(),
        out_file_root: format!("nrel5mw_{i}").into(),
        dt: 0.005,
        base_pos: [x, 0.0, 0.0],
        hub_pos: [x, 0.0, HUB_HEIGHT],
        sim_type: Default::default(),
        num_blades: 3,
        num_vel_pts_blade: 100,
        num_vel_pts_twr: 50,
        num_vel_pts: 1 + 300 + 50,
        num_force_pts_blade: 300,
        num_force_pts_twr: 100,
        num_force_pts: 1 + 900 + 100,
        node_cluster_type: Default::default(),
        inflow_type: Default::default(),
        nacelle_cd: 0.5,
        nacelle_area: 9.6,
        air_density: 1.225,
        br_fsi_pts_blade: Default::default(),
        br_fsi_pts_twr: 0,
        az_blend_mean: 0.0,
        az_blend_delta: 0.0,
        vel_mean: 11.4,
        wind_dir: 270.0,
        z_ref: HUB_HEIGHT,
        shear_exp: 0.14,
    }
}

fn unit(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

fn place(layout: &NodeLayout, record: &TurbineRecord, x: &mut [f64]) {
    let hub = record.hub_pos;
    let base = record.base_pos;
    for i in 0..layout.len() {
        let p = match layout.span_of(i) {
            Some(Span::Blade(b)) => {
                let range = layout.blade_range(b);
                let r = BLADE_LENGTH * (1 + i - range.start) as f64 / range.len() as f64;
                let theta = std::f64::consts::TAU * f64::from(b) / f64::from(layout.n_blades());
                [hub[0], hub[1] + r * theta.sin(), hub[2] + r * theta.cos()]
            }
            Some(Span::Tower) => {
                let range = layout.tower_range();
                let h = (hub[2] - base[2]) * (i - range.start) as f64 / range.len() as f64;
                [base[0], base[1], base[2] + h]
            }
            Some(Span::Hub) | None => hub,
        };
        x[3 * i..3 * i + 3].copy_from_slice(&p);
    }
}

/// Node fields for `record`: positions along every span, a deterministic
/// random flow sample at every node drawn from `seed`.
pub fn span_fields(record: &TurbineRecord, seed: u64) -> NodeFields {
    let vel = record.vel_layout();
    let force = record.force_layout();
    let mut fields = NodeFields::new(vel.len(), force.len());
    place(&vel, record, &mut fields.x_vel);
    place(&force, record, &mut fields.x_force);
    fields.xref_force.copy_from_slice(&fields.x_force);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for kind in [FieldKind::VelForce, FieldKind::VelVel, FieldKind::Force] {
        for v in fields.field_mut(kind) {
            *v = record.vel_mean * (0.8 + 0.4 * unit(&mut rng));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerolink_core::TurbineId;

    #[test]
    fn utility_scale_record_validates() {
        utility_scale_record(0).validate(TurbineId(0)).unwrap();
    }

    #[test]
    fn span_fields_are_deterministic_and_finite() {
        let r = utility_scale_record(0);
        let a = span_fields(&r, 42);
        let b = span_fields(&r, 42);
        assert_eq!(a, b);
        assert!(a.is_finite());
        let tip = r.force_layout().blade_range(0).end - 1;
        assert_eq!(a.node(FieldKind::XForce, tip)[2], HUB_HEIGHT + BLADE_LENGTH);
    }
}
