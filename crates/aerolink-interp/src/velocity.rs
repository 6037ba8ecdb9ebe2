//! Force-node to velocity-node interpolation.
//!
//! Each blade is its own span whose stations are distances from the hub
//! node of the respective discretization. The tower span measures from
//! the turbine base. The hub sample is copied. No interpolation crosses a
//! span boundary.

use aerolink_core::{NodeFields, NodeLayout};

use crate::span::{distances_from, interpolate_clamped};

/// Reusable interpolator. Holds station scratch buffers so repeated calls
/// do not allocate once they have grown to the largest span.
#[derive(Clone, Debug, Default)]
pub struct ForceToVelInterpolator {
    force_stations: Vec<f64>,
    vel_stations: Vec<f64>,
}

/// Geometry of one turbine's two discretizations.
#[derive(Clone, Copy, Debug)]
pub struct SpanGeometry<'a> {
    /// Force-node layout.
    pub force: &'a NodeLayout,
    /// Velocity-node layout.
    pub vel: &'a NodeLayout,
    /// Turbine base position, origin of the tower stations.
    pub base_pos: [f64; 3],
}

impl ForceToVelInterpolator {
    /// A fresh interpolator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpolate `src` (sampled at force nodes located at `x_force`) onto
    /// velocity nodes located at `x_vel`, writing `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the array lengths disagree with the layouts.
    pub fn interpolate(
        &mut self,
        geom: SpanGeometry<'_>,
        x_force: &[f64],
        src: &[f64],
        x_vel: &[f64],
        dst: &mut [f64],
    ) {
        assert_eq!(x_force.len(), 3 * geom.force.len(), "force positions do not match layout");
        assert_eq!(src.len(), 3 * geom.force.len(), "force samples do not match layout");
        assert_eq!(x_vel.len(), 3 * geom.vel.len(), "velocity positions do not match layout");
        assert_eq!(dst.len(), 3 * geom.vel.len(), "velocity samples do not match layout");

        dst[0..3].copy_from_slice(&src[0..3]);

        let hub_force = node(x_force, NodeLayout::HUB);
        let hub_vel = node(x_vel, NodeLayout::HUB);
        if geom.vel.per_blade() > 0 {
            for b in 0..geom.vel.n_blades() {
                self.span(
                    (hub_force, geom.force.blade_range(b)),
                    (hub_vel, geom.vel.blade_range(b)),
                    x_force,
                    src,
                    x_vel,
                    dst,
                );
            }
        }
        if geom.vel.tower() > 0 {
            self.span(
                (geom.base_pos, geom.force.tower_range()),
                (geom.base_pos, geom.vel.tower_range()),
                x_force,
                src,
                x_vel,
                dst,
            );
        }
    }

    /// Interpolate the sampled flow velocity of one slot from force nodes
    /// onto velocity nodes.
    pub fn interpolate_vel_force_to_vel_nodes(
        &mut self,
        geom: SpanGeometry<'_>,
        fields: &mut NodeFields,
    ) {
        self.interpolate(
            geom,
            &fields.x_force,
            &fields.vel_force,
            &fields.x_vel,
            &mut fields.vel_vel,
        );
    }

    fn span(
        &mut self,
        (force_origin, force_nodes): ([f64; 3], std::ops::Range<usize>),
        (vel_origin, vel_nodes): ([f64; 3], std::ops::Range<usize>),
        x_force: &[f64],
        src: &[f64],
        x_vel: &[f64],
        dst: &mut [f64],
    ) {
        let force_values = &src[3 * force_nodes.start..3 * force_nodes.end];
        self.force_stations.clear();
        distances_from(
            force_origin,
            &x_force[3 * force_nodes.start..3 * force_nodes.end],
            &mut self.force_stations,
        );
        self.vel_stations.clear();
        distances_from(
            vel_origin,
            &x_vel[3 * vel_nodes.start..3 * vel_nodes.end],
            &mut self.vel_stations,
        );
        for (k, i) in vel_nodes.enumerate() {
            let v = interpolate_clamped(&self.force_stations, force_values, self.vel_stations[k]);
            dst[3 * i..3 * i + 3].copy_from_slice(&v);
        }
    }
}

fn node(x: &[f64], i: usize) -> [f64; 3] {
    [x[3 * i], x[3 * i + 1], x[3 * i + 2]]
}
