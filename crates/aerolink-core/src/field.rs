//! Per-slot node field samples.
//!
//! [`NodeFields`] holds one time slot's worth of node data for a single
//! turbine. Every field is a flat `3 * n` array, node-major. Orientation
//! stores three Wiener-Milenkovic parameters per force node.

use serde::{Deserialize, Serialize};

/// Which discretization a field lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldLocation {
    /// Velocity (sampling) nodes.
    Velocity,
    /// Force (actuation) nodes.
    Force,
}

/// The nine node fields tracked per time slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    /// Position of velocity nodes.
    XVel,
    /// Structural velocity of velocity nodes.
    XdotVel,
    /// Sampled flow velocity at velocity nodes.
    VelVel,
    /// Reference (undeflected) position of force nodes.
    XRefForce,
    /// Position of force nodes.
    XForce,
    /// Structural velocity of force nodes.
    XdotForce,
    /// Wiener-Milenkovic orientation of force nodes.
    OrientForce,
    /// Sampled flow velocity at force nodes.
    VelForce,
    /// Force applied at force nodes.
    Force,
}

impl FieldKind {
    /// Every field, in storage order.
    pub const ALL: [FieldKind; 9] = [
        FieldKind::XVel,
        FieldKind::XdotVel,
        FieldKind::VelVel,
        FieldKind::XRefForce,
        FieldKind::XForce,
        FieldKind::XdotForce,
        FieldKind::OrientForce,
        FieldKind::VelForce,
        FieldKind::Force,
    ];

    /// Short stable name, used in logs and file headers.
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::XVel => "x_vel",
            FieldKind::XdotVel => "xdot_vel",
            FieldKind::VelVel => "vel_vel",
            FieldKind::XRefForce => "xref_force",
            FieldKind::XForce => "x_force",
            FieldKind::XdotForce => "xdot_force",
            FieldKind::OrientForce => "orient_force",
            FieldKind::VelForce => "vel_force",
            FieldKind::Force => "force",
        }
    }

    /// Discretization the field lives on.
    pub fn location(self) -> FieldLocation {
        match self {
            FieldKind::XVel | FieldKind::XdotVel | FieldKind::VelVel => FieldLocation::Velocity,
            _ => FieldLocation::Force,
        }
    }

    /// True for the structural fields the coordinator extrapolates in
    /// time. Reference positions and driver-sampled velocities are not.
    pub fn is_extrapolated(self) -> bool {
        !matches!(
            self,
            FieldKind::XRefForce | FieldKind::VelVel | FieldKind::VelForce
        )
    }

    /// Position in [`FieldKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Node data for one turbine at one time slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeFields {
    n_vel: usize,
    n_force: usize,
    /// Position of velocity nodes.
    pub x_vel: Vec<f64>,
    /// Structural velocity of velocity nodes.
    pub xdot_vel: Vec<f64>,
    /// Sampled flow velocity at velocity nodes.
    pub vel_vel: Vec<f64>,
    /// Reference position of force nodes.
    pub xref_force: Vec<f64>,
    /// Position of force nodes.
    pub x_force: Vec<f64>,
    /// Structural velocity of force nodes.
    pub xdot_force: Vec<f64>,
    /// Orientation of force nodes.
    pub orient_force: Vec<f64>,
    /// Sampled flow velocity at force nodes.
    pub vel_force: Vec<f64>,
    /// Force applied at force nodes.
    pub force: Vec<f64>,
}

impl NodeFields {
    /// Zero-filled fields for `n_vel` velocity and `n_force` force nodes.
    pub fn new(n_vel: usize, n_force: usize) -> Self {
        let v = || vec![0.0; 3 * n_vel];
        let f = || vec![0.0; 3 * n_force];
        Self {
            n_vel,
            n_force,
            x_vel: v(),
            xdot_vel: v(),
            vel_vel: v(),
            xref_force: f(),
            x_force: f(),
            xdot_force: f(),
            orient_force: f(),
            vel_force: f(),
            force: f(),
        }
    }

    /// Number of velocity nodes.
    pub fn n_vel(&self) -> usize {
        self.n_vel
    }

    /// Number of force nodes.
    pub fn n_force(&self) -> usize {
        self.n_force
    }

    /// Node count on the given discretization.
    pub fn n_nodes(&self, location: FieldLocation) -> usize {
        match location {
            FieldLocation::Velocity => self.n_vel,
            FieldLocation::Force => self.n_force,
        }
    }

    /// Borrow one field's flat array.
    pub fn field(&self, kind: FieldKind) -> &[f64] {
        match kind {
            FieldKind::XVel => &self.x_vel,
            FieldKind::XdotVel => &self.xdot_vel,
            FieldKind::VelVel => &self.vel_vel,
            FieldKind::XRefForce => &self.xref_force,
            FieldKind::XForce => &self.x_force,
            FieldKind::XdotForce => &self.xdot_force,
            FieldKind::OrientForce => &self.orient_force,
            FieldKind::VelForce => &self.vel_force,
            FieldKind::Force => &self.force,
        }
    }

    /// Mutably borrow one field's flat array.
    pub fn field_mut(&mut self, kind: FieldKind) -> &mut [f64] {
        match kind {
            FieldKind::XVel => &mut self.x_vel,
            FieldKind::XdotVel => &mut self.xdot_vel,
            FieldKind::VelVel => &mut self.vel_vel,
            FieldKind::XRefForce => &mut self.xref_force,
            FieldKind::XForce => &mut self.x_force,
            FieldKind::XdotForce => &mut self.xdot_force,
            FieldKind::OrientForce => &mut self.orient_force,
            FieldKind::VelForce => &mut self.vel_force,
            FieldKind::Force => &mut self.force,
        }
    }

    /// The three components of node `i` in `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is past the end of the field.
    pub fn node(&self, kind: FieldKind, i: usize) -> [f64; 3] {
        let f = self.field(kind);
        [f[3 * i], f[3 * i + 1], f[3 * i + 2]]
    }

    /// Overwrite the three components of node `i` in `kind`.
    pub fn set_node(&mut self, kind: FieldKind, i: usize, value: [f64; 3]) {
        self.field_mut(kind)[3 * i..3 * i + 3].copy_from_slice(&value);
    }

    /// Copy every field from `other` without reallocating.
    ///
    /// # Panics
    ///
    /// Panics if the node counts differ.
    pub fn copy_from(&mut self, other: &NodeFields) {
        assert_eq!(
            (self.n_vel, self.n_force),
            (other.n_vel, other.n_force),
            "node field dimensions differ"
        );
        for kind in FieldKind::ALL {
            self.field_mut(kind).copy_from_slice(other.field(kind));
        }
    }

    /// True if every component of every field is finite.
    pub fn is_finite(&self) -> bool {
        FieldKind::ALL
            .iter()
            .all(|&k| self.field(k).iter().all(|v| v.is_finite()))
    }
}

/// Per-field change between two successive nonlinear iterates.
///
/// Each entry is the Euclidean norm of the difference of the flat arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldResiduals {
    values: [f64; 9],
}

impl FieldResiduals {
    /// Residuals of `current` against `previous`.
    pub fn between(previous: &NodeFields, current: &NodeFields) -> Self {
        let mut values = [0.0; 9];
        for kind in FieldKind::ALL {
            values[kind.index()] = l2_diff(previous.field(kind), current.field(kind));
        }
        Self { values }
    }

    /// Residual of one field.
    pub fn get(&self, kind: FieldKind) -> f64 {
        self.values[kind.index()]
    }

    /// Largest residual over all fields.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

pub(crate) fn l2_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_sized_per_location() {
        let f = NodeFields::new(4, 7);
        for kind in FieldKind::ALL {
            let expected = 3 * f.n_nodes(kind.location());
            assert_eq!(f.field(kind).len(), expected, "{}", kind.name());
        }
    }

    #[test]
    fn kind_index_matches_all_order() {
        for (i, kind) in FieldKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn driver_fields_are_not_extrapolated() {
        let extrapolated: Vec<_> = FieldKind::ALL
            .iter()
            .filter(|k| k.is_extrapolated())
            .map(|k| k.name())
            .collect();
        assert_eq!(
            extrapolated,
            vec!["x_vel", "xdot_vel", "x_force", "xdot_force", "orient_force", "force"]
        );
    }

    #[test]
    fn set_and_read_node() {
        let mut f = NodeFields::new(2, 3);
        f.set_node(FieldKind::Force, 2, [1.0, 2.0, 3.0]);
        assert_eq!(f.node(FieldKind::Force, 2), [1.0, 2.0, 3.0]);
        assert_eq!(&f.force[6..9], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn copy_from_is_exact() {
        let mut a = NodeFields::new(2, 2);
        a.x_vel[1] = 4.5;
        a.orient_force[5] = -0.25;
        let mut b = NodeFields::new(2, 2);
        b.copy_from(&a);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "node field dimensions differ")]
    fn copy_from_rejects_mismatched_shape() {
        NodeFields::new(2, 2).copy_from(&NodeFields::new(3, 2));
    }

    #[test]
    fn residuals_measure_change() {
        let a = NodeFields::new(1, 1);
        let mut b = a.clone();
        b.force[0] = 3.0;
        b.force[1] = 4.0;
        let r = FieldResiduals::between(&a, &b);
        assert_eq!(r.get(FieldKind::Force), 5.0);
        assert_eq!(r.get(FieldKind::XVel), 0.0);
        assert_eq!(r.max(), 5.0);
    }

    #[test]
    fn nan_detected() {
        let mut f = NodeFields::new(1, 1);
        assert!(f.is_finite());
        f.vel_vel[2] = f64::NAN;
        assert!(!f.is_finite());
    }
}
