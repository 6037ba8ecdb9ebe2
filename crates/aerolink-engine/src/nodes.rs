//! Node-level access for the flow driver.
//!
//! Every accessor takes a global turbine number. Asking for a turbine
//! owned by another rank, or for a node past the end of a discretization,
//! is a contract violation and panics with the corresponding
//! [`RangeError`] message.

use aerolink_core::geometry::wm_to_dcm;
use aerolink_core::{
    BrFsiData, BrFsiResiduals, FieldKind, FieldResiduals, NodeLayout, NodeType, RangeError,
    SimType, TimeSlot, TurbineId, FSI_DOF,
};
use aerolink_interp::{PowerLawProfile, SpanGeometry};

use crate::coordinator::Coordinator;
use crate::turbine::TurbineState;

fn check_node(turbine: TurbineId, node: usize, n_nodes: usize) {
    if node >= n_nodes {
        panic!(
            "{}",
            RangeError::NodeOutOfRange {
                turbine,
                node,
                n_nodes,
            }
        );
    }
}

impl Coordinator {
    fn local_index(&self, t: TurbineId) -> usize {
        match self.assignment().try_local_index(t) {
            Ok(i) if i < self.turbines.len() => i,
            Ok(_) => panic!("turbine {t} accessed before init"),
            Err(e) => panic!("{e}"),
        }
    }

    fn turbine(&self, t: TurbineId) -> &TurbineState {
        &self.turbines[self.local_index(t)]
    }

    fn turbine_mut(&mut self, t: TurbineId) -> &mut TurbineState {
        let i = self.local_index(t);
        &mut self.turbines[i]
    }

    fn vel_node(&self, t: TurbineId, slot: TimeSlot, kind: FieldKind, node: usize) -> [f64; 3] {
        let turbine = self.turbine(t);
        check_node(t, node, turbine.vel_layout.len());
        turbine.ring.get(slot).node(kind, node)
    }

    fn force_node(&self, t: TurbineId, slot: TimeSlot, kind: FieldKind, node: usize) -> [f64; 3] {
        let turbine = self.turbine(t);
        check_node(t, node, turbine.force_layout.len());
        turbine.ring.get(slot).node(kind, node)
    }

    // ── Layout ─────────────────────────────────────────────────────

    /// Type of velocity node `node` of turbine `t`.
    pub fn get_vel_node_type(&self, t: TurbineId, node: usize) -> NodeType {
        let layout = &self.turbine(t).vel_layout;
        check_node(t, node, layout.len());
        layout.node_type(node).unwrap_or(NodeType::Hub)
    }

    /// Type of force node `node` of turbine `t`.
    pub fn get_force_node_type(&self, t: TurbineId, node: usize) -> NodeType {
        let layout = &self.turbine(t).force_layout;
        check_node(t, node, layout.len());
        layout.node_type(node).unwrap_or(NodeType::Hub)
    }

    /// Velocity-node layout of turbine `t`.
    pub fn vel_layout(&self, t: TurbineId) -> &NodeLayout {
        &self.turbine(t).vel_layout
    }

    /// Force-node layout of turbine `t`.
    pub fn force_layout(&self, t: TurbineId) -> &NodeLayout {
        &self.turbine(t).force_layout
    }

    /// Number of blades of turbine `t`.
    pub fn get_num_blades(&self, t: TurbineId) -> u32 {
        self.turbine(t).record.num_blades
    }

    /// Total velocity nodes of turbine `t`.
    pub fn get_num_vel_pts(&self, t: TurbineId) -> usize {
        self.turbine(t).vel_layout.len()
    }

    /// Total force nodes of turbine `t`.
    pub fn get_num_force_pts(&self, t: TurbineId) -> usize {
        self.turbine(t).force_layout.len()
    }

    /// Coupling mode of turbine `t`.
    pub fn get_sim_type(&self, t: TurbineId) -> SimType {
        self.turbine(t).record.sim_type
    }

    // ── Node data ──────────────────────────────────────────────────

    /// Position of velocity node `node` at `slot`.
    pub fn get_vel_node_coordinates(&self, t: TurbineId, node: usize, slot: TimeSlot) -> [f64; 3] {
        self.vel_node(t, slot, FieldKind::XVel, node)
    }

    /// Sampled flow velocity at velocity node `node` at `slot`.
    pub fn get_velocity(&self, t: TurbineId, node: usize, slot: TimeSlot) -> [f64; 3] {
        self.vel_node(t, slot, FieldKind::VelVel, node)
    }

    /// Position of force node `node` at `slot`.
    pub fn get_force_node_coordinates(&self, t: TurbineId, node: usize, slot: TimeSlot) -> [f64; 3] {
        self.force_node(t, slot, FieldKind::XForce, node)
    }

    /// Undeflected position of force node `node`.
    pub fn get_force_node_ref_coordinates(&self, t: TurbineId, node: usize) -> [f64; 3] {
        self.force_node(t, TimeSlot::N, FieldKind::XRefForce, node)
    }

    /// Orientation of force node `node` at `slot` as a row-major direction
    /// cosine matrix.
    pub fn get_force_node_orientation(&self, t: TurbineId, node: usize, slot: TimeSlot) -> [f64; 9] {
        wm_to_dcm(self.force_node(t, slot, FieldKind::OrientForce, node))
    }

    /// Force at force node `node` at `slot`.
    pub fn get_force(&self, t: TurbineId, node: usize, slot: TimeSlot) -> [f64; 3] {
        self.force_node(t, slot, FieldKind::Force, node)
    }

    /// Flow velocity relative to the moving structure at force node
    /// `node`: sampled velocity minus structural velocity.
    pub fn get_relative_velocity_force_node(
        &self,
        t: TurbineId,
        node: usize,
        slot: TimeSlot,
    ) -> [f64; 3] {
        let u = self.force_node(t, slot, FieldKind::VelForce, node);
        let v = self.force_node(t, slot, FieldKind::XdotForce, node);
        [u[0] - v[0], u[1] - v[1], u[2] - v[2]]
    }

    /// Span location of force node `node` at `slot`: distance from the hub
    /// node for blade nodes, height above the base for tower nodes, zero
    /// for the hub.
    pub fn get_force_node_span_location(&self, t: TurbineId, node: usize, slot: TimeSlot) -> f64 {
        let x = self.force_node(t, slot, FieldKind::XForce, node);
        let turbine = self.turbine(t);
        let origin = match turbine.force_layout.node_type(node) {
            Some(NodeType::Blade) => self.force_node(t, slot, FieldKind::XForce, NodeLayout::HUB),
            Some(NodeType::Tower) => turbine.record.base_pos,
            Some(NodeType::Hub) | None => return 0.0,
        };
        let d = [x[0] - origin[0], x[1] - origin[1], x[2] - origin[2]];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }

    /// Hub position at `slot`.
    pub fn get_hub_pos(&self, t: TurbineId, slot: TimeSlot) -> [f64; 3] {
        self.force_node(t, slot, FieldKind::XForce, NodeLayout::HUB)
    }

    /// Unit shaft direction at `slot`.
    pub fn get_hub_shaft_dir(&self, t: TurbineId, slot: TimeSlot) -> [f64; 3] {
        self.turbine(t).hub_shaft_dir(slot)
    }

    /// Configured approximate hub position.
    pub fn get_approx_hub_pos(&self, t: TurbineId) -> [f64; 3] {
        self.turbine(t).record.hub_pos
    }

    /// Configured turbine base position.
    pub fn get_turbine_base_pos(&self, t: TurbineId) -> [f64; 3] {
        self.turbine(t).record.base_pos
    }

    /// Rotor torque and thrust of turbine `t` at `slot`, returned as
    /// `(torque, thrust)`.
    pub fn compute_torque_thrust(&self, t: TurbineId, slot: TimeSlot) -> ([f64; 3], [f64; 3]) {
        self.turbine(t).torque_thrust(slot)
    }

    // ── Driver input ───────────────────────────────────────────────

    /// Set the sampled flow velocity at velocity node `node` of n+1.
    pub fn set_velocity(&mut self, t: TurbineId, node: usize, vel: [f64; 3]) {
        let turbine = self.turbine_mut(t);
        check_node(t, node, turbine.vel_layout.len());
        turbine
            .ring
            .get_mut(TimeSlot::Np1)
            .set_node(FieldKind::VelVel, node, vel);
    }

    /// Set the sampled flow velocity at force node `node` of n+1.
    pub fn set_velocity_force_node(&mut self, t: TurbineId, node: usize, vel: [f64; 3]) {
        let turbine = self.turbine_mut(t);
        check_node(t, node, turbine.force_layout.len());
        turbine
            .ring
            .get_mut(TimeSlot::Np1)
            .set_node(FieldKind::VelForce, node, vel);
    }

    /// Interpolate the n+1 flow velocity of every local turbine from its
    /// force nodes onto its velocity nodes.
    pub fn interpolate_vel_force_to_vel_nodes(&mut self) {
        for turbine in &mut self.turbines {
            let geom = SpanGeometry {
                force: &turbine.force_layout,
                vel: &turbine.vel_layout,
                base_pos: turbine.record.base_pos,
            };
            self.interp
                .interpolate_vel_force_to_vel_nodes(geom, turbine.ring.get_mut(TimeSlot::Np1));
        }
    }

    /// Fill the n+1 flow velocity of every local turbine, at both velocity
    /// and force nodes, from its power-law wind profile.
    pub fn set_exp_law_wind_speed(&mut self) {
        for turbine in &mut self.turbines {
            let profile = PowerLawProfile::from_record(&turbine.record);
            let np1 = turbine.ring.get_mut(TimeSlot::Np1);
            profile.fill(&np1.x_vel, &mut np1.vel_vel);
            profile.fill(&np1.x_force, &mut np1.vel_force);
        }
    }

    // ── Blade-resolved FSI ─────────────────────────────────────────

    /// Blade-resolved FSI record of turbine `t`; `None` unless the turbine
    /// couples through loads.
    pub fn br_fsi(&self, t: TurbineId) -> Option<&BrFsiData> {
        self.turbine(t).fsi.as_ref()
    }

    fn br_fsi_mut(&mut self, t: TurbineId) -> &mut BrFsiData {
        match self.turbine_mut(t).fsi.as_mut() {
            Some(fsi) => fsi,
            None => panic!("turbine {t} does not couple through blade-resolved loads"),
        }
    }

    /// Replace the blade loads sent with the next substep, six per blade
    /// FSI node.
    ///
    /// # Panics
    ///
    /// Panics if the turbine does not couple through loads or the length
    /// differs.
    pub fn set_blade_forces(&mut self, t: TurbineId, loads: &[f64]) {
        self.br_fsi_mut(t).bld_ld.copy_from_slice(loads);
    }

    /// Replace the tower loads sent with the next substep, six per tower
    /// FSI node.
    ///
    /// # Panics
    ///
    /// Panics if the turbine does not couple through loads or the length
    /// differs.
    pub fn set_tower_forces(&mut self, t: TurbineId, loads: &[f64]) {
        self.br_fsi_mut(t).twr_ld.copy_from_slice(loads);
    }

    /// Set a uniform x load on every blade FSI node of every local turbine
    /// that couples through loads; all other components are zeroed.
    pub fn set_uniform_x_blade_forces(&mut self, load: f64) {
        for turbine in &mut self.turbines {
            if let Some(fsi) = turbine.fsi.as_mut() {
                fsi.bld_ld.fill(0.0);
                for node in fsi.bld_ld.chunks_exact_mut(FSI_DOF) {
                    node[0] = load;
                }
            }
        }
    }

    // ── Residuals ──────────────────────────────────────────────────

    /// Node-field residuals of the last nonlinear iteration.
    pub fn field_residuals(&self, t: TurbineId) -> FieldResiduals {
        self.turbine(t).residuals
    }

    /// FSI residuals of the last nonlinear iteration; `None` unless the
    /// turbine couples through loads.
    pub fn fsi_residuals(&self, t: TurbineId) -> Option<BrFsiResiduals> {
        let turbine = self.turbine(t);
        turbine.fsi.as_ref().map(|_| turbine.fsi_residuals)
    }
}
