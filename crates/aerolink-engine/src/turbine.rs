//! Per-turbine coupling state owned by the coordinator.

use std::fs::File;
use std::io::BufWriter;

use aerolink_core::geometry::{apply_dcm_rotation, calc_nacelle_force, cross, dot, wm_to_dcm};
use aerolink_core::{
    BrFsiData, BrFsiResiduals, ConfigError, ExternalStepper, FieldKind, FieldResiduals,
    LoadsInput, NodeFields, NodeLayout, Phase, SimType, SolverStatus, StartType, StepId,
    StepperInit, StepperInput, StepperOutput, TimeSlot, TurbineId, TurbineRecord,
};
use aerolink_restart::{
    history_path, Checkpoint, HistoryHeader, HistoryReader, HistoryWriter, SubstepDrive,
    TurbineDims,
};

use crate::error::CouplingError;
use crate::ring::FieldRing;

/// Attach the turbine and phase to a solver status.
pub(crate) fn solver_call<T>(
    turbine: TurbineId,
    phase: Phase,
    result: Result<T, SolverStatus>,
) -> Result<T, CouplingError> {
    result.map_err(|status| CouplingError::Solver {
        turbine,
        phase,
        status,
    })
}

/// Run-wide time stepping parameters handed to per-turbine operations.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Clock {
    pub(crate) dt_driver: f64,
    pub(crate) dt_solver: f64,
    pub(crate) n_substeps: u32,
}

impl Clock {
    /// Time of substep `k` (1-based) of the step starting at `t_n`.
    fn substep_time(&self, t_n: f64, k: u32) -> f64 {
        t_n + f64::from(k) * self.dt_solver
    }

    fn fraction(&self, k: u32) -> f64 {
        f64::from(k) / f64::from(self.n_substeps)
    }
}

pub(crate) struct TurbineState {
    pub(crate) id: TurbineId,
    pub(crate) record: TurbineRecord,
    pub(crate) vel_layout: NodeLayout,
    pub(crate) force_layout: NodeLayout,
    pub(crate) stepper: Option<Box<dyn ExternalStepper>>,
    pub(crate) ring: FieldRing,
    pub(crate) fsi: Option<BrFsiData>,
    pub(crate) residuals: FieldResiduals,
    pub(crate) fsi_residuals: BrFsiResiduals,
    prev_iterate: NodeFields,
    prev_fsi: Option<BrFsiData>,
    vel_in: Vec<f64>,
    history: Option<HistoryWriter<BufWriter<File>>>,
    replay: Option<HistoryReader>,
}

impl TurbineState {
    pub(crate) fn new(id: TurbineId, record: TurbineRecord) -> Self {
        let vel_layout = record.vel_layout();
        let force_layout = record.force_layout();
        let (n_vel, n_force) = (vel_layout.len(), force_layout.len());
        let fsi = (record.sim_type == SimType::ExtLoads).then(|| {
            BrFsiData::new(
                record.num_blades as usize,
                record.total_br_fsi_pts_blade(),
                record.br_fsi_pts_twr as usize,
            )
        });
        Self {
            id,
            vel_layout,
            force_layout,
            stepper: None,
            ring: FieldRing::new(n_vel, n_force),
            prev_fsi: fsi.clone(),
            fsi,
            residuals: FieldResiduals::default(),
            fsi_residuals: BrFsiResiduals::default(),
            prev_iterate: NodeFields::new(n_vel, n_force),
            vel_in: vec![0.0; 3 * n_vel],
            history: None,
            replay: None,
            record,
        }
    }

    pub(crate) fn dims(&self) -> TurbineDims {
        TurbineDims::from_record(self.id, &self.record)
    }

    // ── Setup ──────────────────────────────────────────────────────

    pub(crate) fn init_stepper(
        &mut self,
        dt: f64,
        t_start: f64,
        t_max: f64,
        start: StartType,
        restart_handle: Option<&str>,
    ) -> Result<(), CouplingError> {
        let Some(stepper) = self.stepper.as_mut() else {
            return Ok(());
        };
        let init = StepperInit {
            turbine: self.id,
            record: &self.record,
            dt,
            t_start,
            t_max,
            start,
            restart_handle,
        };
        solver_call(self.id, Phase::Init, stepper.init(&init))
    }

    /// Install the ring from a checkpoint; returns the solver handle.
    pub(crate) fn restore(&mut self, ckpt: Checkpoint) -> Result<String, ConfigError> {
        ckpt.dims.ensure_matches(&self.dims())?;
        self.ring = FieldRing::from_ordered(ckpt.slots, ckpt.history_depth);
        Ok(ckpt.solver_handle)
    }

    pub(crate) fn open_replay(&mut self) -> Result<(), CouplingError> {
        let path = history_path(&self.record.out_file_root);
        let header = HistoryReader::read_header(&path)?;
        let expected = self.history_header();
        for (what, recorded, current) in [
            ("turbine", header.turbine.0, expected.turbine.0),
            ("n_vel", header.n_vel, expected.n_vel),
        ] {
            if recorded != current {
                return Err(ConfigError::RestartDimensionMismatch {
                    turbine: self.id,
                    what,
                    recorded: u64::from(recorded),
                    current: u64::from(current),
                }
                .into());
            }
        }
        self.replay = Some(HistoryReader::open(&path)?);
        Ok(())
    }

    pub(crate) fn open_history(&mut self, append: bool) -> Result<(), CouplingError> {
        let path = history_path(&self.record.out_file_root);
        let header = self.history_header();
        let writer = if append {
            HistoryWriter::append_to(&path, header)?
        } else {
            HistoryWriter::create(&path, header)?
        };
        self.history = Some(writer);
        Ok(())
    }

    fn history_header(&self) -> HistoryHeader {
        HistoryHeader {
            turbine: self.id,
            n_vel: self.record.num_vel_pts,
        }
    }

    // ── Solver calls ───────────────────────────────────────────────

    pub(crate) fn solution0(&mut self) -> Result<(), CouplingError> {
        if let Some(stepper) = self.stepper.as_mut() {
            solver_call(self.id, Phase::Solution0, stepper.solution0())?;
        }
        self.pull_output()?;
        self.ring.seed_all_from_np1();
        self.prev_iterate.copy_from(self.ring.get(TimeSlot::Np1));
        Ok(())
    }

    /// Solver predictor, then n+1 from the solver (single substep) or
    /// from extrapolation.
    pub(crate) fn prework(&mut self, time: f64, n_substeps: u32) -> Result<(), CouplingError> {
        if let Some(stepper) = self.stepper.as_mut() {
            solver_call(self.id, Phase::Predict, stepper.predict(time))?;
        }
        if n_substeps == 1 {
            self.pull_output()
        } else {
            self.ring.extrapolate_np1();
            Ok(())
        }
    }

    fn rewind(&mut self) -> Result<(), CouplingError> {
        match self.stepper.as_mut() {
            Some(stepper) => solver_call(self.id, Phase::Rewind, stepper.rewind()),
            None => Ok(()),
        }
    }

    /// One solver substep ending at `time`. With a `fraction`, the sent
    /// velocity is interpolated between n and n+1; without, n+1 is held.
    pub(crate) fn advance_substep(
        &mut self,
        time: f64,
        fraction: Option<f64>,
    ) -> Result<(), CouplingError> {
        let Some(stepper) = self.stepper.as_mut() else {
            return Ok(());
        };
        fill_input_velocity(&self.ring, fraction, &mut self.vel_in);
        let input = StepperInput {
            time,
            vel: &self.vel_in,
            loads: self.fsi.as_ref().map(|f| LoadsInput {
                twr_ld: &f.twr_ld,
                bld_ld: &f.bld_ld,
            }),
        };
        solver_call(self.id, Phase::Advance, stepper.advance(&input))
    }

    /// Pull the solver's current solution into n+1.
    pub(crate) fn pull_output(&mut self) -> Result<(), CouplingError> {
        let Some(stepper) = self.stepper.as_mut() else {
            return Ok(());
        };
        let mut out = StepperOutput {
            nodes: self.ring.get_mut(TimeSlot::Np1),
            fsi: self.fsi.as_mut(),
        };
        solver_call(self.id, Phase::Output, stepper.output(&mut out))?;
        self.apply_nacelle_drag();
        Ok(())
    }

    fn apply_nacelle_drag(&mut self) {
        let r = &self.record;
        if r.nacelle_cd <= 0.0 {
            return;
        }
        let np1 = self.ring.get_mut(TimeSlot::Np1);
        let u = np1.node(FieldKind::VelForce, NodeLayout::HUB);
        let drag = calc_nacelle_force(u, r.nacelle_cd, r.nacelle_area, r.air_density);
        let f = np1.node(FieldKind::Force, NodeLayout::HUB);
        np1.set_node(
            FieldKind::Force,
            NodeLayout::HUB,
            [f[0] + drag[0], f[1] + drag[1], f[2] + drag[2]],
        );
    }

    fn interpolated_substeps(
        &mut self,
        rewind: bool,
        t_n: f64,
        clock: Clock,
    ) -> Result<(), CouplingError> {
        if rewind {
            self.rewind()?;
        }
        for k in 1..=clock.n_substeps {
            self.advance_substep(clock.substep_time(t_n, k), Some(clock.fraction(k)))?;
        }
        self.pull_output()
    }

    fn held_substeps(&mut self, t_n: f64, clock: Clock) -> Result<(), CouplingError> {
        for k in 1..=clock.n_substeps {
            self.advance_substep(clock.substep_time(t_n, k), None)?;
            self.pull_output()?;
        }
        Ok(())
    }

    fn fraction_substep(&mut self, t_n: f64, s: f64, clock: Clock) -> Result<(), CouplingError> {
        self.advance_substep(t_n + s * clock.dt_driver, Some(s))?;
        self.pull_output()
    }

    /// One nonlinear iteration over the whole driver step, recorded under
    /// `key`. `rewind` is set on every iteration after the first.
    pub(crate) fn nonlinear_iteration(
        &mut self,
        step: u64,
        key: u32,
        rewind: bool,
        t_n: f64,
        clock: Clock,
    ) -> Result<(), CouplingError> {
        self.record_history(step, key, SubstepDrive::Interpolated)?;
        self.prev_iterate.copy_from(self.ring.get(TimeSlot::Np1));
        self.prev_fsi.clone_from(&self.fsi);
        self.interpolated_substeps(rewind, t_n, clock)?;
        self.residuals = FieldResiduals::between(&self.prev_iterate, self.ring.get(TimeSlot::Np1));
        if let (Some(prev), Some(cur)) = (&self.prev_fsi, &self.fsi) {
            self.fsi_residuals = BrFsiResiduals::between(prev, cur);
        }
        Ok(())
    }

    /// Every substep holds the n+1 velocity; results are pulled after each.
    pub(crate) fn held_step(&mut self, step: u64, t_n: f64, clock: Clock) -> Result<(), CouplingError> {
        self.record_history(step, 0, SubstepDrive::Held)?;
        self.held_substeps(t_n, clock)
    }

    /// A single driver-issued substep ending at fraction `s` of the step.
    pub(crate) fn fractional_step(
        &mut self,
        step: u64,
        key: u32,
        s: f64,
        t_n: f64,
        clock: Clock,
    ) -> Result<(), CouplingError> {
        self.record_history(step, key, SubstepDrive::Fraction(s))?;
        self.fraction_substep(t_n, s, clock)
    }

    /// Re-run steps `1..=last_step` from the recorded velocity history,
    /// driving every recorded sample the way it was driven when recorded.
    ///
    /// Steps are timed from zero. The reader is released afterwards.
    pub(crate) fn replay(&mut self, last_step: u64, clock: Clock) -> Result<(), CouplingError> {
        let Some(reader) = self.replay.take() else {
            return Ok(());
        };
        for step in 1..=last_step {
            let t_n = (step - 1) as f64 * clock.dt_driver;
            self.prework(t_n + clock.dt_driver, clock.n_substeps)?;
            let mut iterated = false;
            for key in 0..reader.nlin_iters(step).max(1) {
                let rec = reader.record(step, key)?;
                self.ring
                    .get_mut(TimeSlot::Np1)
                    .vel_vel
                    .copy_from_slice(&rec.vel_vel);
                match rec.drive {
                    SubstepDrive::Interpolated => {
                        self.interpolated_substeps(iterated, t_n, clock)?;
                        iterated = true;
                    }
                    SubstepDrive::Held => self.held_substeps(t_n, clock)?,
                    SubstepDrive::Fraction(s) => self.fraction_substep(t_n, s, clock)?,
                }
            }
            self.ring.advance();
        }
        Ok(())
    }

    // ── Persistence ────────────────────────────────────────────────

    fn record_history(
        &mut self,
        step: u64,
        key: u32,
        drive: SubstepDrive,
    ) -> Result<(), CouplingError> {
        if let Some(w) = self.history.as_mut() {
            let np1 = self.ring.get(TimeSlot::Np1);
            w.append(step, key, drive, &np1.x_vel, &np1.vel_vel)?;
        }
        Ok(())
    }

    pub(crate) fn flush_history(&mut self) -> Result<(), CouplingError> {
        if let Some(w) = self.history.as_mut() {
            w.flush()?;
        }
        Ok(())
    }

    pub(crate) fn checkpoint(&mut self, step: StepId) -> Result<Checkpoint, CouplingError> {
        let solver_handle = match self.stepper.as_mut() {
            Some(s) => solver_call(self.id, Phase::Checkpoint, s.checkpoint(step))?,
            None => String::new(),
        };
        Ok(Checkpoint {
            dims: self.dims(),
            step,
            history_depth: self.ring.depth(),
            solver_handle,
            slots: self.ring.to_ordered(),
        })
    }

    /// Release the solver and flush the history. Both are attempted; the
    /// first failure is returned.
    pub(crate) fn end(&mut self) -> Result<(), CouplingError> {
        let mut first = None;
        if let Some(mut stepper) = self.stepper.take() {
            if let Err(e) = solver_call(self.id, Phase::End, stepper.end()) {
                first = Some(e);
            }
        }
        if let Some(mut w) = self.history.take() {
            if let Err(e) = w.flush() {
                first.get_or_insert(e.into());
            }
        }
        first.map_or(Ok(()), Err)
    }

    // ── Derived quantities ─────────────────────────────────────────

    /// Unit shaft direction at `slot`: the hub orientation applied to x.
    pub(crate) fn hub_shaft_dir(&self, slot: TimeSlot) -> [f64; 3] {
        let c = self.ring.get(slot).node(FieldKind::OrientForce, NodeLayout::HUB);
        apply_dcm_rotation(&wm_to_dcm(c), [1.0, 0.0, 0.0], true)
    }

    /// Rotor torque and thrust at `slot`, summed over the blade force
    /// nodes. Torque is taken about the shaft axis through the hub.
    pub(crate) fn torque_thrust(&self, slot: TimeSlot) -> ([f64; 3], [f64; 3]) {
        let fields = self.ring.get(slot);
        let hub = fields.node(FieldKind::XForce, NodeLayout::HUB);
        let e = self.hub_shaft_dir(slot);
        let mut torque = [0.0; 3];
        let mut thrust = [0.0; 3];
        for b in 0..self.force_layout.n_blades() {
            for i in self.force_layout.blade_range(b) {
                let x = fields.node(FieldKind::XForce, i);
                let f = fields.node(FieldKind::Force, i);
                let r = [x[0] - hub[0], x[1] - hub[1], x[2] - hub[2]];
                let along = dot(r, e);
                let r_perp = [r[0] - along * e[0], r[1] - along * e[1], r[2] - along * e[2]];
                let m = cross(r_perp, f);
                for k in 0..3 {
                    torque[k] += m[k];
                    thrust[k] += f[k];
                }
            }
        }
        (torque, thrust)
    }

    /// Thrust and torque at `slot` projected on the shaft axis.
    pub(crate) fn shaft_loads(&self, slot: TimeSlot) -> (f64, f64) {
        let (torque, thrust) = self.torque_thrust(slot);
        let e = self.hub_shaft_dir(slot);
        (dot(thrust, e), dot(torque, e))
    }
}

fn fill_input_velocity(ring: &FieldRing, fraction: Option<f64>, out: &mut [f64]) {
    let np1 = &ring.get(TimeSlot::Np1).vel_vel;
    match fraction {
        None => out.copy_from_slice(np1),
        Some(s) => {
            let n = &ring.get(TimeSlot::N).vel_vel;
            for (o, (a, b)) in out.iter_mut().zip(n.iter().zip(np1)) {
                *o = a + s * (b - a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerolink_test_utils::fixtures::turbine_record;
    use approx::assert_relative_eq;

    #[test]
    fn fsi_allocated_only_for_blade_resolved_coupling() {
        let t = TurbineState::new(TurbineId(0), turbine_record(0));
        assert!(t.fsi.is_none());
        let mut r = turbine_record(1);
        r.sim_type = SimType::ExtLoads;
        r.br_fsi_pts_blade = [5, 5, 5].into_iter().collect();
        r.br_fsi_pts_twr = 4;
        let t = TurbineState::new(TurbineId(1), r);
        let fsi = t.fsi.as_ref().unwrap();
        assert_eq!(fsi.n_blade_pts(), 15);
        assert_eq!(fsi.n_twr_pts(), 4);
    }

    #[test]
    fn input_velocity_interpolates_in_time() {
        let mut ring = FieldRing::new(1, 1);
        ring.get_mut(TimeSlot::N).vel_vel.copy_from_slice(&[1.0, 2.0, 3.0]);
        ring.get_mut(TimeSlot::Np1).vel_vel.copy_from_slice(&[3.0, 2.0, 1.0]);
        let mut out = [0.0; 3];
        fill_input_velocity(&ring, Some(0.25), &mut out);
        assert_eq!(out, [1.5, 2.0, 2.5]);
        fill_input_velocity(&ring, None, &mut out);
        assert_eq!(out, [3.0, 2.0, 1.0]);
    }

    #[test]
    fn thrust_sums_blade_forces_and_torque_uses_lever_arm() {
        let mut t = TurbineState::new(TurbineId(0), turbine_record(0));
        let layout = t.force_layout.clone();
        let np1 = t.ring.get_mut(TimeSlot::Np1);
        // Shaft along x, hub at the origin, one unit tangential force per
        // blade node at radius 2 in the y-z plane.
        for b in 0..layout.n_blades() {
            for i in layout.blade_range(b) {
                np1.set_node(FieldKind::XForce, i, [0.5, 0.0, 2.0]);
                np1.set_node(FieldKind::Force, i, [1.0, 1.0, 0.0]);
            }
        }
        let n_blade_nodes = (layout.n_blades() * layout.per_blade()) as f64;
        let (torque, thrust) = t.torque_thrust(TimeSlot::Np1);
        assert_relative_eq!(thrust[0], n_blade_nodes);
        assert_relative_eq!(thrust[1], n_blade_nodes);
        // r_perp = (0, 0, 2); (0, 0, 2) x (1, 1, 0) = (-2, 2, 0)
        assert_relative_eq!(torque[0], -2.0 * n_blade_nodes);
        assert_relative_eq!(torque[1], 2.0 * n_blade_nodes);
        assert_relative_eq!(torque[2], 0.0);
    }

    #[test]
    fn identity_orientation_points_shaft_along_x() {
        let t = TurbineState::new(TurbineId(0), turbine_record(0));
        let e = t.hub_shaft_dir(TimeSlot::N);
        assert_relative_eq!(e[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(e[1], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn shaft_loads_follow_a_yawed_hub() {
        let mut t = TurbineState::new(TurbineId(0), turbine_record(0));
        let layout = t.force_layout.clone();
        // Quarter turn about z.
        let c = [0.0, 0.0, 4.0 * (std::f64::consts::PI / 8.0).tan()];
        for slot in TimeSlot::ALL {
            t.ring
                .get_mut(slot)
                .set_node(FieldKind::OrientForce, NodeLayout::HUB, c);
        }
        let e = t.hub_shaft_dir(TimeSlot::N);
        assert_relative_eq!(e[0], 0.0, epsilon = 1e-12);
        let at_n = t.ring.get_mut(TimeSlot::N);
        for b in 0..layout.n_blades() {
            for i in layout.blade_range(b) {
                at_n.set_node(FieldKind::Force, i, e);
            }
        }
        let n_blade_nodes = (layout.n_blades() * layout.per_blade()) as f64;
        let (thrust, torque) = t.shaft_loads(TimeSlot::N);
        assert_relative_eq!(thrust, n_blade_nodes, epsilon = 1e-9);
        assert_relative_eq!(torque, 0.0, epsilon = 1e-9);
        assert_relative_eq!(t.torque_thrust(TimeSlot::N).1[0], 0.0, epsilon = 1e-9);
    }
}
