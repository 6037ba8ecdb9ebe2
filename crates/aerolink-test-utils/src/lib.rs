//! Test utilities and mock solvers for Aerolink development.
//!
//! Provides [`MockStepper`], a deterministic stand-in for a turbine
//! solver whose whole state survives a checkpoint handle, shared
//! [`CallCounts`] to observe which solver calls were made, and record
//! fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aerolink_core::{
    ExternalStepper, FieldKind, NodeLayout, SolverStatus, Span, StepId, StepperInit, StepperInput,
    StepperOutput, TurbineId, TurbineRecord,
};

/// Counters of every stepper call, shared by all steppers of a factory.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub created: AtomicUsize,
    pub init: AtomicUsize,
    pub solution0: AtomicUsize,
    pub predict: AtomicUsize,
    pub advance: AtomicUsize,
    pub rewind: AtomicUsize,
    pub output: AtomicUsize,
    pub checkpoint: AtomicUsize,
    pub end: AtomicUsize,
}

impl CallCounts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Sum of every counter.
    pub fn total(&self) -> usize {
        [
            &self.created,
            &self.init,
            &self.solution0,
            &self.predict,
            &self.advance,
            &self.rewind,
            &self.output,
            &self.checkpoint,
            &self.end,
        ]
        .iter()
        .map(|c| Self::get(c))
        .sum()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn norm_from(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2) + (b[2] - a[2]).powi(2)).sqrt()
}

/// Deterministic mock solver.
///
/// The state is a time and an accumulator. Every substep folds the sent
/// velocities (and loads) into the accumulator; every output derives node
/// positions, velocities and forces from it. `predict` saves the state and
/// `rewind` restores it, so nonlinear re-iterations are reproducible. The
/// checkpoint handle encodes the exact bits of the state.
pub struct MockStepper {
    turbine: TurbineId,
    counts: Arc<CallCounts>,
    n_vel: usize,
    force_layout: NodeLayout,
    hub_pos: [f64; 3],
    base_pos: [f64; 3],
    t: f64,
    acc: f64,
    committed: (f64, f64),
    fail_advance_at: Option<usize>,
    advances: usize,
}

impl MockStepper {
    pub fn new(turbine: TurbineId, record: &TurbineRecord, counts: Arc<CallCounts>) -> Self {
        Self {
            turbine,
            counts,
            n_vel: record.num_vel_pts as usize,
            force_layout: record.force_layout(),
            hub_pos: record.hub_pos,
            base_pos: record.base_pos,
            t: 0.0,
            acc: 0.0,
            committed: (0.0, 0.0),
            fail_advance_at: None,
            advances: 0,
        }
    }

    /// Fail the `n`-th advance (1-based) of this stepper.
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_advance_at = Some(n);
        self
    }

    pub fn accumulator(&self) -> f64 {
        self.acc
    }

    /// Undeflected position of force node `i`: blades radiate from the hub
    /// in the rotor plane, one metre per node; the tower rises from the
    /// base to just below the hub.
    fn reference_position(&self, i: usize) -> [f64; 3] {
        let hub = self.hub_pos;
        let layout = &self.force_layout;
        match layout.span_of(i) {
            Some(Span::Blade(b)) => {
                let r = (1 + i - layout.blade_range(b).start) as f64;
                let theta = std::f64::consts::TAU * f64::from(b) / f64::from(layout.n_blades());
                [hub[0], hub[1] + r * theta.sin(), hub[2] + r * theta.cos()]
            }
            Some(Span::Tower) => {
                let k = (i - layout.tower_range().start) as f64;
                let h = (hub[2] - self.base_pos[2]) * k / f64::from(layout.tower().max(1));
                [self.base_pos[0], self.base_pos[1], self.base_pos[2] + h]
            }
            Some(Span::Hub) | None => hub,
        }
    }

    fn parse_handle(handle: &str) -> Option<(f64, f64)> {
        let mut parts = handle.split(':').skip(1);
        let t = u64::from_str_radix(parts.next()?, 16).ok()?;
        let acc = u64::from_str_radix(parts.next()?, 16).ok()?;
        Some((f64::from_bits(t), f64::from_bits(acc)))
    }
}

impl ExternalStepper for MockStepper {
    fn init(&mut self, init: &StepperInit<'_>) -> Result<(), SolverStatus> {
        bump(&self.counts.init);
        self.t = init.t_start;
        if let Some(handle) = init.restart_handle {
            let (t, acc) = Self::parse_handle(handle)
                .ok_or_else(|| SolverStatus::new(10, format!("bad restart handle {handle:?}")))?;
            self.t = t;
            self.acc = acc;
        }
        self.committed = (self.t, self.acc);
        Ok(())
    }

    fn solution0(&mut self) -> Result<(), SolverStatus> {
        bump(&self.counts.solution0);
        self.acc = 1.0 + f64::from(self.turbine.0);
        self.committed = (self.t, self.acc);
        Ok(())
    }

    fn predict(&mut self, _time: f64) -> Result<(), SolverStatus> {
        bump(&self.counts.predict);
        self.committed = (self.t, self.acc);
        Ok(())
    }

    fn advance(&mut self, input: &StepperInput<'_>) -> Result<(), SolverStatus> {
        bump(&self.counts.advance);
        self.advances += 1;
        if self.fail_advance_at == Some(self.advances) {
            return Err(SolverStatus::new(
                7,
                format!("turbine {} diverged at t = {}", self.turbine, input.time),
            ));
        }
        if input.vel.len() != 3 * self.n_vel {
            return Err(SolverStatus::new(3, "velocity input has the wrong length"));
        }
        let mean_u = input.vel.iter().step_by(3).sum::<f64>() / self.n_vel.max(1) as f64;
        let loads = input
            .loads
            .map(|l| l.bld_ld.iter().chain(l.twr_ld).sum::<f64>())
            .unwrap_or(0.0);
        self.t = input.time;
        self.acc = 0.9 * self.acc + 0.01 * mean_u + 1e-4 * loads + 0.05;
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), SolverStatus> {
        bump(&self.counts.rewind);
        (self.t, self.acc) = self.committed;
        Ok(())
    }

    fn output(&mut self, out: &mut StepperOutput<'_>) -> Result<(), SolverStatus> {
        bump(&self.counts.output);
        let nodes = &mut *out.nodes;
        let hub = self.hub_pos;
        let defl = 1e-3 * self.acc;
        for i in 0..nodes.n_force() {
            let xref = self.reference_position(i);
            let r = norm_from(hub, xref);
            nodes.set_node(FieldKind::XRefForce, i, xref);
            nodes.set_node(FieldKind::XForce, i, [xref[0] + defl * r, xref[1], xref[2]]);
            nodes.set_node(FieldKind::XdotForce, i, [0.1 * defl, 0.0, 0.0]);
            nodes.set_node(FieldKind::OrientForce, i, [0.0, 0.0, 0.0]);
            nodes.set_node(FieldKind::Force, i, [self.acc, 0.1 * self.acc * r, 0.0]);
        }
        for j in 0..nodes.n_vel() {
            nodes.set_node(FieldKind::XVel, j, [hub[0] + defl, hub[1], hub[2] + j as f64]);
            nodes.set_node(FieldKind::XdotVel, j, [0.1 * defl, 0.0, 0.0]);
        }
        if let Some(fsi) = out.fsi.as_deref_mut() {
            fsi.bld_def.fill(defl);
            fsi.twr_def.fill(0.5 * defl);
        }
        Ok(())
    }

    fn checkpoint(&mut self, step: StepId) -> Result<String, SolverStatus> {
        bump(&self.counts.checkpoint);
        Ok(format!(
            "{}:{:016x}:{:016x}",
            step,
            self.t.to_bits(),
            self.acc.to_bits()
        ))
    }

    fn end(&mut self) -> Result<(), SolverStatus> {
        bump(&self.counts.end);
        Ok(())
    }
}

/// A factory closure creating [`MockStepper`]s that share `counts`.
pub fn mock_factory(
    counts: Arc<CallCounts>,
) -> impl FnMut(TurbineId, &TurbineRecord) -> Result<Box<dyn ExternalStepper>, SolverStatus> {
    move |turbine, record| {
        bump(&counts.created);
        Ok(Box::new(MockStepper::new(turbine, record, counts.clone())) as Box<dyn ExternalStepper>)
    }
}

/// Like [`mock_factory`], but the stepper of `failing` fails its
/// `at`-th advance.
pub fn failing_factory(
    counts: Arc<CallCounts>,
    failing: TurbineId,
    at: usize,
) -> impl FnMut(TurbineId, &TurbineRecord) -> Result<Box<dyn ExternalStepper>, SolverStatus> {
    move |turbine, record| {
        bump(&counts.created);
        let stepper = MockStepper::new(turbine, record, counts.clone());
        let stepper = if turbine == failing {
            stepper.failing_at(at)
        } else {
            stepper
        };
        Ok(Box::new(stepper) as Box<dyn ExternalStepper>)
    }
}
