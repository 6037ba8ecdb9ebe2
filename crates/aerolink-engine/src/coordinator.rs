//! The time-integration coordinator.
//!
//! [`Coordinator`] is the driver-facing API. One coordinator lives on every
//! rank of the world communicator; it owns the steppers and field rings of
//! the turbines assigned to its rank and advances them in lock-step with
//! the flow driver.
//!
//! # Call sequence
//!
//! ```text
//! new ─▶ init ─▶ solution0 ─▶ ┌ prework ─▶ update_states_driver_time_step* ─▶ advance_to_next_driver_time_step ┐
//!                             └─────────────────────── or step() ───────────────────────────────────────────────┘ ─▶ end
//! ```
//!
//! Between `prework` and the advance, the driver samples the predicted
//! n+1 node positions, pushes velocities into n+1, and may iterate
//! `update_states_driver_time_step` (nonlinear coupling) or issue single
//! substeps with `step_fraction`.
//!
//! # Failure
//!
//! Every fallible operation finishes with an agreement over the group of
//! turbine-owning ranks: if any rank failed, every rank returns an error
//! for the same step (the failing one its own, the others
//! [`CouplingError::PeerFailed`]) and the coordinator moves to
//! [`CoordinatorState::Failed`]. Only [`end`](Coordinator::end) remains
//! callable.

use std::fmt;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use aerolink_comm::{Communicator, FastGroup, TurbineAssignment};
use aerolink_core::{
    ConfigError, FieldKind, NodeLayout, Phase, Rank, StartType, StepId, StepperFactory, TimeSlot,
    TurbineId,
};
use aerolink_interp::ForceToVelInterpolator;
use aerolink_restart::{checkpoint_path, read_checkpoint, write_checkpoint};

use crate::config::CouplingConfig;
use crate::error::CouplingError;
use crate::metrics::StepMetrics;
use crate::turbine::{solver_call, Clock, TurbineState};

// ── CoordinatorState ───────────────────────────────────────────────

/// Where the coordinator is in its call sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    /// Created; waiting for `init`.
    Uninitialized,
    /// Steppers created and initialised; waiting for `solution0`.
    Initialized,
    /// Between driver steps.
    Ready,
    /// n+1 predicted; waiting for substeps.
    Prework,
    /// At least one substep or nonlinear iteration done.
    Substepped,
    /// `end` has run.
    Terminated,
    /// A rank failed; only `end` is valid.
    Failed,
}

// ── Coordinator ────────────────────────────────────────────────────

/// Coupling coordinator for the turbines of one rank.
///
/// # Example
///
/// ```ignore
/// let mut c = Coordinator::new(config, Box::new(SelfComm))?;
/// c.init(&mut factory)?;
/// c.solution0()?;
/// while c.time_at(TimeSlot::N) < t_end {
///     c.prework()?;
///     // driver samples positions, sets velocities
///     c.update_states_driver_time_step()?;
///     c.advance_to_next_driver_time_step()?;
/// }
/// c.end()?;
/// ```
pub struct Coordinator {
    config: CouplingConfig,
    world: Box<dyn Communicator>,
    assignment: TurbineAssignment,
    group: FastGroup,
    state: CoordinatorState,
    pub(crate) turbines: Vec<TurbineState>,
    n_substeps: u32,
    nt_start: StepId,
    nt: StepId,
    nlin_iter: u32,
    /// History records written so far in the current driver step.
    history_seq: u32,
    pub(crate) interp: ForceToVelInterpolator,
    metrics: StepMetrics,
    step_clock: Option<Instant>,
}

fn elapsed_us(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}

impl Coordinator {
    /// Validate `config`, partition the turbines over `world`, and build
    /// the group of turbine-owning ranks.
    ///
    /// Collective over `world`: every rank must call it, including ranks
    /// that end up owning no turbine.
    pub fn new(
        config: CouplingConfig,
        mut world: Box<dyn Communicator>,
    ) -> Result<Self, CouplingError> {
        config.validate()?;
        let n_ranks = world.size() as u32;
        let my_rank = Rank(world.rank() as u32);
        let assignment = if config.placement.is_empty() {
            TurbineAssignment::round_robin(config.n_turbines(), n_ranks, my_rank)?
        } else {
            TurbineAssignment::from_explicit(
                &config.placement,
                config.n_turbines(),
                n_ranks,
                my_rank,
            )?
        };
        let group = FastGroup::build(world.as_mut(), &assignment)?;
        info!(
            rank = my_rank.0,
            local_turbines = assignment.n_local(),
            turbines = assignment.n_turbines(),
            dry_run = config.dry_run,
            "coordinator created"
        );
        Ok(Self {
            config,
            world,
            assignment,
            group,
            state: CoordinatorState::Uninitialized,
            turbines: Vec::new(),
            n_substeps: 0,
            nt_start: StepId(0),
            nt: StepId(0),
            nlin_iter: 0,
            history_seq: 0,
            interp: ForceToVelInterpolator::new(),
            metrics: StepMetrics::default(),
            step_clock: None,
        })
    }

    // ── Overrides ──────────────────────────────────────────────────

    /// Replace the driver time step. Only valid before `init`.
    pub fn set_driver_time_step(&mut self, dt_driver: f64) -> Result<(), CouplingError> {
        self.expect_state("set_driver_time_step", &[CoordinatorState::Uninitialized])?;
        if !dt_driver.is_finite() || dt_driver <= 0.0 {
            return Err(ConfigError::InvalidTime {
                name: "dt_driver",
                value: dt_driver,
            }
            .into());
        }
        self.config.dt_driver = dt_driver;
        Ok(())
    }

    /// Replace the checkpoint cadence (zero disables). Only valid before
    /// `init`.
    pub fn set_driver_checkpoint(&mut self, restart_freq: u64) -> Result<(), CouplingError> {
        self.expect_state("set_driver_checkpoint", &[CoordinatorState::Uninitialized])?;
        self.config.restart_freq = restart_freq;
        Ok(())
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Compute the substep count, create and initialise one stepper per
    /// local turbine, and restore or open the restart files the start mode
    /// needs.
    ///
    /// Under dry run no stepper is created and no file is touched.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NonIntegerSubsteps`] if `dt_driver / dt_solver` is not
    /// an integer, restart problems as [`CouplingError::Persistence`] or
    /// [`CouplingError::Config`], and solver failures.
    pub fn init(&mut self, factory: &mut dyn StepperFactory) -> Result<(), CouplingError> {
        self.expect_state("init", &[CoordinatorState::Uninitialized])?;
        let mut local = self.init_local(factory);
        if self.config.start_type == StartType::TrueRestart {
            let synced = self.agree_restart_step(local.is_ok());
            local = local.and(synced);
        }
        self.agree(local)?;
        self.state = CoordinatorState::Initialized;
        info!(
            rank = self.world.rank(),
            start = ?self.config.start_type,
            n_substeps = self.n_substeps,
            step = self.nt.0,
            "coupling initialised"
        );
        Ok(())
    }

    fn init_local(&mut self, factory: &mut dyn StepperFactory) -> Result<(), CouplingError> {
        self.n_substeps = self.config.substep_count()?;
        self.nt_start = StepId(self.config.start_step());
        self.nt = self.nt_start;
        let dry_run = self.config.dry_run;
        let ids: Vec<TurbineId> = self.assignment.local_turbines().collect();
        for id in ids {
            let mut turbine = TurbineState::new(id, self.config.turbines[id.index()].clone());
            let mut handle = None;
            if !dry_run {
                handle = self.prepare_files(&mut turbine)?;
                let stepper = factory.create(id, &turbine.record);
                turbine.stepper = Some(solver_call(id, Phase::Create, stepper)?);
            }
            self.turbines.push(turbine);
            if let Some(turbine) = self.turbines.last_mut() {
                turbine.init_stepper(
                    self.config.dt_solver,
                    self.config.t_start,
                    self.config.t_max,
                    self.config.start_type,
                    handle.as_deref(),
                )?;
            }
        }
        Ok(())
    }

    /// Make every rank resume from the same checkpointed step.
    ///
    /// Collective over the world: ranks that restored turbines contribute
    /// their step, the others adopt the latest one.
    fn agree_restart_step(&mut self, restored: bool) -> Result<(), CouplingError> {
        let owns = restored && !self.turbines.is_empty();
        let (latest, complement) = if owns {
            (self.nt.0, u64::MAX - self.nt.0)
        } else {
            (0, 0)
        };
        let latest = self.world.all_reduce_max(latest)?;
        let earliest = u64::MAX - self.world.all_reduce_max(complement)?;
        if earliest < latest {
            return Err(ConfigError::RestartStepMismatch { earliest, latest }.into());
        }
        if !owns {
            self.nt_start = StepId(latest);
            self.nt = self.nt_start;
        }
        Ok(())
    }

    /// Restore or open the restart files of one turbine. Returns the
    /// solver checkpoint handle on a true restart.
    fn prepare_files(&mut self, turbine: &mut TurbineState) -> Result<Option<String>, CouplingError> {
        let mut handle = None;
        match self.config.start_type {
            StartType::Init => {}
            StartType::TrueRestart => {
                let ckpt = read_checkpoint(&checkpoint_path(&turbine.record.out_file_root))?;
                let step = ckpt.step;
                handle = Some(turbine.restore(ckpt)?);
                if self.turbines.is_empty() {
                    if step != self.nt_start {
                        warn!(
                            turbine = %turbine.id,
                            checkpoint_step = step.0,
                            requested_step = self.nt_start.0,
                            "resuming from the checkpointed step, not t_start"
                        );
                    }
                    self.nt_start = step;
                    self.nt = step;
                } else if step != self.nt {
                    return Err(ConfigError::RestartDimensionMismatch {
                        turbine: turbine.id,
                        what: "step",
                        recorded: step.0,
                        current: self.nt.0,
                    }
                    .into());
                }
            }
            StartType::RestartDriverInitFast => turbine.open_replay()?,
        }
        if self.config.record_velocity_history {
            turbine.open_history(self.config.start_type != StartType::Init)?;
        }
        Ok(handle)
    }

    /// Zeroth solution: every slot is seeded from the solver's initial
    /// output. A driver-initialised restart then replays the recorded
    /// velocity history up to the restart step. A true restart already has
    /// its slots and only changes state.
    pub fn solution0(&mut self) -> Result<(), CouplingError> {
        self.expect_state("solution0", &[CoordinatorState::Initialized])?;
        let local = self.solution0_local();
        self.agree(local)?;
        self.state = CoordinatorState::Ready;
        info!(
            rank = self.world.rank(),
            step = self.nt.0,
            time = self.time_at(TimeSlot::N),
            "initial solution ready"
        );
        Ok(())
    }

    fn solution0_local(&mut self) -> Result<(), CouplingError> {
        let start = self.config.start_type;
        if start == StartType::TrueRestart {
            return Ok(());
        }
        let clock = self.clock();
        let started = Instant::now();
        for t in &mut self.turbines {
            t.solution0()?;
            if start == StartType::RestartDriverInitFast {
                t.replay(self.nt_start.0, clock)?;
            }
        }
        self.metrics.solver_us += elapsed_us(started);
        Ok(())
    }

    // ── Driver step ────────────────────────────────────────────────

    /// Run the solver predictor and predict n+1.
    ///
    /// With a single substep per driver step the solver's own prediction
    /// is pulled into n+1; otherwise the node fields are extrapolated from
    /// the past levels with [`predict_states`](Self::predict_states).
    pub fn prework(&mut self) -> Result<(), CouplingError> {
        self.expect_state("prework", &[CoordinatorState::Ready])?;
        self.metrics = StepMetrics::default();
        self.step_clock = Some(Instant::now());
        let time = self.time_at(TimeSlot::Np1);
        let n = self.n_substeps;
        let started = Instant::now();
        let local = self.turbines.iter_mut().try_for_each(|t| t.prework(time, n));
        self.metrics.solver_us += elapsed_us(started);
        self.agree(local)?;
        self.nlin_iter = 0;
        self.history_seq = 0;
        self.state = CoordinatorState::Prework;
        if self.config.debug {
            debug!(step = self.nt.0 + 1, time, "prework done");
        }
        Ok(())
    }

    /// Extrapolate the n+1 node fields of every local turbine from n, n-1
    /// and n-2 (fewer right after the start).
    pub fn predict_states(&mut self) -> Result<(), CouplingError> {
        self.expect_state(
            "predict_states",
            &[CoordinatorState::Ready, CoordinatorState::Prework],
        )?;
        for t in &mut self.turbines {
            t.ring.extrapolate_np1();
        }
        Ok(())
    }

    /// One nonlinear iteration over the whole driver step.
    ///
    /// Rewinds the solvers on a re-iteration, records the driver's n+1
    /// velocities in the history, runs every substep with velocities
    /// interpolated between n and n+1, pulls the result into n+1, and
    /// computes residuals against the previous iterate.
    pub fn update_states_driver_time_step(&mut self) -> Result<(), CouplingError> {
        self.expect_state(
            "update_states_driver_time_step",
            &[CoordinatorState::Prework, CoordinatorState::Substepped],
        )?;
        let step = self.nt.0 + 1;
        let key = self.history_seq;
        let rewind = self.nlin_iter > 0;
        let t_n = self.time_at(TimeSlot::N);
        let clock = self.clock();
        let started = Instant::now();
        let local = self
            .turbines
            .iter_mut()
            .try_for_each(|t| t.nonlinear_iteration(step, key, rewind, t_n, clock));
        self.metrics.solver_us += elapsed_us(started);
        self.agree(local)?;
        self.nlin_iter += 1;
        self.history_seq += 1;
        self.metrics.nlin_iters = self.nlin_iter;
        self.metrics.substeps = self.n_substeps;
        self.state = CoordinatorState::Substepped;
        Ok(())
    }

    /// One solver substep ending at fraction `ss_time` of the driver step,
    /// sending `vel(n) + ss_time * (vel(n+1) - vel(n))`. The n+1
    /// velocities and the fraction are recorded in the history.
    pub fn step_fraction(&mut self, ss_time: f64) -> Result<(), CouplingError> {
        if !(ss_time > 0.0 && ss_time <= 1.0) {
            return Err(CouplingError::InvalidSubstepFraction { value: ss_time });
        }
        self.expect_state(
            "step_fraction",
            &[CoordinatorState::Prework, CoordinatorState::Substepped],
        )?;
        let step = self.nt.0 + 1;
        let key = self.history_seq;
        let t_n = self.time_at(TimeSlot::N);
        let clock = self.clock();
        let started = Instant::now();
        let local = self
            .turbines
            .iter_mut()
            .try_for_each(|t| t.fractional_step(step, key, ss_time, t_n, clock));
        self.metrics.solver_us += elapsed_us(started);
        self.agree(local)?;
        self.history_seq += 1;
        self.metrics.substeps += 1;
        self.state = CoordinatorState::Substepped;
        Ok(())
    }

    /// A whole driver step: prework, every substep holding the n+1
    /// velocity, history recording, and the advance.
    pub fn step(&mut self) -> Result<(), CouplingError> {
        self.expect_state("step", &[CoordinatorState::Ready])?;
        self.prework()?;
        let step = self.nt.0 + 1;
        let t_n = self.time_at(TimeSlot::N);
        let clock = self.clock();
        let started = Instant::now();
        let local = self
            .turbines
            .iter_mut()
            .try_for_each(|t| t.held_step(step, t_n, clock));
        self.metrics.solver_us += elapsed_us(started);
        self.agree(local)?;
        self.metrics.substeps = self.n_substeps;
        self.metrics.nlin_iters = 1;
        self.state = CoordinatorState::Substepped;
        self.advance_to_next_driver_time_step()
    }

    /// Accept n+1: shift every ring, bump the step index, checkpoint and
    /// log a summary at their configured cadences.
    pub fn advance_to_next_driver_time_step(&mut self) -> Result<(), CouplingError> {
        self.expect_state(
            "advance_to_next_driver_time_step",
            &[CoordinatorState::Substepped],
        )?;
        for t in &mut self.turbines {
            t.ring.advance();
        }
        self.nt = StepId(self.nt.0 + 1);
        self.nlin_iter = 0;
        let started = Instant::now();
        let local = self.write_checkpoints_if_due();
        self.metrics.io_us += elapsed_us(started);
        self.agree(local)?;
        if self.config.output_freq > 0 && self.nt.0 % self.config.output_freq == 0 {
            self.log_summary();
        }
        if let Some(clock) = self.step_clock.take() {
            self.metrics.total_us = elapsed_us(clock);
        }
        self.state = CoordinatorState::Ready;
        if self.config.debug {
            debug!(
                step = self.nt.0,
                time = self.time_at(TimeSlot::N),
                total_us = self.metrics.total_us,
                "driver step advanced"
            );
        }
        Ok(())
    }

    fn write_checkpoints_if_due(&mut self) -> Result<(), CouplingError> {
        let freq = self.config.restart_freq;
        if self.config.dry_run || freq == 0 || self.nt.0 % freq != 0 {
            return Ok(());
        }
        for t in &mut self.turbines {
            let ckpt = t.checkpoint(self.nt)?;
            write_checkpoint(&checkpoint_path(&t.record.out_file_root), &ckpt)?;
            t.flush_history()?;
        }
        Ok(())
    }

    fn log_summary(&self) {
        for t in &self.turbines {
            let hub = t.ring.get(TimeSlot::N).node(FieldKind::XForce, NodeLayout::HUB);
            let (thrust, torque) = t.shaft_loads(TimeSlot::N);
            info!(
                turbine = %t.id,
                step = self.nt.0,
                time = self.time_at(TimeSlot::N),
                hub_x = hub[0],
                hub_y = hub[1],
                hub_z = hub[2],
                thrust,
                torque,
                "turbine summary"
            );
        }
    }

    /// Tear down every stepper and flush every history, then synchronise
    /// the world.
    ///
    /// Teardown continues past failures; the first one is returned.
    /// Collective over the world communicator. Calling it again is a
    /// no-op.
    pub fn end(&mut self) -> Result<(), CouplingError> {
        if self.state == CoordinatorState::Terminated {
            return Ok(());
        }
        let mut first: Option<CouplingError> = None;
        for t in &mut self.turbines {
            if let Err(e) = t.end() {
                error!(turbine = %t.id, error = %e, "turbine teardown failed");
                first.get_or_insert(e);
            }
        }
        let barrier = self.world.barrier();
        self.state = CoordinatorState::Terminated;
        info!(rank = self.world.rank(), step = self.nt.0, "coupling ended");
        match first {
            Some(e) => Err(e),
            None => barrier.map_err(CouplingError::from),
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn clock(&self) -> Clock {
        Clock {
            dt_driver: self.config.dt_driver,
            dt_solver: self.config.dt_solver,
            n_substeps: self.n_substeps,
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[CoordinatorState],
    ) -> Result<(), CouplingError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CouplingError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Combine this rank's outcome with the rest of the group.
    fn agree(&mut self, local: Result<(), CouplingError>) -> Result<(), CouplingError> {
        let any_failed = self.group.any_failed(local.is_err());
        let outcome = match (local, any_failed) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e.into()),
            (Ok(()), Ok(true)) => Err(CouplingError::PeerFailed),
            (Ok(()), Ok(false)) => Ok(()),
        };
        if let Err(e) = &outcome {
            error!(rank = self.world.rank(), step = self.nt.0, error = %e, "coupled run failed");
            self.state = CoordinatorState::Failed;
        }
        outcome
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The run configuration.
    pub fn config(&self) -> &CouplingConfig {
        &self.config
    }

    /// The turbine partition.
    pub fn assignment(&self) -> &TurbineAssignment {
        &self.assignment
    }

    /// Global numbers of the turbines on this rank.
    pub fn local_turbines(&self) -> impl ExactSizeIterator<Item = TurbineId> + '_ {
        self.assignment.local_turbines()
    }

    /// True if this rank owns at least one turbine.
    pub fn is_group_member(&self) -> bool {
        self.group.is_member()
    }

    /// Solver substeps per driver step. Zero before `init`.
    pub fn n_substeps(&self) -> u32 {
        self.n_substeps
    }

    /// Index of the last accepted driver step, `n`.
    pub fn current_step(&self) -> StepId {
        self.nt
    }

    /// Driver step the run started from.
    pub fn nt_start(&self) -> StepId {
        self.nt_start
    }

    /// Nonlinear iterations taken in the current driver step.
    pub fn nlin_iter(&self) -> u32 {
        self.nlin_iter
    }

    /// Simulation time of `slot`.
    ///
    /// A fresh start counts from `t_start`; restarts count from zero, so
    /// step `k` is at `k * dt_driver`.
    pub fn time_at(&self, slot: TimeSlot) -> f64 {
        let origin = match self.config.start_type {
            StartType::Init => self.config.t_start,
            StartType::TrueRestart | StartType::RestartDriverInitFast => 0.0,
        };
        let level = self.nt.0 as i64 + slot.step_offset();
        origin + level as f64 * self.config.dt_driver
    }

    /// True on a fresh start before the first driver step is accepted.
    pub fn is_time_zero(&self) -> bool {
        self.config.start_type == StartType::Init && self.nt == StepId(0)
    }

    /// True if solver calls and file access are suppressed.
    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// True if per-step debug logging is enabled.
    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    /// Metrics of the most recent driver step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.metrics
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.state != CoordinatorState::Terminated {
            warn!(
                rank = self.world.rank(),
                state = ?self.state,
                "coordinator dropped without end(); steppers were not torn down"
            );
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("rank", &self.world.rank())
            .field("state", &self.state)
            .field("local_turbines", &self.turbines.len())
            .field("n_substeps", &self.n_substeps)
            .field("nt", &self.nt)
            .field("nlin_iter", &self.nlin_iter)
            .finish_non_exhaustive()
    }
}
