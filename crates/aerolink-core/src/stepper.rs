//! The seam to the external turbine solver.
//!
//! One [`ExternalStepper`] drives one turbine. The coordinator owns the
//! stepper exclusively and calls it in a fixed order: `init`, `solution0`,
//! then per driver step `predict`, one `advance` per substep (preceded by
//! `rewind` on a nonlinear re-iteration), and `output`. `checkpoint` is
//! called at the configured cadence and `end` exactly once.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::NodeFields;
use crate::fsi::BrFsiData;
use crate::id::{StepId, TurbineId};
use crate::record::TurbineRecord;

/// How a run begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartType {
    /// Start every turbine from scratch.
    #[default]
    Init,
    /// Resume from checkpoint files for every turbine and its solver.
    TrueRestart,
    /// Start solvers from scratch and replay the recorded velocity history
    /// up to the restart time, then continue as a true restart would.
    RestartDriverInitFast,
}

/// Status reported by a failing solver call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("solver status {code}: {message}")]
pub struct SolverStatus {
    /// Solver-specific error code.
    pub code: i32,
    /// Solver message, verbatim.
    pub message: String,
}

impl SolverStatus {
    /// A status with the given code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Which stepper call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Stepper creation by the factory.
    Create,
    /// [`ExternalStepper::init`].
    Init,
    /// [`ExternalStepper::solution0`].
    Solution0,
    /// [`ExternalStepper::predict`].
    Predict,
    /// [`ExternalStepper::advance`].
    Advance,
    /// [`ExternalStepper::rewind`].
    Rewind,
    /// [`ExternalStepper::output`].
    Output,
    /// [`ExternalStepper::checkpoint`].
    Checkpoint,
    /// [`ExternalStepper::end`].
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Create => "create",
            Phase::Init => "init",
            Phase::Solution0 => "solution0",
            Phase::Predict => "predict",
            Phase::Advance => "advance",
            Phase::Rewind => "rewind",
            Phase::Output => "output",
            Phase::Checkpoint => "checkpoint",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}

/// Everything a stepper needs to set itself up.
#[derive(Clone, Copy, Debug)]
pub struct StepperInit<'a> {
    /// Global turbine number.
    pub turbine: TurbineId,
    /// The turbine's configuration.
    pub record: &'a TurbineRecord,
    /// Solver time step.
    pub dt: f64,
    /// Simulation start time.
    pub t_start: f64,
    /// Simulation end time.
    pub t_max: f64,
    /// How the run begins.
    pub start: StartType,
    /// Handle of the solver checkpoint to resume from, on a true restart.
    pub restart_handle: Option<&'a str>,
}

/// Driver-supplied blade-resolved loads.
#[derive(Clone, Copy, Debug)]
pub struct LoadsInput<'a> {
    /// Tower loads, six per tower FSI node.
    pub twr_ld: &'a [f64],
    /// Blade loads, six per blade FSI node.
    pub bld_ld: &'a [f64],
}

/// Inputs for one solver substep.
#[derive(Clone, Copy, Debug)]
pub struct StepperInput<'a> {
    /// Time at the end of the substep.
    pub time: f64,
    /// Flow velocity at the velocity nodes, three per node.
    pub vel: &'a [f64],
    /// Blade-resolved loads, for turbines coupled through loads.
    pub loads: Option<LoadsInput<'a>>,
}

/// Destination buffers for solver output.
#[derive(Debug)]
pub struct StepperOutput<'a> {
    /// Node fields of the slot being filled. The stepper owns every field
    /// except the sampled flow velocities.
    pub nodes: &'a mut NodeFields,
    /// Blade-resolved FSI record, for turbines coupled through loads.
    pub fsi: Option<&'a mut BrFsiData>,
}

/// One turbine's aero-elastic solver.
pub trait ExternalStepper: Send {
    /// Read inputs and allocate solver state.
    fn init(&mut self, init: &StepperInit<'_>) -> Result<(), SolverStatus>;

    /// Compute the zeroth (initial) solution.
    fn solution0(&mut self) -> Result<(), SolverStatus>;

    /// Run the solver predictor for the driver step ending at `time`.
    fn predict(&mut self, time: f64) -> Result<(), SolverStatus>;

    /// Advance one substep.
    fn advance(&mut self, input: &StepperInput<'_>) -> Result<(), SolverStatus>;

    /// Return to the state at the start of the current driver step.
    fn rewind(&mut self) -> Result<(), SolverStatus> {
        Ok(())
    }

    /// Write the current solution into `out`.
    fn output(&mut self, out: &mut StepperOutput<'_>) -> Result<(), SolverStatus>;

    /// Write the solver's own checkpoint; returns its handle.
    fn checkpoint(&mut self, step: StepId) -> Result<String, SolverStatus>;

    /// Release solver resources.
    fn end(&mut self) -> Result<(), SolverStatus>;
}

/// Creates one stepper per local turbine.
pub trait StepperFactory {
    /// Create the stepper for `turbine`.
    fn create(
        &mut self,
        turbine: TurbineId,
        record: &TurbineRecord,
    ) -> Result<Box<dyn ExternalStepper>, SolverStatus>;
}

impl<F> StepperFactory for F
where
    F: FnMut(TurbineId, &TurbineRecord) -> Result<Box<dyn ExternalStepper>, SolverStatus>,
{
    fn create(
        &mut self,
        turbine: TurbineId,
        record: &TurbineRecord,
    ) -> Result<Box<dyn ExternalStepper>, SolverStatus> {
        self(turbine, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_keeps_message() {
        let s = SolverStatus::new(4, "AeroDyn: blade element out of range");
        assert_eq!(s.to_string(), "solver status 4: AeroDyn: blade element out of range");
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::Advance.to_string(), "advance");
        assert_eq!(Phase::Solution0.to_string(), "solution0");
    }
}
