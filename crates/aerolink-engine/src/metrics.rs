//! Per-step performance metrics for the coordinator.
//!
//! [`StepMetrics`] captures timing of the most recent driver step.

/// Timing collected during a single driver step.
///
/// All durations are in microseconds. The coordinator resets the metrics
/// in `prework` and accumulates until the step is advanced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Wall-clock time from prework to advance, in microseconds.
    pub total_us: u64,
    /// Time spent inside solver calls, in microseconds.
    pub solver_us: u64,
    /// Time spent writing checkpoints, in microseconds. Velocity history
    /// is recorded inside the solver loop and counts toward `solver_us`.
    pub io_us: u64,
    /// Solver substeps issued per turbine.
    pub substeps: u32,
    /// Nonlinear iterations taken.
    pub nlin_iters: u32,
}
