//! Multi-rate time integration for coupled turbine solvers.
//!
//! Provides the [`Coordinator`] that advances every turbine of a rank in
//! lock-step with an external flow driver: one driver step at a time, each
//! split into an integer number of solver substeps, with n+1 predicted by
//! extrapolation over a four-slot [`FieldRing`] and corrected by the
//! solvers.
//!
//! # Architecture
//!
//! - [`CouplingConfig`] validated run configuration, loadable from TOML
//! - [`FieldRing`] n-2, n-1, n, n+1 node fields of one turbine
//! - [`Coordinator`] state machine, node accessors, checkpoint cadence
//! - [`StepMetrics`] timing of the most recent driver step

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
mod nodes;
pub mod ring;
mod turbine;

pub use config::CouplingConfig;
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CouplingError;
pub use metrics::StepMetrics;
pub use ring::FieldRing;
