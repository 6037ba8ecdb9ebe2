//! Core types for the Aerolink turbine coupling layer.
//!
//! This crate defines the fundamental abstractions shared by every other
//! Aerolink crate: turbine, rank and step identifiers, the per-turbine
//! [`TurbineRecord`], node layouts, the per-slot [`NodeFields`] samples,
//! blade-resolved FSI data, rotation geometry, the [`ExternalStepper`]
//! seam to the turbine solver, and the shared error types.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod fsi;
pub mod geometry;
pub mod id;
pub mod layout;
pub mod record;
pub mod slot;
pub mod stepper;

pub use error::{ConfigError, RangeError};
pub use field::{FieldKind, FieldLocation, FieldResiduals, NodeFields};
pub use fsi::{BrFsiData, BrFsiResiduals, FSI_DOF};
pub use id::{Rank, StepId, TurbineId};
pub use layout::{NodeLayout, NodeType, Span};
pub use record::{InflowType, NodeClustering, SimType, TurbineRecord};
pub use slot::TimeSlot;
pub use stepper::{
    ExternalStepper, LoadsInput, Phase, SolverStatus, StartType, StepperFactory, StepperInit,
    StepperInput, StepperOutput,
};
