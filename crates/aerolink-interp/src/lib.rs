//! Spatial interpolation between the two node discretizations.
//!
//! The flow driver samples velocity at velocity nodes while the solver
//! works on force nodes; [`ForceToVelInterpolator`] maps samples between
//! them span by span. [`PowerLawProfile`] provides a synthetic inflow for
//! runs without a flow solver.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod inflow;
pub mod span;
pub mod velocity;

pub use inflow::PowerLawProfile;
pub use span::{distances_from, interpolate_clamped};
pub use velocity::{ForceToVelInterpolator, SpanGeometry};
