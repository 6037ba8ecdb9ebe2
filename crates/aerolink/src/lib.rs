//! Aerolink: couples aero-elastic wind turbine solvers to a flow driver.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Aerolink sub-crates. For most drivers, adding `aerolink` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use aerolink::prelude::*;
//!
//! let config = CouplingConfig::from_toml_str(&std::fs::read_to_string("run.toml")?)?;
//! let mut coupling = Coordinator::new(config, Box::new(SelfComm))?;
//! coupling.init(&mut my_solver_factory)?;
//! coupling.solution0()?;
//! for _ in 0..n_steps {
//!     coupling.prework()?;
//!     // sample the flow at the predicted node positions
//!     coupling.set_velocity(TurbineId(0), 0, [8.0, 0.0, 0.0]);
//!     coupling.update_states_driver_time_step()?;
//!     coupling.advance_to_next_driver_time_step()?;
//! }
//! coupling.end()?;
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `aerolink-core` | IDs, turbine records, node fields, the solver trait |
//! | [`comm`] | `aerolink-comm` | Communicators, turbine partition, turbine group |
//! | [`interp`] | `aerolink-interp` | Span interpolation and the wind profile |
//! | [`restart`] | `aerolink-restart` | Checkpoint and velocity-history files |
//! | [`engine`] | `aerolink-engine` | The coordinator and its configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`aerolink-core`).
///
/// Contains [`types::TurbineRecord`], [`types::NodeFields`], rotation
/// helpers, and the [`types::ExternalStepper`] seam to the turbine solver.
pub use aerolink_core as types;

/// Process groups and turbine placement (`aerolink-comm`).
pub use aerolink_comm as comm;

/// Interpolation between node sets (`aerolink-interp`).
pub use aerolink_interp as interp;

/// Checkpoint/restart persistence (`aerolink-restart`).
pub use aerolink_restart as restart;

/// The coupling coordinator (`aerolink-engine`).
pub use aerolink_engine as engine;

/// Common imports for typical Aerolink usage.
///
/// ```rust
/// use aerolink::prelude::*;
/// ```
pub mod prelude {
    // Core types and the solver seam
    pub use aerolink_core::{
        ExternalStepper, FieldKind, NodeFields, NodeType, SimType, SolverStatus, StartType,
        StepId, StepperFactory, StepperInit, StepperInput, StepperOutput, TimeSlot, TurbineId,
        TurbineRecord,
    };

    // Errors
    pub use aerolink_core::{ConfigError, RangeError};

    // Communication
    pub use aerolink_comm::{Communicator, LocalCluster, SelfComm};

    // Engine
    pub use aerolink_engine::{
        Coordinator, CoordinatorState, CouplingConfig, CouplingError, StepMetrics,
    };
}
