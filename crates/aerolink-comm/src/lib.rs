//! Process groups and turbine partitioning for Aerolink.
//!
//! The coupling layer needs very little from its message-passing
//! substrate: rank and size, a barrier, a max all-reduce used to agree on
//! failure, and sub-group creation. Those are captured by the
//! [`Communicator`] trait. [`SelfComm`] serves single-process runs and
//! [`LocalCluster`] runs several ranks as threads for testing.
//!
//! [`TurbineAssignment`] maps global turbines to ranks and [`FastGroup`]
//! is the sub-communicator of turbine-owning ranks.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod communicator;
pub mod error;
pub mod group;
pub mod local;
pub mod partition;

pub use communicator::{Communicator, SelfComm};
pub use error::{CommError, GroupError};
pub use group::FastGroup;
pub use local::{LocalCluster, ThreadComm};
pub use partition::TurbineAssignment;
