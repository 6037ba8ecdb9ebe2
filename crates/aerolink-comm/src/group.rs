//! The reduced group of turbine-owning ranks.

use tracing::info;

use aerolink_core::ConfigError;

use crate::communicator::Communicator;
use crate::error::{CommError, GroupError};
use crate::partition::TurbineAssignment;

/// Sub-communicator spanning exactly the ranks that own turbines.
///
/// Ranks without turbines hold a group with no communicator; they still
/// take part in [`FastGroup::build`] because it is collective over the
/// world.
pub struct FastGroup {
    comm: Option<Box<dyn Communicator>>,
    size: usize,
}

impl FastGroup {
    /// Build the group from the world communicator and an assignment.
    ///
    /// Collective over `world`.
    pub fn build(
        world: &mut dyn Communicator,
        assignment: &TurbineAssignment,
    ) -> Result<Self, GroupError> {
        let members: Vec<usize> = assignment
            .owning_ranks()
            .into_iter()
            .map(|r| r.index())
            .collect();
        if members.is_empty() {
            return Err(ConfigError::EmptyGroup.into());
        }
        let comm = world.create_subgroup(&members)?;
        info!(
            rank = world.rank(),
            group_size = members.len(),
            member = comm.is_some(),
            "turbine group built"
        );
        Ok(Self {
            comm,
            size: members.len(),
        })
    }

    /// Number of ranks in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// This rank's position in the group, if it is a member.
    pub fn position(&self) -> Option<usize> {
        self.comm.as_ref().map(|c| c.rank())
    }

    /// True if this rank owns at least one turbine.
    pub fn is_member(&self) -> bool {
        self.comm.is_some()
    }

    /// Agree on failure across the group.
    ///
    /// Returns `true` if any member reported `failed`. Non-members return
    /// their own flag without communicating.
    pub fn any_failed(&mut self, failed: bool) -> Result<bool, CommError> {
        match self.comm.as_mut() {
            Some(c) => Ok(c.all_reduce_max(u64::from(failed))? != 0),
            None => Ok(failed),
        }
    }

    /// Barrier over the group. A no-op on non-members.
    pub fn barrier(&mut self) -> Result<(), CommError> {
        match self.comm.as_mut() {
            Some(c) => c.barrier(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for FastGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastGroup")
            .field("size", &self.size)
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::SelfComm;
    use crate::local::LocalCluster;
    use aerolink_core::Rank;

    #[test]
    fn single_rank_group() {
        let a = TurbineAssignment::round_robin(3, 1, Rank(0)).unwrap();
        let mut g = FastGroup::build(&mut SelfComm, &a).unwrap();
        assert_eq!(g.size(), 1);
        assert_eq!(g.position(), Some(0));
        assert_eq!(g.any_failed(true), Ok(true));
    }

    #[test]
    fn idle_ranks_are_excluded() {
        let results = LocalCluster::new(4).run(|mut world| {
            let rank = Rank(world.rank() as u32);
            let a = TurbineAssignment::round_robin(2, 4, rank).unwrap();
            let mut g = FastGroup::build(&mut world, &a).unwrap();
            let failed = g.any_failed(rank == Rank(1)).unwrap();
            (g.size(), g.position(), failed)
        });
        assert_eq!(results[0], (2, Some(0), true));
        assert_eq!(results[1], (2, Some(1), true));
        assert_eq!(results[2], (2, None, false));
        assert_eq!(results[3], (2, None, false));
    }
}
