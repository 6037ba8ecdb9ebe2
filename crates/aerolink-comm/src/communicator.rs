//! The process-group seam.
//!
//! [`Communicator`] is the small set of collectives the coupling layer
//! needs from its substrate. [`SelfComm`] is the trivial single-rank
//! group; [`LocalCluster`](crate::LocalCluster) runs several ranks as
//! threads in one process.

use crate::error::CommError;

/// Collective operations over a fixed set of ranks.
///
/// Every method except [`rank`](Self::rank) and [`size`](Self::size) is a
/// collective: all members must call it, in the same order.
pub trait Communicator: Send {
    /// This participant's rank, `0..size`.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    /// Block until every member has arrived.
    fn barrier(&mut self) -> Result<(), CommError>;

    /// Maximum of `value` over all members, returned on every member.
    fn all_reduce_max(&mut self, value: u64) -> Result<u64, CommError>;

    /// Create a communicator over `members` (sorted ranks of this group).
    ///
    /// Collective over this communicator. Returns `None` on ranks not in
    /// `members`. The new communicator ranks members in list order.
    fn create_subgroup(
        &mut self,
        members: &[usize],
    ) -> Result<Option<Box<dyn Communicator>>, CommError>;
}

/// Check that `members` is a sorted, duplicate-free list of ranks below `size`.
pub(crate) fn validate_members(members: &[usize], size: usize) -> Result<(), CommError> {
    let sorted = members.windows(2).all(|w| w[0] < w[1]);
    let in_range = members.last().is_none_or(|&m| m < size);
    if sorted && in_range {
        Ok(())
    } else {
        Err(CommError::InvalidGroup {
            members: members.to_vec(),
            size,
        })
    }
}

/// A group containing only the calling process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&mut self) -> Result<(), CommError> {
        Ok(())
    }

    fn all_reduce_max(&mut self, value: u64) -> Result<u64, CommError> {
        Ok(value)
    }

    fn create_subgroup(
        &mut self,
        members: &[usize],
    ) -> Result<Option<Box<dyn Communicator>>, CommError> {
        validate_members(members, 1)?;
        if members.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Box::new(SelfComm)))
        }
    }
}
