//! Turbine-to-rank partitioning.
//!
//! The default placement is round-robin: turbine `i` lives on rank
//! `i mod R`. An explicit placement may be supplied instead. Either way the
//! assignment is a pure function of its inputs, so every rank computes the
//! same table without communicating.

use indexmap::{IndexMap, IndexSet};
use tracing::info;

use aerolink_core::{ConfigError, Rank, RangeError, TurbineId};

/// Which rank owns each turbine, and this rank's local numbering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurbineAssignment {
    n_ranks: u32,
    my_rank: Rank,
    /// Owner of each global turbine, indexed by turbine number.
    owners: Vec<Rank>,
    /// Turbines owned here, in ascending global order. Position is the
    /// local index.
    local: IndexSet<TurbineId>,
}

impl TurbineAssignment {
    /// Place turbine `i` on rank `i mod n_ranks`.
    pub fn round_robin(n_turbines: u32, n_ranks: u32, my_rank: Rank) -> Result<Self, ConfigError> {
        Self::check_sizes(n_turbines, n_ranks)?;
        let owners = (0..n_turbines).map(|t| Rank(t % n_ranks)).collect();
        Ok(Self::from_owners(owners, n_ranks, my_rank))
    }

    /// Use an explicit turbine → rank placement covering every turbine.
    pub fn from_explicit(
        placement: &IndexMap<TurbineId, Rank>,
        n_turbines: u32,
        n_ranks: u32,
        my_rank: Rank,
    ) -> Result<Self, ConfigError> {
        Self::check_sizes(n_turbines, n_ranks)?;
        let mut owners = vec![None; n_turbines as usize];
        for (&turbine, &rank) in placement {
            if turbine.0 >= n_turbines {
                return Err(ConfigError::InvalidTurbine {
                    turbine,
                    reason: format!("placed turbine is beyond n_turbines = {n_turbines}"),
                });
            }
            if rank.0 >= n_ranks {
                return Err(ConfigError::RankOutOfRange {
                    turbine,
                    rank,
                    size: n_ranks,
                });
            }
            owners[turbine.index()] = Some(rank);
        }
        let owners = owners
            .into_iter()
            .enumerate()
            .map(|(t, r)| {
                r.ok_or(ConfigError::UnassignedTurbine {
                    turbine: TurbineId(t as u32),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_owners(owners, n_ranks, my_rank))
    }

    fn check_sizes(n_turbines: u32, n_ranks: u32) -> Result<(), ConfigError> {
        if n_turbines == 0 {
            return Err(ConfigError::NoTurbines);
        }
        if n_ranks == 0 {
            return Err(ConfigError::NoRanks);
        }
        Ok(())
    }

    fn from_owners(owners: Vec<Rank>, n_ranks: u32, my_rank: Rank) -> Self {
        let local: IndexSet<TurbineId> = owners
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == my_rank)
            .map(|(t, _)| TurbineId(t as u32))
            .collect();
        info!(
            rank = my_rank.0,
            n_turbines = owners.len(),
            n_local = local.len(),
            "turbines partitioned"
        );
        Self {
            n_ranks,
            my_rank,
            owners,
            local,
        }
    }

    /// Number of turbines in the whole simulation.
    pub fn n_turbines(&self) -> u32 {
        self.owners.len() as u32
    }

    /// Number of ranks in the world group.
    pub fn n_ranks(&self) -> u32 {
        self.n_ranks
    }

    /// The rank this assignment was computed for.
    pub fn my_rank(&self) -> Rank {
        self.my_rank
    }

    /// Number of turbines owned by this rank.
    pub fn n_local(&self) -> usize {
        self.local.len()
    }

    /// Owner of turbine `t`, or a range error.
    pub fn try_owning_rank(&self, t: TurbineId) -> Result<Rank, RangeError> {
        self.owners
            .get(t.index())
            .copied()
            .ok_or(RangeError::TurbineOutOfRange {
                turbine: t,
                n_turbines: self.n_turbines(),
            })
    }

    /// Owner of turbine `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is not a turbine of this simulation.
    pub fn owning_rank(&self, t: TurbineId) -> Rank {
        self.try_owning_rank(t).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Local index of turbine `t` on this rank, or a range error.
    pub fn try_local_index(&self, t: TurbineId) -> Result<usize, RangeError> {
        let owner = self.try_owning_rank(t)?;
        self.local.get_index_of(&t).ok_or(RangeError::NotOwned {
            turbine: t,
            owner,
            rank: self.my_rank,
        })
    }

    /// Local index of turbine `t` on this rank.
    ///
    /// # Panics
    ///
    /// Panics if `t` is out of range or owned by another rank.
    pub fn local_index(&self, t: TurbineId) -> usize {
        self.try_local_index(t).unwrap_or_else(|e| panic!("{e}"))
    }

    /// True if this rank owns turbine `t`.
    pub fn is_local(&self, t: TurbineId) -> bool {
        self.local.contains(&t)
    }

    /// Global id of the turbine at local index `i`.
    pub fn global_id(&self, i: usize) -> Option<TurbineId> {
        self.local.get_index(i).copied()
    }

    /// Turbines owned by this rank, in local index order.
    pub fn local_turbines(&self) -> impl ExactSizeIterator<Item = TurbineId> + '_ {
        self.local.iter().copied()
    }

    /// Ranks that own at least one turbine, ascending.
    pub fn owning_ranks(&self) -> Vec<Rank> {
        let mut ranks: Vec<Rank> = self.owners.clone();
        ranks.sort_unstable();
        ranks.dedup();
        ranks
    }
}
