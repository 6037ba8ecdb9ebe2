//! Multi-rank behaviour of the in-process substrate.

use aerolink_comm::{Communicator, FastGroup, LocalCluster, TurbineAssignment};
use aerolink_core::{Rank, TurbineId};

#[test]
fn every_rank_agrees_on_the_partition() {
    let views = LocalCluster::new(3).run(|mut world| {
        let rank = Rank(world.rank() as u32);
        let a = TurbineAssignment::round_robin(7, 3, rank).unwrap();
        let group = FastGroup::build(&mut world, &a).unwrap();
        world.barrier().unwrap();
        (a.local_turbines().collect::<Vec<_>>(), group.position())
    });
    assert_eq!(views[0].0, vec![TurbineId(0), TurbineId(3), TurbineId(6)]);
    assert_eq!(views[1].0, vec![TurbineId(1), TurbineId(4)]);
    assert_eq!(views[2].0, vec![TurbineId(2), TurbineId(5)]);
    assert!(views.iter().all(|(_, pos)| pos.is_some()));
}

#[test]
fn nested_subgroups_reduce_independently() {
    let out = LocalCluster::new(6).run(|mut world| {
        let rank = world.rank();
        let mut evens = world.create_subgroup(&[0, 2, 4]).unwrap();
        let inner = match evens.as_mut() {
            Some(g) => {
                let mut pair = g.create_subgroup(&[1, 2]).unwrap();
                let pair_max = pair.as_mut().map(|p| p.all_reduce_max(rank as u64).unwrap());
                Some((g.all_reduce_max(rank as u64).unwrap(), pair_max))
            }
            None => None,
        };
        let world_max = world.all_reduce_max(rank as u64).unwrap();
        (inner, world_max)
    });
    assert_eq!(out[0], (Some((4, None)), 5));
    assert_eq!(out[1], (None, 5));
    assert_eq!(out[2], (Some((4, Some(4))), 5));
    assert_eq!(out[4], (Some((4, Some(4))), 5));
}

#[test]
fn failure_flag_reaches_every_member() {
    let out = LocalCluster::new(4).run(|mut world| {
        let rank = Rank(world.rank() as u32);
        let a = TurbineAssignment::round_robin(8, 4, rank).unwrap();
        let mut g = FastGroup::build(&mut world, &a).unwrap();
        let first = g.any_failed(false).unwrap();
        let second = g.any_failed(rank == Rank(3)).unwrap();
        (first, second)
    });
    assert!(out.iter().all(|&(first, second)| !first && second));
}
