//! Integration test: turbines spread over several thread-backed ranks.
//!
//! Checks the round-robin partition, ranks that own no turbine, that a
//! solver failure on one rank fails the step on every rank, and that
//! checkpoint restarts agree on the step across ranks.

use std::path::Path;

use aerolink_comm::{LocalCluster, SelfComm, ThreadComm};
use aerolink_core::{ConfigError, Phase, Rank, StartType, TurbineId};
use aerolink_engine::{Coordinator, CoordinatorState, CouplingConfig, CouplingError};
use aerolink_restart::checkpoint_path;
use aerolink_test_utils::fixtures::{turbine_record, turbine_record_in};
use aerolink_test_utils::{failing_factory, mock_factory, CallCounts};

fn config(n_turbines: u32) -> CouplingConfig {
    CouplingConfig {
        t_max: 100.0,
        dt_driver: 1.0,
        dt_solver: 0.1,
        turbines: (0..n_turbines).map(turbine_record).collect(),
        ..CouplingConfig::default()
    }
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Ok,
    OwnFailure { turbine: TurbineId, phase: Phase },
    PeerFailed,
    Other(String),
}

fn classify(r: Result<(), CouplingError>) -> Outcome {
    match r {
        Ok(()) => Outcome::Ok,
        Err(CouplingError::Solver { turbine, phase, .. }) => Outcome::OwnFailure { turbine, phase },
        Err(CouplingError::PeerFailed) => Outcome::PeerFailed,
        Err(e) => Outcome::Other(e.to_string()),
    }
}

#[test]
fn round_robin_over_three_ranks() {
    let owned = LocalCluster::new(3).run(|comm: ThreadComm| {
        let mut c = Coordinator::new(config(5), Box::new(comm)).unwrap();
        c.init(&mut mock_factory(CallCounts::new())).unwrap();
        c.solution0().unwrap();
        c.step().unwrap();
        let owned: Vec<u32> = c.local_turbines().map(|t| t.0).collect();
        assert_eq!(c.assignment().owning_rank(TurbineId(4)), Rank(1));
        c.end().unwrap();
        owned
    });
    assert_eq!(owned, vec![vec![0, 3], vec![1, 4], vec![2]]);
}

#[test]
fn ranks_without_turbines_stay_in_step() {
    let states = LocalCluster::new(4).run(|comm: ThreadComm| {
        let mut c = Coordinator::new(config(2), Box::new(comm)).unwrap();
        let member = c.is_group_member();
        c.init(&mut mock_factory(CallCounts::new())).unwrap();
        c.solution0().unwrap();
        for _ in 0..2 {
            c.step().unwrap();
        }
        let step = c.current_step().0;
        c.end().unwrap();
        (member, step, c.state())
    });
    assert_eq!(
        states,
        vec![
            (true, 2, CoordinatorState::Terminated),
            (true, 2, CoordinatorState::Terminated),
            (false, 2, CoordinatorState::Terminated),
            (false, 2, CoordinatorState::Terminated),
        ]
    );
}

#[test]
fn solver_failure_fails_the_step_everywhere() {
    let outcomes = LocalCluster::new(2).run(|comm: ThreadComm| {
        let mut c = Coordinator::new(config(2), Box::new(comm)).unwrap();
        // Turbine 1 lives on rank 1 and fails its third substep.
        c.init(&mut failing_factory(CallCounts::new(), TurbineId(1), 3))
            .unwrap();
        c.solution0().unwrap();
        let outcome = classify(c.step());
        let state = c.state();
        let retry = c.step();
        c.end().unwrap();
        (outcome, state, retry.is_err())
    });
    assert_eq!(outcomes[0].0, Outcome::PeerFailed);
    assert_eq!(
        outcomes[1].0,
        Outcome::OwnFailure {
            turbine: TurbineId(1),
            phase: Phase::Advance,
        }
    );
    for (_, state, retry_failed) in &outcomes {
        assert_eq!(*state, CoordinatorState::Failed);
        assert!(retry_failed);
    }
}

#[test]
fn explicit_placement_overrides_round_robin() {
    let owned = LocalCluster::new(2).run(|comm: ThreadComm| {
        let mut cfg = config(3);
        for t in 0..3 {
            cfg.set_turbine_proc_no(TurbineId(t), Rank(1));
        }
        let mut c = Coordinator::new(cfg, Box::new(comm)).unwrap();
        let owned = c.local_turbines().count();
        c.end().unwrap();
        owned
    });
    assert_eq!(owned, vec![0, 3]);
}

fn config_in(dir: &Path) -> CouplingConfig {
    CouplingConfig {
        restart_freq: 2,
        turbines: (0..2).map(|i| turbine_record_in(dir, i)).collect(),
        ..config(0)
    }
}

fn restart_config(dir: &Path) -> CouplingConfig {
    CouplingConfig {
        start_type: StartType::TrueRestart,
        t_start: 4.0,
        ..config_in(dir)
    }
}

/// Checkpoint both turbines at step 4 from a single rank. With `stale`,
/// turbine 1's checkpoint is rolled back to its step-2 version.
fn checkpoint_run(dir: &Path, stale: bool) {
    let mut c = Coordinator::new(config_in(dir), Box::new(SelfComm)).unwrap();
    c.init(&mut mock_factory(CallCounts::new())).unwrap();
    c.solution0().unwrap();
    c.step().unwrap();
    c.step().unwrap();
    let turb1 = checkpoint_path(&dir.join("turb1"));
    let at_step_2 = std::fs::read(&turb1).unwrap();
    c.step().unwrap();
    c.step().unwrap();
    c.end().unwrap();
    if stale {
        std::fs::write(&turb1, at_step_2).unwrap();
    }
}

#[test]
fn checkpoints_from_different_steps_fail_restart_on_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    checkpoint_run(dir.path(), true);

    let outcomes = LocalCluster::new(2).run(|comm: ThreadComm| {
        let mut c = Coordinator::new(restart_config(dir.path()), Box::new(comm)).unwrap();
        let err = c.init(&mut mock_factory(CallCounts::new())).err();
        let state = c.state();
        c.end().unwrap();
        (err.map(|e| e.to_string()), state)
    });
    let expected = CouplingError::from(ConfigError::RestartStepMismatch {
        earliest: 2,
        latest: 4,
    })
    .to_string();
    for (err, state) in outcomes {
        assert_eq!(err.as_deref(), Some(expected.as_str()));
        assert_eq!(state, CoordinatorState::Failed);
    }
}

#[test]
fn ranks_without_turbines_adopt_the_restart_step() {
    let dir = tempfile::tempdir().unwrap();
    checkpoint_run(dir.path(), false);

    let steps = LocalCluster::new(3).run(|comm: ThreadComm| {
        let mut cfg = restart_config(dir.path());
        cfg.t_start = 0.0;
        let mut c = Coordinator::new(cfg, Box::new(comm)).unwrap();
        c.init(&mut mock_factory(CallCounts::new())).unwrap();
        c.solution0().unwrap();
        c.step().unwrap();
        let step = c.current_step().0;
        c.end().unwrap();
        step
    });
    assert_eq!(steps, vec![5, 5, 5]);
}
