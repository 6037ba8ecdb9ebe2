//! Integration test: checkpoint restarts and velocity-history replay.
//!
//! A run resumed from a checkpoint must continue bit-identically to the
//! uninterrupted run; a driver-initialised restart must reach the same
//! state by replaying the recorded velocities.

use std::path::Path;

use aerolink_comm::SelfComm;
use aerolink_core::{ConfigError, StartType, TimeSlot, TurbineId};
use aerolink_engine::{Coordinator, CoordinatorState, CouplingConfig, CouplingError};
use aerolink_restart::{checkpoint_path, history_path};
use aerolink_test_utils::fixtures::turbine_record_in;
use aerolink_test_utils::{mock_factory, CallCounts};

const N_TURBINES: u32 = 2;

fn config(dir: &Path) -> CouplingConfig {
    CouplingConfig {
        t_max: 100.0,
        dt_driver: 1.0,
        dt_solver: 0.1,
        turbines: (0..N_TURBINES).map(|i| turbine_record_in(dir, i)).collect(),
        ..CouplingConfig::default()
    }
}

fn started(config: CouplingConfig) -> Coordinator {
    let mut c = Coordinator::new(config, Box::new(SelfComm)).unwrap();
    c.init(&mut mock_factory(CallCounts::new())).unwrap();
    c.solution0().unwrap();
    c
}

/// Every position, force and sampled velocity of every turbine at n.
fn snapshot(c: &Coordinator) -> Vec<[f64; 3]> {
    let mut out = Vec::new();
    for t in c.local_turbines().collect::<Vec<_>>() {
        for i in 0..c.get_num_force_pts(t) {
            out.push(c.get_force_node_coordinates(t, i, TimeSlot::N));
            out.push(c.get_force(t, i, TimeSlot::N));
        }
        for i in 0..c.get_num_vel_pts(t) {
            out.push(c.get_vel_node_coordinates(t, i, TimeSlot::N));
            out.push(c.get_velocity(t, i, TimeSlot::N));
        }
    }
    out
}

fn explicit_steps(c: &mut Coordinator, n: usize) {
    for _ in 0..n {
        c.set_exp_law_wind_speed();
        c.step().unwrap();
    }
}

fn iterated_steps(c: &mut Coordinator, n: usize) {
    for _ in 0..n {
        c.prework().unwrap();
        c.set_exp_law_wind_speed();
        c.update_states_driver_time_step().unwrap();
        c.update_states_driver_time_step().unwrap();
        c.advance_to_next_driver_time_step().unwrap();
    }
}

#[test]
fn true_restart_continues_bit_identically() {
    let dir = tempfile::tempdir().unwrap();

    let mut a = started(CouplingConfig {
        restart_freq: 4,
        ..config(dir.path())
    });
    explicit_steps(&mut a, 6);
    let expected = snapshot(&a);
    a.end().unwrap();
    for i in 0..N_TURBINES {
        assert!(checkpoint_path(&dir.path().join(format!("turb{i}"))).exists());
    }

    let mut b = started(CouplingConfig {
        start_type: StartType::TrueRestart,
        t_start: 4.0,
        ..config(dir.path())
    });
    assert_eq!(b.current_step().0, 4);
    assert_eq!(b.nt_start().0, 4);
    assert_eq!(b.time_at(TimeSlot::N), 4.0);
    explicit_steps(&mut b, 2);
    assert_eq!(b.current_step().0, 6);

    let got = snapshot(&b);
    assert_eq!(got.len(), expected.len());
    for (g, e) in got.iter().zip(&expected) {
        for k in 0..3 {
            assert_eq!(g[k].to_bits(), e[k].to_bits());
        }
    }
    b.end().unwrap();
}

#[test]
fn true_restart_without_checkpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = Coordinator::new(
        CouplingConfig {
            start_type: StartType::TrueRestart,
            t_start: 4.0,
            ..config(dir.path())
        },
        Box::new(SelfComm),
    )
    .unwrap();
    let err = c.init(&mut mock_factory(CallCounts::new())).unwrap_err();
    assert!(matches!(err, CouplingError::Persistence(_)));
    assert_eq!(c.state(), CoordinatorState::Failed);
    c.end().unwrap();
}

#[test]
fn checkpoint_from_a_different_turbine_layout_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = started(CouplingConfig {
        restart_freq: 1,
        ..config(dir.path())
    });
    explicit_steps(&mut a, 1);
    a.end().unwrap();

    let mut cfg = CouplingConfig {
        start_type: StartType::TrueRestart,
        t_start: 1.0,
        ..config(dir.path())
    };
    for r in &mut cfg.turbines {
        r.num_vel_pts_blade += 1;
        r.num_vel_pts += 3;
    }
    let mut b = Coordinator::new(cfg, Box::new(SelfComm)).unwrap();
    let err = b.init(&mut mock_factory(CallCounts::new())).unwrap_err();
    assert!(matches!(
        err,
        CouplingError::Config(ConfigError::RestartDimensionMismatch { .. })
    ));
    b.end().unwrap();
}

fn fractional_steps(c: &mut Coordinator, n: usize) {
    for _ in 0..n {
        c.prework().unwrap();
        c.set_exp_law_wind_speed();
        c.step_fraction(0.3).unwrap();
        c.step_fraction(0.7).unwrap();
        c.step_fraction(1.0).unwrap();
        c.advance_to_next_driver_time_step().unwrap();
    }
}

fn forces_at_n(c: &Coordinator) -> Vec<Vec<[f64; 3]>> {
    (0..N_TURBINES)
        .map(|i| {
            let t = TurbineId(i);
            (0..c.get_num_force_pts(t))
                .map(|n| c.get_force(t, n, TimeSlot::N))
                .collect()
        })
        .collect()
}

/// Record `n_steps` driven by `drive`, then replay them in a fresh
/// coordinator. Returns the recorded and replayed forces and the number
/// of solver advances the replay issued.
fn record_then_replay(
    drive: fn(&mut Coordinator, usize),
    n_steps: usize,
) -> (Vec<Vec<[f64; 3]>>, Vec<Vec<[f64; 3]>>, usize) {
    let dir = tempfile::tempdir().unwrap();

    let mut a = started(CouplingConfig {
        record_velocity_history: true,
        ..config(dir.path())
    });
    drive(&mut a, n_steps);
    let recorded = forces_at_n(&a);
    a.end().unwrap();
    assert!(history_path(&dir.path().join("turb0")).exists());

    let counts = CallCounts::new();
    let mut b = Coordinator::new(
        CouplingConfig {
            start_type: StartType::RestartDriverInitFast,
            t_start: n_steps as f64,
            ..config(dir.path())
        },
        Box::new(SelfComm),
    )
    .unwrap();
    b.init(&mut mock_factory(counts.clone())).unwrap();
    b.solution0().unwrap();
    assert_eq!(b.current_step().0, n_steps as u64);
    let replayed = forces_at_n(&b);
    b.end().unwrap();
    (recorded, replayed, CallCounts::get(&counts.advance))
}

#[test]
fn replayed_history_reaches_the_recorded_state() {
    let (recorded, replayed, advances) = record_then_replay(iterated_steps, 3);
    // Two iterations of ten substeps for each replayed step.
    assert_eq!(advances, N_TURBINES as usize * 3 * 20);
    assert_eq!(replayed, recorded);
}

#[test]
fn replay_of_explicit_steps_holds_the_recorded_velocity() {
    let (recorded, replayed, advances) = record_then_replay(explicit_steps, 3);
    assert_eq!(advances, N_TURBINES as usize * 3 * 10);
    assert_eq!(replayed, recorded);
}

#[test]
fn replay_of_fractional_substeps_repeats_each_fraction() {
    let (recorded, replayed, advances) = record_then_replay(fractional_steps, 2);
    assert_eq!(advances, N_TURBINES as usize * 2 * 3);
    assert_eq!(replayed, recorded);
}
