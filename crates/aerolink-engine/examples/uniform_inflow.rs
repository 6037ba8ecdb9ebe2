//! Aerolink uniform inflow: two turbines in a sheared wind.
//!
//! Demonstrates:
//!   1. Loading a coupling configuration from TOML
//!   2. Driving the coordinator through prework, nonlinear iterations and
//!      the advance, with velocities from the power-law wind profile
//!   3. Reading rotor thrust and torque back after every driver step
//!
//! The turbine solvers are the deterministic mocks from the test
//! utilities. Set `RUST_LOG=aerolink_engine=debug` for per-step logs.
//!
//! Run with:
//!   cargo run -p aerolink-engine --example uniform_inflow

use aerolink_comm::SelfComm;
use aerolink_core::{TimeSlot, TurbineId};
use aerolink_engine::{Coordinator, CouplingConfig, CouplingError};
use aerolink_test_utils::fixtures::turbine_record;
use aerolink_test_utils::{mock_factory, CallCounts};
use tracing_subscriber::EnvFilter;

const RUN: &str = r#"
t_max = 20.0
dt_driver = 0.5
dt_solver = 0.1
output_freq = 5
"#;

const N_STEPS: usize = 10;
const N_ITERATIONS: usize = 2;

fn main() -> Result<(), CouplingError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = CouplingConfig::from_toml_str(RUN)?;
    config.turbines = (0..2)
        .map(|i| {
            let mut r = turbine_record(i);
            r.vel_mean = 9.0;
            r.shear_exp = 0.14;
            r
        })
        .collect();

    let counts = CallCounts::new();
    let mut coupling = Coordinator::new(config, Box::new(SelfComm))?;
    coupling.init(&mut mock_factory(counts.clone()))?;
    coupling.solution0()?;
    println!(
        "{} substeps per driver step, starting at t = {}",
        coupling.n_substeps(),
        coupling.time_at(TimeSlot::N)
    );

    for _ in 0..N_STEPS {
        coupling.prework()?;
        coupling.set_exp_law_wind_speed();
        for _ in 0..N_ITERATIONS {
            coupling.update_states_driver_time_step()?;
        }
        coupling.advance_to_next_driver_time_step()?;

        let t = coupling.time_at(TimeSlot::N);
        for id in [TurbineId(0), TurbineId(1)] {
            let (torque, thrust) = coupling.compute_torque_thrust(id, TimeSlot::N);
            let hub_u = coupling.get_velocity(id, 0, TimeSlot::N);
            println!(
                "t = {t:5.2}  turbine {id}  hub u = {:6.3}  thrust = {:8.3}  torque = {:8.3}",
                hub_u[0], thrust[0], torque[0]
            );
        }
    }

    let metrics = coupling.last_metrics().clone();
    coupling.end()?;
    println!(
        "last step: {} substeps, {} iterations, {} us; {} solver advances in total",
        metrics.substeps,
        metrics.nlin_iters,
        metrics.total_us,
        CallCounts::get(&counts.advance)
    );
    Ok(())
}
