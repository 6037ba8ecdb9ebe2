//! Criterion micro-benchmarks for node-field interpolation and the ring.

use aerolink_bench::{span_fields, utility_scale_record};
use aerolink_core::TimeSlot;
use aerolink_engine::FieldRing;
use aerolink_interp::{ForceToVelInterpolator, PowerLawProfile, SpanGeometry};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Benchmark: force-to-velocity interpolation on a 1001/351 node turbine.
fn bench_force_to_vel(c: &mut Criterion) {
    let record = utility_scale_record(0);
    let (force, vel) = (record.force_layout(), record.vel_layout());
    let mut fields = span_fields(&record, 7);
    let mut interp = ForceToVelInterpolator::new();

    c.bench_function("force_to_vel_1001_to_351", |b| {
        b.iter(|| {
            let geom = SpanGeometry {
                force: &force,
                vel: &vel,
                base_pos: record.base_pos,
            };
            interp.interpolate_vel_force_to_vel_nodes(geom, &mut fields);
            black_box(&fields.vel_vel);
        });
    });
}

/// Benchmark: power-law inflow at every force node.
fn bench_power_law_fill(c: &mut Criterion) {
    let record = utility_scale_record(0);
    let mut fields = span_fields(&record, 7);
    let profile = PowerLawProfile::from_record(&record);

    c.bench_function("power_law_fill_1001", |b| {
        b.iter(|| {
            profile.fill(&fields.x_force, &mut fields.vel_force);
            black_box(&fields.vel_force);
        });
    });
}

/// Benchmark: ring shift followed by quadratic extrapolation of n+1.
fn bench_ring_advance_extrapolate(c: &mut Criterion) {
    let record = utility_scale_record(0);
    let fields = span_fields(&record, 11);
    let mut ring = FieldRing::new(fields.n_vel(), fields.n_force());
    ring.get_mut(TimeSlot::Np1).copy_from(&fields);
    ring.seed_all_from_np1();
    for _ in 0..3 {
        ring.advance();
    }

    c.bench_function("ring_advance_extrapolate", |b| {
        b.iter(|| {
            ring.advance();
            ring.extrapolate_np1();
            black_box(ring.get(TimeSlot::Np1));
        });
    });
}

criterion_group!(
    benches,
    bench_force_to_vel,
    bench_power_law_fill,
    bench_ring_advance_extrapolate
);
criterion_main!(benches);
