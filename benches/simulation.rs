//! Benchmarks for rigidsim
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rigidsim::collision::collide;
use rigidsim::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn scene_with_floor() -> Simulation {
    let mut sim = Simulation::default();
    sim.add_force_effect(Box::new(Gravity::default()));
    let floor = RigidBody::fixed(Shape::cuboid(Vec3::new(50.0, 0.5, 50.0)).unwrap())
        .with_position(Vec3::new(0.0, -0.5, 0.0));
    sim.add_body(floor).unwrap();
    sim
}

// ============================================================================
// Simulation step benchmarks
// ============================================================================

fn bench_simulation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_step");

    group.bench_function("ball_drop_60_updates", |b| {
        b.iter(|| {
            let mut sim = scene_with_floor();
            let ball = RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
                .unwrap()
                .with_position(Vec3::new(0.0, 2.0, 0.0));
            let ball = sim.add_body(ball).unwrap();
            for _ in 0..60 {
                sim.update(black_box(DT)).unwrap();
            }
            sim.body(ball).map(|b| b.position())
        });
    });

    group.bench_function("box_stack_10_60_steps", |b| {
        b.iter(|| {
            let mut sim = scene_with_floor();
            for i in 0..10 {
                let cube = RigidBody::dynamic(Shape::cuboid(Vec3::splat(0.5)).unwrap(), 1.0)
                    .unwrap()
                    .with_position(Vec3::new(0.0, 0.5 + i as f32 * 1.01, 0.0));
                sim.add_body(cube).unwrap();
            }
            for _ in 0..60 {
                sim.step().unwrap();
            }
            sim.last_step_stats().constraint_rows
        });
    });

    group.bench_function("pile_100_spheres_30_steps", |b| {
        b.iter(|| {
            let mut sim = scene_with_floor();
            for i in 0..100 {
                let (x, z) = ((i % 10) as f32 * 1.1, (i / 10) as f32 * 1.1);
                let ball = RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
                    .unwrap()
                    .with_position(Vec3::new(x - 5.0, 0.5 + (i % 3) as f32, z - 5.0));
                sim.add_body(ball).unwrap();
            }
            for _ in 0..30 {
                sim.step().unwrap();
            }
            sim.collision_domain().contact_set_count()
        });
    });

    group.finish();
}

// ============================================================================
// Narrow phase benchmarks
// ============================================================================

fn bench_narrow_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrow_phase");

    let cube = Shape::cuboid(Vec3::splat(0.5)).unwrap();
    let sphere = Shape::sphere(0.5).unwrap();
    let hull = Shape::convex_hull(vec![
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, -1.0),
    ])
    .unwrap();
    let below = Pose::IDENTITY;
    let above = Pose::new(Vec3::new(0.1, 0.95, 0.05), Quat::from_rotation_y(0.3));

    group.bench_function("box_box", |b| {
        b.iter(|| collide(black_box(&cube), &below, black_box(&cube), &above, 0.02))
    });

    group.bench_function("sphere_box", |b| {
        b.iter(|| collide(black_box(&sphere), &above, black_box(&cube), &below, 0.02))
    });

    group.bench_function("hull_box_gjk", |b| {
        b.iter(|| collide(black_box(&hull), &above, black_box(&cube), &below, 0.02))
    });

    group.finish();
}

// ============================================================================
// Query benchmarks
// ============================================================================

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    let mut sim = Simulation::default();
    for i in 0..400 {
        let (x, z) = ((i % 20) as f32 * 2.0, (i / 20) as f32 * 2.0);
        let body = RigidBody::fixed(Shape::sphere(0.5).unwrap()).with_position(Vec3::new(x, 0.0, z));
        sim.add_body(body).unwrap();
    }
    sim.step().unwrap();

    group.bench_function("ray_cast_400_objects", |b| {
        b.iter(|| {
            sim.collision_domain()
                .ray_cast(black_box(Vec3::new(-5.0, 0.0, 20.0)), Vec3::X, 100.0, None)
        })
    });

    group.bench_function("aabb_overlap_400_objects", |b| {
        let region = Aabb::new(Vec3::new(10.0, -1.0, 10.0), Vec3::new(20.0, 1.0, 20.0));
        b.iter(|| sim.collision_domain().objects_overlapping(black_box(&region)))
    });

    group.finish();
}

criterion_group!(benches, bench_simulation_step, bench_narrow_phase, bench_queries);
criterion_main!(benches);
