//! Integration tests for rigidsim
//!
//! End-to-end behaviour of the simulation through the public API: momentum,
//! static bodies, stacking, warm starting, the stepper cap, filtering and
//! kinematic bodies.

use approx::assert_relative_eq;
use rigidsim::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

const H: f32 = 1.0 / 60.0;

fn ball(position: Vec3) -> RigidBody {
    RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
        .unwrap()
        .with_position(position)
}

fn cube(position: Vec3) -> RigidBody {
    RigidBody::dynamic(Shape::cuboid(Vec3::splat(0.5)).unwrap(), 1.0)
        .unwrap()
        .with_position(position)
}

fn ground_plane() -> RigidBody {
    RigidBody::fixed(Shape::plane(Vec3::Y, 0.0).unwrap())
}

fn with_gravity() -> Simulation {
    let mut sim = Simulation::default();
    sim.add_force_effect(Box::new(Gravity::default()));
    sim
}

fn run(sim: &mut Simulation, steps: usize) {
    for _ in 0..steps {
        sim.step().unwrap();
    }
}

fn momentum(sim: &Simulation) -> Vec3 {
    sim.bodies()
        .filter(|(_, b)| b.is_dynamic())
        .map(|(_, b)| b.linear_velocity * b.mass())
        .sum()
}

fn all_contacts(sim: &Simulation) -> Vec<Contact> {
    sim.collision_domain()
        .contact_sets()
        .flat_map(|set| set.contacts().iter().copied())
        .collect()
}

// ============================================================================
// Momentum and static bodies
// ============================================================================

#[test]
fn test_momentum_conserved_without_forces() {
    let mut sim = Simulation::default();
    sim.add_body(ball(Vec3::new(-5.0, 0.0, 0.0)).with_linear_velocity(Vec3::new(1.0, 0.5, 0.0)))
        .unwrap();
    sim.add_body(cube(Vec3::new(5.0, 0.0, 0.0)).with_linear_velocity(Vec3::new(0.0, 0.0, -2.0)))
        .unwrap();

    let before = momentum(&sim);
    run(&mut sim, 120);
    let after = momentum(&sim);
    assert_relative_eq!(before.x, after.x, epsilon = 1e-5);
    assert_relative_eq!(before.y, after.y, epsilon = 1e-5);
    assert_relative_eq!(before.z, after.z, epsilon = 1e-5);
}

#[test]
fn test_momentum_conserved_through_collision() {
    let mut sim = Simulation::default();
    let a = ball(Vec3::new(-2.0, 0.0, 0.0))
        .with_linear_velocity(Vec3::new(3.0, 0.0, 0.0))
        .with_restitution(1.0);
    let b = ball(Vec3::new(2.0, 0.1, 0.0))
        .with_linear_velocity(Vec3::new(-1.0, 0.0, 0.0))
        .with_restitution(1.0);
    let a = sim.add_body(a).unwrap();
    let b = sim.add_body(b).unwrap();

    let before = momentum(&sim);
    run(&mut sim, 120);
    let after = momentum(&sim);
    assert_relative_eq!(before.x, after.x, epsilon = 1e-4);
    assert_relative_eq!(before.y, after.y, epsilon = 1e-4);

    // Elastic bounce: the balls trade most of their velocity
    assert!(sim.body(a).unwrap().linear_velocity.x < 0.0);
    assert!(sim.body(b).unwrap().linear_velocity.x > 2.0);
}

#[test]
fn test_static_bodies_never_move() {
    let mut sim = with_gravity();
    let block = RigidBody::fixed(Shape::cuboid(Vec3::splat(1.0)).unwrap())
        .with_position(Vec3::new(0.0, 1.0, 0.0))
        .with_linear_velocity(Vec3::new(4.0, 0.0, 0.0));
    let block = sim.add_body(block).unwrap();
    sim.add_body(ground_plane()).unwrap();
    sim.add_body(ball(Vec3::new(0.2, 3.0, 0.0))).unwrap();

    let pose = sim.body(block).unwrap().pose();
    run(&mut sim, 200);
    assert_eq!(sim.body(block).unwrap().pose(), pose);
}

// ============================================================================
// Stacking and warm starting
// ============================================================================

#[test]
fn test_stack_settles_without_sinking() {
    let mut sim = with_gravity();
    sim.add_body(ground_plane()).unwrap();
    let mut boxes = Vec::new();
    for i in 0..3 {
        let y = 0.5 + i as f32 * 1.001;
        boxes.push(sim.add_body(cube(Vec3::new(0.0, y, 0.0))).unwrap());
    }

    run(&mut sim, 200);

    let slop = sim.settings().solver.allowed_penetration;
    let deepest = all_contacts(&sim).iter().map(|c| c.depth).fold(f32::MIN, f32::max);
    assert!(deepest <= slop + 1e-3, "penetration {deepest} exceeds slop");

    // Still stacked in order, roughly in place
    for (i, handle) in boxes.iter().enumerate() {
        let p = sim.body(*handle).unwrap().position();
        assert!((p.y - (0.5 + i as f32)).abs() < 0.05, "box {i} at {p}");
        assert!(p.x.abs() < 0.05 && p.z.abs() < 0.05, "box {i} drifted to {p}");
    }
}

#[test]
fn test_overlapping_start_resolves_without_ejection() {
    let mut settings = SimulationSettings::default();
    settings.solver.max_error_correction_velocity = 1.0;
    let mut sim = Simulation::new(settings).unwrap();
    sim.add_force_effect(Box::new(Gravity::default()));
    sim.add_body(ground_plane()).unwrap();
    let lower = sim.add_body(cube(Vec3::new(0.0, 0.5, 0.0))).unwrap();
    // Starts 0.4 deep inside the lower box
    let upper = sim.add_body(cube(Vec3::new(0.0, 1.1, 0.0))).unwrap();

    let mut peak_speed = 0.0f32;
    for _ in 0..200 {
        sim.step().unwrap();
        for (_, body) in sim.bodies() {
            peak_speed = peak_speed.max(body.linear_velocity.length());
        }
    }

    // Push-out speed stays near the correction clamp
    assert!(peak_speed < 1.5, "peak speed {peak_speed}");
    let slop = sim.settings().solver.allowed_penetration;
    let deepest = all_contacts(&sim).iter().map(|c| c.depth).fold(f32::MIN, f32::max);
    assert!(deepest <= slop + 1e-3, "penetration {deepest} exceeds slop");

    let (lower, upper) = (sim.body(lower).unwrap(), sim.body(upper).unwrap());
    assert!((lower.position().y - 0.5).abs() < 0.05, "lower box at {}", lower.position());
    assert!((upper.position().y - 1.5).abs() < 0.05, "upper box at {}", upper.position());
    assert!(upper.linear_velocity.length() < 0.05);
}

#[test]
fn test_resting_impulse_matches_weight() {
    let mut sim = with_gravity();
    sim.add_body(ground_plane()).unwrap();
    let handle = sim.add_body(ball(Vec3::new(0.0, 0.5, 0.0))).unwrap();

    run(&mut sim, 120);

    let mass = sim.body(handle).unwrap().mass();
    let total: f32 = sim
        .contacts_of_body(handle)
        .flat_map(|set| set.contacts())
        .map(|c| c.normal_impulse)
        .sum();
    assert_relative_eq!(total, mass * 9.81 * H, max_relative = 0.02);
    assert!(sim.last_step_stats().resting);
}

// ============================================================================
// Stepper
// ============================================================================

#[test]
fn test_update_caps_sub_steps() {
    let mut sim = with_gravity();
    sim.add_body(ball(Vec3::ZERO)).unwrap();
    let max = sim.settings().max_steps_per_update;

    sim.update(10.0 * H).unwrap();
    assert_eq!(sim.last_step_stats().sub_steps, max);
    assert_eq!(sim.step_count(), max as u64);
}

#[test]
fn test_identical_runs_are_bit_exact() {
    fn simulate() -> Vec<Pose> {
        let mut sim = with_gravity();
        sim.add_body(ground_plane()).unwrap();
        for i in 0..4 {
            let body = cube(Vec3::new(i as f32 * 0.3, 1.0 + i as f32 * 1.2, 0.0))
                .with_orientation(Quat::from_rotation_z(0.1 * i as f32));
            sim.add_body(body).unwrap();
        }
        for _ in 0..90 {
            sim.update(H).unwrap();
        }
        sim.bodies().map(|(_, b)| b.pose()).collect()
    }

    assert_eq!(simulate(), simulate());
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_no_static_static_contact_sets() {
    let mut sim = Simulation::default();
    let a = RigidBody::fixed(Shape::cuboid(Vec3::splat(1.0)).unwrap());
    let b = RigidBody::fixed(Shape::cuboid(Vec3::splat(1.0)).unwrap()).with_position(Vec3::new(0.5, 0.0, 0.0));
    sim.add_body(a).unwrap();
    sim.add_body(b).unwrap();
    let c = sim.add_body(ball(Vec3::new(0.0, 1.4, 0.0))).unwrap();

    sim.step().unwrap();
    let sets: Vec<_> = sim.collision_domain().contact_sets().collect();
    assert!(!sets.is_empty());
    let object = sim.body(c).unwrap().collision_object().unwrap();
    assert!(sets.iter().all(|set| set.involves(object)));
}

#[test]
fn test_group_pairs_gate_contacts() {
    let mut sim = Simulation::default();
    let a = sim.add_body(ball(Vec3::ZERO).with_group(1)).unwrap();
    let b = sim.add_body(ball(Vec3::new(0.8, 0.0, 0.0)).with_group(2)).unwrap();

    sim.collision_domain_mut().filter_mut().set(1, 2, false);
    run(&mut sim, 5);
    assert_eq!(sim.collision_domain().contact_set_count(), 0);
    assert_eq!(sim.body(a).unwrap().position(), Vec3::ZERO);

    sim.collision_domain_mut().filter_mut().set(2, 1, true);
    sim.step().unwrap();
    assert_eq!(sim.contacts_of_body(b).count(), 1);
    assert!(sim.body(a).unwrap().linear_velocity.x < 0.0);
}

// ============================================================================
// Kinematic bodies and queries
// ============================================================================

#[test]
fn test_kinematic_pose_round_trip() {
    let mut sim = with_gravity();
    let platform = RigidBody::kinematic(Shape::cuboid(Vec3::new(2.0, 0.1, 2.0)).unwrap());
    let platform = sim.add_body(platform).unwrap();

    for i in 0..30 {
        let pose = Pose::new(Vec3::new(0.0, i as f32 * 0.01, 0.0), Quat::from_rotation_y(i as f32 * 0.02));
        sim.body_mut(platform).unwrap().set_pose(pose);
        sim.update(H).unwrap();

        let body = sim.body(platform).unwrap();
        assert_eq!(body.position(), pose.position);
        assert_relative_eq!(body.orientation().dot(pose.orientation).abs(), 1.0, epsilon = 1e-6);
        let object = sim.collision_domain().object(body.collision_object().unwrap()).unwrap();
        assert_eq!(object.pose.position, pose.position);
    }
}

#[test]
fn test_moving_kinematic_pushes_dynamic() {
    let mut sim = with_gravity();
    let platform = RigidBody::kinematic(Shape::cuboid(Vec3::new(2.0, 0.5, 2.0)).unwrap())
        .with_position(Vec3::new(0.0, -0.5, 0.0))
        .with_linear_velocity(Vec3::new(0.0, 1.0, 0.0));
    let platform = sim.add_body(platform).unwrap();
    let rider = sim.add_body(ball(Vec3::new(0.0, 0.5, 0.0))).unwrap();

    for i in 1..=60 {
        sim.body_mut(platform)
            .unwrap()
            .set_pose(Pose::from_position(Vec3::new(0.0, -0.5 + i as f32 * H, 0.0)));
        sim.step().unwrap();
    }
    // Carried up about one metre
    assert!(sim.body(rider).unwrap().position().y > 1.3);
}

#[test]
fn test_ray_cast_finds_owner() {
    let mut sim = Simulation::default();
    let target = sim.add_body(ball(Vec3::new(0.0, 0.0, -5.0))).unwrap();
    sim.add_body(ball(Vec3::new(0.0, 0.0, -9.0))).unwrap();
    sim.step().unwrap();

    let hit = sim
        .collision_domain()
        .ray_cast(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 100.0, None)
        .unwrap();
    assert_eq!(hit.owner, Some(target));
    assert_relative_eq!(hit.distance, 4.5, epsilon = 1e-4);
    assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-4);
}
