//! Basic simulation example
//!
//! A ball and a short box stack fall onto a static floor under gravity; a
//! pendulum swings from a hinge. Run with `cargo run --example basic_simulation`.

use rigidsim::prelude::*;

fn main() -> Result<()> {
    println!("rigidsim - Basic Simulation Example");
    println!("===================================\n");

    let mut settings = SimulationSettings::default();
    settings.sleeping.enabled = true;
    let mut sim = Simulation::new(settings)?;
    sim.add_force_effect(Box::new(Gravity::default()));

    // Floor, top surface at Y=0
    let floor = RigidBody::fixed(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0))?).with_position(Vec3::new(0.0, -0.5, 0.0));
    let floor = sim.add_body(floor)?;
    println!("Created floor (top surface at Y=0)");

    let ball = RigidBody::dynamic(Shape::sphere(0.5)?, 1.0)?
        .with_position(Vec3::new(0.0, 5.0, 0.0))
        .with_restitution(0.5);
    let ball = sim.add_body(ball)?;
    println!("Created ball at Y=5.0 (radius=0.5)");

    for i in 0..3 {
        let cube = RigidBody::dynamic(Shape::cuboid(Vec3::splat(0.5))?, 1.0)?
            .with_position(Vec3::new(3.0, 0.5 + i as f32 * 1.01, 0.0));
        sim.add_body(cube)?;
    }
    println!("Created a stack of three boxes at X=3.0");

    // Pendulum hinged to the floor body at a point above it
    let bob = RigidBody::dynamic(Shape::sphere(0.25)?, 1.0)?.with_position(Vec3::new(-2.0, 4.0, 0.0));
    let bob = sim.add_body(bob)?;
    let pivot = Vec3::new(-3.0, 4.0, 0.0);
    let (floor_pose, bob_pose) = match (sim.body(floor), sim.body(bob)) {
        (Some(f), Some(b)) => (f.pose(), b.pose()),
        _ => return Err(PhysicsError::UnknownBody(bob)),
    };
    let hinge = HingeJoint::at_world(&floor_pose, &bob_pose, pivot, Vec3::Z)?;
    sim.add_constraint(Constraint::new(floor, bob, hinge))?;
    println!("Created a pendulum hinged at {pivot}\n");

    let dt = 1.0 / 60.0;
    let total_time = 4.0;
    let steps = (total_time / dt) as usize;
    println!("Simulating {total_time} seconds ({steps} updates at {}Hz)...\n", 1.0 / dt);

    for i in 0..steps {
        sim.update(dt)?;

        if i % 30 == 0 {
            let Some(body) = sim.body(ball) else { break };
            let pos = body.position();
            let vel = body.linear_velocity;
            println!(
                "t={:.2}s: ball=({:.3}, {:.3}, {:.3}) v=({:.3}, {:.3}, {:.3}) contacts={}",
                i as f32 * dt,
                pos.x,
                pos.y,
                pos.z,
                vel.x,
                vel.y,
                vel.z,
                sim.last_step_stats().contact_sets
            );
        }
    }

    if let Some(body) = sim.body(ball) {
        let pos = body.position();
        println!("\nFinal ball position: ({:.3}, {:.3}, {:.3})", pos.x, pos.y, pos.z);
        println!("Expected resting position: ~(0, 0.5, 0) (floor top at 0 + ball radius 0.5)");
        println!("Ball sleeping: {}", body.is_sleeping());
    }
    if let Some(body) = sim.body(bob) {
        println!("Pendulum bob distance from pivot: {:.3}", body.position().distance(pivot));
    }
    println!("Total sub-steps: {}", sim.step_count());
    Ok(())
}
