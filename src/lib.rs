//! # rigidsim
//!
//! A rigid body physics core.
//!
//! ## Features
//!
//! - **Shapes**: box, sphere, capsule, cylinder, convex hull, plane,
//!   triangle mesh and ray
//! - **Collision Detection**: dynamic AABB tree broad phase with a pluggable
//!   pair filter; analytic, SAT and GJK + EPA narrow phase
//! - **Persistent Contacts**: up to four contacts per pair, matched across
//!   frames by feature id so impulses carry over
//! - **Constraints**: contacts, ball/hinge/fixed joints, distance, linear and
//!   angular limits, velocity and Euler angle motors
//! - **Solver**: sequential impulses with warm starting
//! - **Stepping**: fixed sub-steps with a per-update cap, opt-in sleeping
//!
//! ## Quick Start
//!
//! ```rust
//! use rigidsim::prelude::*;
//!
//! let mut sim = Simulation::default();
//! sim.add_force_effect(Box::new(Gravity::default()));
//!
//! // Static floor
//! let floor = RigidBody::fixed(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0))?)
//!     .with_position(Vec3::new(0.0, -0.5, 0.0));
//! sim.add_body(floor)?;
//!
//! // Dynamic ball
//! let ball = RigidBody::dynamic(Shape::sphere(0.5)?, 1.0)?.with_position(Vec3::new(0.0, 5.0, 0.0));
//! let ball = sim.add_body(ball)?;
//!
//! let dt = 1.0 / 60.0;
//! for _ in 0..600 {
//!     sim.update(dt)?;
//! }
//! let position = sim.body(ball).map(|b| b.position()).unwrap_or_default();
//! assert!((position.y - 0.5).abs() < 0.05);
//! # Ok::<(), rigidsim::PhysicsError>(())
//! ```

mod arena;
pub mod collision;
pub mod constraints;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod math;
pub mod settings;
mod simulation;
pub mod solver;

pub use error::{PhysicsError, Result};
pub use settings::{ContactSettings, SimulationSettings, SleepSettings, SolverSettings};
pub use simulation::{Simulation, StepPhase, StepStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collision::{CollisionDomain, CollisionObject, Contact, ContactSet, ObjectHandle, RayHit};
    pub use crate::constraints::{
        AngularLimit, AngularVelocityMotor, BallJoint, Constraint, ConstraintHandle, ConstraintKind, DistanceLimit,
        EulerAngleMotor, FixedJoint, HingeJoint, LinearLimit, LinearVelocityMotor,
    };
    pub use crate::dynamics::{BodyHandle, Damping, Explosion, ForceEffect, Gravity, MotionType, RigidBody};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::geometry::{Aabb, MassProperties, Shape, ShapeType};
    pub use crate::math::{Mat3, Pose, Quat, Vec3};
    pub use crate::settings::SimulationSettings;
    pub use crate::simulation::{Simulation, StepPhase, StepStats};
}
