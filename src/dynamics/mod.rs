//! Rigid bodies, their integration and external force effects.

mod force_effect;
mod integrator;
mod rigid_body;

pub use force_effect::{ConstantForce, Damping, Explosion, ForceEffect, ForceEffectHandle, Gravity};
pub use integrator::{clamp_velocities, damped, integrate_forces, integrate_pose};
pub use rigid_body::{BodyHandle, MotionType, RigidBody};
