//! External force generators applied to bodies each sub-step.

use std::fmt;

use crate::arena::arena_handle;
use crate::math::utils::normalize_or;
use crate::math::Vec3;

use super::integrator::damped;
use super::rigid_body::{BodyHandle, RigidBody};

arena_handle!(
    /// Generational handle to a force effect in a simulation.
    ForceEffectHandle
);

/// A force generator.
///
/// `apply` runs once per sub-step for every dynamic body that is awake, or
/// for sleeping ones too when [`ForceEffect::affects_sleeping`] is true.
/// Effects may change velocities directly or add to the force accumulators.
pub trait ForceEffect: Send + fmt::Debug {
    fn apply(&mut self, handle: BodyHandle, body: &mut RigidBody, dt: f32);

    /// Called after every body has been visited in a sub-step.
    fn end_step(&mut self) {}

    /// Finished effects are removed by the simulation.
    fn is_finished(&self) -> bool {
        false
    }

    fn affects_sleeping(&self) -> bool {
        false
    }
}

/// Uniform acceleration, `dv = g * dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    pub acceleration: Vec3,
}

impl Gravity {
    pub fn new(acceleration: Vec3) -> Self {
        Self { acceleration }
    }
}

impl Default for Gravity {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl ForceEffect for Gravity {
    fn apply(&mut self, _handle: BodyHandle, body: &mut RigidBody, dt: f32) {
        body.linear_velocity += self.acceleration * dt;
    }
}

/// Velocity damping, `v *= (1 - c)^dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damping {
    pub linear: f32,
    pub angular: f32,
}

impl Damping {
    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }
}

impl ForceEffect for Damping {
    fn apply(&mut self, _handle: BodyHandle, body: &mut RigidBody, dt: f32) {
        body.linear_velocity = damped(body.linear_velocity, self.linear, dt);
        body.angular_velocity = damped(body.angular_velocity, self.angular, dt);
    }
}

/// One-shot radial impulse.
///
/// Bodies within `radius` of `center` receive an impulse pointing away
/// from it, falling off linearly from `strength` at the center to zero at
/// the radius. Wakes sleeping bodies it reaches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explosion {
    pub center: Vec3,
    pub radius: f32,
    pub strength: f32,
    fired: bool,
}

impl Explosion {
    pub fn new(center: Vec3, radius: f32, strength: f32) -> Self {
        Self {
            center,
            radius,
            strength,
            fired: false,
        }
    }
}

impl ForceEffect for Explosion {
    fn apply(&mut self, _handle: BodyHandle, body: &mut RigidBody, _dt: f32) {
        if self.fired {
            return;
        }
        let offset = body.position() - self.center;
        let distance = offset.length();
        if distance >= self.radius {
            return;
        }
        let falloff = 1.0 - distance / self.radius;
        body.apply_impulse(normalize_or(offset, Vec3::Y) * (self.strength * falloff));
    }

    fn end_step(&mut self) {
        self.fired = true;
    }

    fn is_finished(&self) -> bool {
        self.fired
    }

    fn affects_sleeping(&self) -> bool {
        true
    }
}

/// Constant force and torque, on one body or on all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantForce {
    /// `None` applies to every body
    pub target: Option<BodyHandle>,
    pub force: Vec3,
    pub torque: Vec3,
}

impl ConstantForce {
    pub fn new(target: Option<BodyHandle>, force: Vec3) -> Self {
        Self {
            target,
            force,
            torque: Vec3::ZERO,
        }
    }

    pub fn with_torque(mut self, torque: Vec3) -> Self {
        self.torque = torque;
        self
    }
}

impl ForceEffect for ConstantForce {
    fn apply(&mut self, handle: BodyHandle, body: &mut RigidBody, _dt: f32) {
        if self.target.map_or(true, |target| target == handle) {
            body.apply_force(self.force);
            body.apply_torque(self.torque);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaHandle;
    use crate::geometry::Shape;
    use approx::assert_relative_eq;

    fn ball_at(position: Vec3) -> RigidBody {
        RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_mass(2.0)
            .unwrap()
            .with_position(position)
    }

    fn handle(i: u32) -> BodyHandle {
        BodyHandle::from_raw_parts(i, 0)
    }

    #[test]
    fn test_gravity_and_damping() {
        let mut body = ball_at(Vec3::ZERO);
        Gravity::default().apply(handle(0), &mut body, 0.5);
        assert_relative_eq!(body.linear_velocity.y, -4.905, epsilon = 1e-5);

        body.linear_velocity = Vec3::new(10.0, 0.0, 0.0);
        Damping::new(0.5, 0.0).apply(handle(0), &mut body, 1.0);
        assert_relative_eq!(body.linear_velocity.x, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_explosion_fires_once() {
        let mut explosion = Explosion::new(Vec3::ZERO, 4.0, 8.0);
        let mut near = ball_at(Vec3::new(2.0, 0.0, 0.0));
        let mut far = ball_at(Vec3::new(5.0, 0.0, 0.0));

        explosion.apply(handle(0), &mut near, 0.1);
        explosion.apply(handle(1), &mut far, 0.1);
        explosion.end_step();

        // Half strength at half radius, over mass 2
        assert_relative_eq!(near.linear_velocity.x, 2.0, epsilon = 1e-5);
        assert_eq!(far.linear_velocity, Vec3::ZERO);
        assert!(explosion.is_finished());

        explosion.apply(handle(0), &mut near, 0.1);
        assert_relative_eq!(near.linear_velocity.x, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_constant_force_targets_one_body() {
        let mut effect = ConstantForce::new(Some(handle(1)), Vec3::new(0.0, 3.0, 0.0));
        let mut a = ball_at(Vec3::ZERO);
        let mut b = ball_at(Vec3::ZERO);
        effect.apply(handle(0), &mut a, 0.1);
        effect.apply(handle(1), &mut b, 0.1);
        assert_eq!(a.force(), Vec3::ZERO);
        assert_eq!(b.force(), Vec3::new(0.0, 3.0, 0.0));
    }
}
