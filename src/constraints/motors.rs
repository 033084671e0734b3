//! Velocity and orientation motors.
//!
//! Motors are soft: `damping` sets how stiffly the target velocity is
//! tracked, and the applied force or torque never exceeds its maximum.
//! A NaN target switches the affected row off.

use crate::dynamics::RigidBody;
use crate::error::{PhysicsError, Result};
use crate::math::utils::wrap_angle;
use crate::math::{EulerRot, Quat, Vec3};

use super::joints::unit_axis;
use super::row::{ConstraintRow, Jacobian};

/// Softness for a velocity motor with the given damping; infinite damping
/// is rigid.
fn velocity_softness(damping: f32, dt: f32) -> f32 {
    if damping.is_infinite() {
        0.0
    } else {
        1.0 / (dt * damping)
    }
}

fn check_gains(values: &[f32]) -> Result<()> {
    if values.iter().all(|v| *v > 0.0) {
        Ok(())
    } else {
        Err(PhysicsError::InvalidSettings("motor gains must be positive"))
    }
}

/// Drives the velocity of B relative to A along an axis fixed in A.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearVelocityMotor {
    pub local_axis_a: Vec3,
    pub target_velocity: f32,
    pub max_force: f32,
    pub damping: f32,
}

impl LinearVelocityMotor {
    pub fn new(local_axis_a: Vec3, target_velocity: f32, max_force: f32) -> Result<Self> {
        Ok(Self {
            local_axis_a: unit_axis(local_axis_a, "motor axis")?,
            target_velocity,
            max_force,
            damping: f32::INFINITY,
        })
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub(super) fn validate(&self) -> Result<()> {
        unit_axis(self.local_axis_a, "motor axis")?;
        check_gains(&[self.damping])
    }

    pub(super) fn rows(&self, a: &RigidBody, _b: &RigidBody, dt: f32, out: &mut Vec<ConstraintRow>) -> Result<()> {
        let axis = a.orientation() * unit_axis(self.local_axis_a, "motor axis")?;
        let row = ConstraintRow::motor(Jacobian::linear(axis).negated(), self.target_velocity, self.max_force * dt)
            .with_softness(velocity_softness(self.damping, dt));
        out.push(row);
        Ok(())
    }
}

/// Drives the angular velocity of B relative to A about an axis fixed in A.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AngularVelocityMotor {
    pub local_axis_a: Vec3,
    pub target_velocity: f32,
    pub max_torque: f32,
    pub damping: f32,
}

impl AngularVelocityMotor {
    pub fn new(local_axis_a: Vec3, target_velocity: f32, max_torque: f32) -> Result<Self> {
        Ok(Self {
            local_axis_a: unit_axis(local_axis_a, "motor axis")?,
            target_velocity,
            max_torque,
            damping: f32::INFINITY,
        })
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub(super) fn validate(&self) -> Result<()> {
        unit_axis(self.local_axis_a, "motor axis")?;
        check_gains(&[self.damping])
    }

    pub(super) fn rows(&self, a: &RigidBody, _b: &RigidBody, dt: f32, out: &mut Vec<ConstraintRow>) -> Result<()> {
        let axis = a.orientation() * unit_axis(self.local_axis_a, "motor axis")?;
        let row = ConstraintRow::motor(Jacobian::angular(axis).negated(), self.target_velocity, self.max_torque * dt)
            .with_softness(velocity_softness(self.damping, dt));
        out.push(row);
        Ok(())
    }
}

/// Spring-damper pulling B's orientation relative to A toward XYZ Euler
/// angles, one row per Euler angle.
///
/// Each row acts about the rate axis of its angle: A's X, A's Y after the
/// X rotation, and B's Z. Freeing one angle leaves the others unaffected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EulerAngleMotor {
    /// Target angles in radians; a NaN component leaves that axis free
    pub target_angles: Vec3,
    pub spring: f32,
    pub damping: f32,
    pub max_torque: f32,
}

impl EulerAngleMotor {
    pub fn new(target_angles: Vec3, spring: f32, damping: f32, max_torque: f32) -> Self {
        Self {
            target_angles,
            spring,
            damping,
            max_torque,
        }
    }

    /// Target relative orientation, treating NaN angles as zero.
    pub fn target_rotation(&self) -> Quat {
        let zeroed = |v: f32| if v.is_nan() { 0.0 } else { v };
        let t = self.target_angles;
        Quat::from_euler(EulerRot::XYZ, zeroed(t.x), zeroed(t.y), zeroed(t.z))
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.spring < 0.0 || self.damping < 0.0 || self.spring + self.damping <= 0.0 {
            return Err(PhysicsError::InvalidSettings("euler motor needs a positive spring or damping"));
        }
        Ok(())
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, out: &mut Vec<ConstraintRow>) {
        let relative = a.orientation().inverse() * b.orientation();
        let (x, y, z) = relative.to_euler(EulerRot::XYZ);
        let angles = [x, y, z];
        let rate_axes = [
            a.orientation() * Vec3::X,
            a.orientation() * (Quat::from_rotation_x(x) * Vec3::Y),
            b.orientation() * Vec3::Z,
        ];

        let hk = dt * self.spring;
        let gamma = 1.0 / (dt * (self.damping + hk));
        let max_impulse = self.max_torque * dt;
        let targets = self.target_angles.to_array();
        for i in 0..3 {
            let jacobian = Jacobian::angular(rate_axes[i]).negated();
            if targets[i].is_nan() || !gamma.is_finite() {
                out.push(ConstraintRow::disabled(jacobian));
                continue;
            }
            let error = wrap_angle(angles[i] - targets[i]);
            out.push(ConstraintRow::motor(jacobian, -error * hk * gamma, max_impulse).with_softness(gamma));
        }
    }
}
