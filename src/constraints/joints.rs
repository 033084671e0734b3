//! Compound joints: ball, hinge and fixed.

use crate::dynamics::RigidBody;
use crate::error::{PhysicsError, Result};
use crate::math::utils::{rotation_vector, tangent_basis, twist_angle};
use crate::math::{Pose, Quat, Vec3};
use crate::settings::SolverSettings;

use super::limits::angle_limit_rows;
use super::row::{correction_bias, ConstraintRow, Jacobian};

/// Unit axis or [`PhysicsError::DegenerateAxis`].
pub(super) fn unit_axis(axis: Vec3, context: &'static str) -> Result<Vec3> {
    axis.try_normalize()
        .filter(|a| a.is_finite())
        .ok_or(PhysicsError::DegenerateAxis(context))
}

/// Three rows pinning two body-local anchors together.
pub(super) fn point_rows(
    local_anchor_a: Vec3,
    local_anchor_b: Vec3,
    a: &RigidBody,
    b: &RigidBody,
    dt: f32,
    settings: &SolverSettings,
    softness: f32,
    out: &mut Vec<ConstraintRow>,
) {
    let pa = a.pose().transform_point(local_anchor_a);
    let pb = b.pose().transform_point(local_anchor_b);
    let r_a = pa - a.position();
    let r_b = pb - b.position();
    let error = pa - pb;
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        let bias = correction_bias(error.dot(axis), dt, settings);
        out.push(ConstraintRow::equality(Jacobian::point(axis, r_a, r_b), bias).with_softness(softness));
    }
}

/// Orientation of B relative to A.
#[inline]
pub(super) fn relative_rotation(a: &Pose, b: &Pose) -> Quat {
    (a.orientation.inverse() * b.orientation).normalize()
}

/// Keeps two anchor points together; rotation is free.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BallJoint {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    /// Overrides the solver's default softness
    pub softness: Option<f32>,
}

impl BallJoint {
    pub fn new(local_anchor_a: Vec3, local_anchor_b: Vec3) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            softness: None,
        }
    }

    /// Joint at a world-space anchor, using the bodies' current poses.
    pub fn at_world(pose_a: &Pose, pose_b: &Pose, anchor: Vec3) -> Self {
        Self::new(pose_a.inverse_transform_point(anchor), pose_b.inverse_transform_point(anchor))
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) {
        let softness = self.softness.unwrap_or(settings.default_softness);
        point_rows(self.local_anchor_a, self.local_anchor_b, a, b, dt, settings, softness, out);
    }
}

/// Velocity motor on a hinge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HingeMotor {
    /// Target angular velocity of B relative to A about the hinge axis;
    /// NaN turns the motor off
    pub target_velocity: f32,
    pub max_torque: f32,
}

/// Rotation about a single axis, with an optional angle limit and motor.
///
/// The hinge angle is the twist of B relative to A about the axis,
/// measured from `reference_rotation`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HingeJoint {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    pub local_axis_a: Vec3,
    pub local_axis_b: Vec3,
    /// B's orientation relative to A at angle zero
    pub reference_rotation: Quat,
    /// Angle range `(min, max)` in radians
    pub limit: Option<(f32, f32)>,
    pub motor: Option<HingeMotor>,
    pub softness: Option<f32>,
}

impl HingeJoint {
    /// Hinge through a world anchor about a world axis; the current poses
    /// define angle zero.
    pub fn at_world(pose_a: &Pose, pose_b: &Pose, anchor: Vec3, axis: Vec3) -> Result<Self> {
        let axis = unit_axis(axis, "hinge axis")?;
        Ok(Self {
            local_anchor_a: pose_a.inverse_transform_point(anchor),
            local_anchor_b: pose_b.inverse_transform_point(anchor),
            local_axis_a: pose_a.inverse_transform_vector(axis),
            local_axis_b: pose_b.inverse_transform_vector(axis),
            reference_rotation: relative_rotation(pose_a, pose_b),
            limit: None,
            motor: None,
            softness: None,
        })
    }

    pub fn with_limit(mut self, min: f32, max: f32) -> Result<Self> {
        if !(min <= max) {
            return Err(PhysicsError::InvalidLimits { min, max });
        }
        self.limit = Some((min, max));
        Ok(self)
    }

    pub fn with_motor(mut self, target_velocity: f32, max_torque: f32) -> Self {
        self.motor = Some(HingeMotor {
            target_velocity,
            max_torque,
        });
        self
    }

    /// Current hinge angle for the given poses.
    pub fn angle(&self, pose_a: &Pose, pose_b: &Pose) -> f32 {
        let deviation = relative_rotation(pose_a, pose_b) * self.reference_rotation.inverse();
        twist_angle(deviation, self.local_axis_a.normalize_or_zero())
    }

    pub(super) fn validate(&self) -> Result<()> {
        unit_axis(self.local_axis_a, "hinge axis")?;
        unit_axis(self.local_axis_b, "hinge axis")?;
        if let Some((min, max)) = self.limit {
            if !(min <= max) {
                return Err(PhysicsError::InvalidLimits { min, max });
            }
        }
        Ok(())
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) -> Result<()> {
        let softness = self.softness.unwrap_or(settings.default_softness);
        point_rows(self.local_anchor_a, self.local_anchor_b, a, b, dt, settings, softness, out);

        let axis_a = a.orientation() * unit_axis(self.local_axis_a, "hinge axis")?;
        let axis_b = b.orientation() * unit_axis(self.local_axis_b, "hinge axis")?;
        // Misalignment of B's axis, measured across A's axis
        let error = axis_b.cross(axis_a);
        let (t1, t2) = tangent_basis(axis_a);
        for t in [t1, t2] {
            let bias = correction_bias(error.dot(t), dt, settings);
            out.push(ConstraintRow::equality(Jacobian::angular(t), bias).with_softness(softness));
        }

        if let Some((min, max)) = self.limit {
            let angle = self.angle(&a.pose(), &b.pose());
            angle_limit_rows(angle, axis_a, min, max, dt, settings, out);
        }
        if let Some(motor) = self.motor {
            out.push(ConstraintRow::motor(
                Jacobian::angular(axis_a).negated(),
                motor.target_velocity,
                motor.max_torque * dt,
            ));
        }
        Ok(())
    }
}

/// Locks relative position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedJoint {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    /// B's orientation relative to A to hold
    pub reference_rotation: Quat,
    pub softness: Option<f32>,
}

impl FixedJoint {
    /// Welds the bodies in their current poses at a world anchor.
    pub fn at_world(pose_a: &Pose, pose_b: &Pose, anchor: Vec3) -> Self {
        Self {
            local_anchor_a: pose_a.inverse_transform_point(anchor),
            local_anchor_b: pose_b.inverse_transform_point(anchor),
            reference_rotation: relative_rotation(pose_a, pose_b),
            softness: None,
        }
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) {
        let softness = self.softness.unwrap_or(settings.default_softness);
        point_rows(self.local_anchor_a, self.local_anchor_b, a, b, dt, settings, softness, out);

        let target = a.orientation() * self.reference_rotation;
        let error = rotation_vector(b.orientation() * target.inverse());
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let bias = correction_bias(-error.dot(axis), dt, settings);
            out.push(ConstraintRow::equality(Jacobian::angular(axis), bias).with_softness(softness));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn body_at(pose: Pose) -> RigidBody {
        RigidBody::dynamic(Shape::cuboid(Vec3::splat(0.5)).unwrap(), 1.0)
            .unwrap()
            .with_pose(pose)
    }

    #[test]
    fn test_ball_joint_rows_correct_drift() {
        let a = body_at(Pose::IDENTITY);
        let b = body_at(Pose::from_position(Vec3::new(2.1, 0.0, 0.0)));
        let joint = BallJoint::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));

        let settings = SolverSettings::default();
        let mut rows = Vec::new();
        joint.rows(&a, &b, 0.1, &settings, &mut rows);
        assert_eq!(rows.len(), 3);
        // Anchors 0.1 apart along X: A must move toward B
        assert!(rows[0].bias > 0.0);
        assert_relative_eq!(rows[1].bias, 0.0);
        assert_eq!(rows[0].min_impulse, f32::NEG_INFINITY);
    }

    #[test]
    fn test_hinge_angle_tracks_twist() {
        let pose_a = Pose::IDENTITY;
        let pose_b = Pose::from_position(Vec3::X);
        let hinge = HingeJoint::at_world(&pose_a, &pose_b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z).unwrap();
        assert_relative_eq!(hinge.angle(&pose_a, &pose_b), 0.0);

        let turned = Pose::new(Vec3::X, Quat::from_rotation_z(0.4));
        assert_relative_eq!(hinge.angle(&pose_a, &turned), 0.4, epsilon = 1e-5);
        let both = Pose::from_orientation(Quat::from_rotation_z(0.4));
        assert_relative_eq!(hinge.angle(&both, &turned), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_hinge_configuration_errors() {
        let pose = Pose::IDENTITY;
        assert!(matches!(
            HingeJoint::at_world(&pose, &pose, Vec3::ZERO, Vec3::ZERO),
            Err(PhysicsError::DegenerateAxis(_))
        ));
        let hinge = HingeJoint::at_world(&pose, &pose, Vec3::ZERO, Vec3::Y).unwrap();
        assert!(matches!(hinge.with_limit(1.0, -1.0), Err(PhysicsError::InvalidLimits { .. })));

        let mut broken = hinge;
        broken.local_axis_b = Vec3::ZERO;
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_hinge_rows() {
        let a = body_at(Pose::IDENTITY);
        let b = body_at(Pose::from_position(Vec3::X));
        let hinge = HingeJoint::at_world(&a.pose(), &b.pose(), Vec3::new(0.5, 0.0, 0.0), Vec3::Z)
            .unwrap()
            .with_limit(-FRAC_PI_2, FRAC_PI_2)
            .unwrap()
            .with_motor(f32::NAN, 10.0);

        let mut rows = Vec::new();
        hinge.rows(&a, &b, 1.0 / 60.0, &SolverSettings::default(), &mut rows).unwrap();
        // 3 point + 2 alignment + 2 limit + 1 motor
        assert_eq!(rows.len(), 8);
        let motor = rows[7];
        assert_eq!((motor.min_impulse, motor.max_impulse), (0.0, 0.0));
        // Both limits are open at angle zero
        assert!(rows[5].bias < 0.0 && rows[6].bias < 0.0);
        assert_eq!(rows[5].min_impulse, 0.0);
    }

    #[test]
    fn test_fixed_joint_error_direction() {
        let a = body_at(Pose::IDENTITY);
        let b = body_at(Pose::from_position(Vec3::X));
        let joint = FixedJoint::at_world(&a.pose(), &b.pose(), Vec3::new(0.5, 0.0, 0.0));

        let twisted = body_at(Pose::new(Vec3::X, Quat::from_rotation_y(0.1)));
        let settings = SolverSettings::default();
        let mut rows = Vec::new();
        joint.rows(&a, &twisted, 0.1, &settings, &mut rows);
        assert_eq!(rows.len(), 6);
        // B turned +Y: the Y row drives ωB - ωA negative
        let y_row = rows[4];
        assert!(y_row.bias > 0.0);
        assert_relative_eq!(rows[3].bias, 0.0, epsilon = 1e-6);
    }
}
