//! Range limits on distance, linear offset and twist angle.

use crate::dynamics::RigidBody;
use crate::error::{PhysicsError, Result};
use crate::math::utils::{normalize_or, twist_angle};
use crate::math::{Pose, Quat, Vec3};
use crate::settings::SolverSettings;

use super::joints::{relative_rotation, unit_axis};
use super::row::{correction_bias, separation_bias, ConstraintRow, Jacobian};

fn check_range(min: f32, max: f32) -> Result<()> {
    if min <= max {
        Ok(())
    } else {
        Err(PhysicsError::InvalidLimits { min, max })
    }
}

/// Rows keeping `value` within `[min, max]`, where `jacobian` measures the
/// rate of change of `value`. Equal bounds collapse into one bilateral row;
/// an infinite bound emits no row.
fn range_rows(
    value: f32,
    jacobian: Jacobian,
    min: f32,
    max: f32,
    dt: f32,
    settings: &SolverSettings,
    softness: f32,
    out: &mut Vec<ConstraintRow>,
) {
    if min == max {
        let bias = correction_bias(value - min, dt, settings);
        out.push(ConstraintRow::equality(jacobian, bias).with_softness(softness));
        return;
    }
    if min.is_finite() {
        let bias = separation_bias(value - min, dt, settings);
        out.push(ConstraintRow::inequality(jacobian, bias).with_softness(softness));
    }
    if max.is_finite() {
        let bias = separation_bias(max - value, dt, settings);
        out.push(ConstraintRow::inequality(jacobian.negated(), bias).with_softness(softness));
    }
}

/// Limit rows for a twist angle about the world axis `axis`.
pub(super) fn angle_limit_rows(
    angle: f32,
    axis: Vec3,
    min: f32,
    max: f32,
    dt: f32,
    settings: &SolverSettings,
    out: &mut Vec<ConstraintRow>,
) {
    // d(angle)/dt = (ωB - ωA)·axis
    let jacobian = Jacobian::angular(axis).negated();
    range_rows(angle, jacobian, min, max, dt, settings, settings.default_softness, out);
}

/// Keeps the distance between two anchors within `[min_distance, max_distance]`.
///
/// With equal bounds this is a rigid rod.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceLimit {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub softness: Option<f32>,
}

impl DistanceLimit {
    pub fn new(local_anchor_a: Vec3, local_anchor_b: Vec3, min_distance: f32, max_distance: f32) -> Result<Self> {
        let limit = Self {
            local_anchor_a,
            local_anchor_b,
            min_distance,
            max_distance,
            softness: None,
        };
        limit.validate()?;
        Ok(limit)
    }

    /// A rod between two world points at their current distance.
    pub fn rod(pose_a: &Pose, pose_b: &Pose, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        let length = anchor_a.distance(anchor_b);
        Self {
            local_anchor_a: pose_a.inverse_transform_point(anchor_a),
            local_anchor_b: pose_b.inverse_transform_point(anchor_b),
            min_distance: length,
            max_distance: length,
            softness: None,
        }
    }

    pub(super) fn validate(&self) -> Result<()> {
        check_range(self.min_distance, self.max_distance)?;
        if self.min_distance < 0.0 {
            return Err(PhysicsError::InvalidLimits {
                min: self.min_distance,
                max: self.max_distance,
            });
        }
        Ok(())
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) {
        let pa = a.pose().transform_point(self.local_anchor_a);
        let pb = b.pose().transform_point(self.local_anchor_b);
        let offset = pa - pb;
        let distance = offset.length();
        let direction = normalize_or(offset, Vec3::X);
        let jacobian = Jacobian::point(direction, pa - a.position(), pb - b.position());
        let softness = self.softness.unwrap_or(settings.default_softness);
        range_rows(distance, jacobian, self.min_distance, self.max_distance, dt, settings, softness, out);
    }
}

/// Keeps B's anchor within `[min, max]` along an axis fixed in A.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearLimit {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    pub local_axis_a: Vec3,
    pub min: f32,
    pub max: f32,
    pub softness: Option<f32>,
}

impl LinearLimit {
    pub fn new(local_anchor_a: Vec3, local_anchor_b: Vec3, local_axis_a: Vec3, min: f32, max: f32) -> Result<Self> {
        let limit = Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a: unit_axis(local_axis_a, "linear limit axis")?,
            min,
            max,
            softness: None,
        };
        limit.validate()?;
        Ok(limit)
    }

    /// Signed offset of B's anchor from A's anchor along the axis.
    pub fn offset(&self, pose_a: &Pose, pose_b: &Pose) -> f32 {
        let axis = pose_a.transform_vector(self.local_axis_a.normalize_or_zero());
        (pose_b.transform_point(self.local_anchor_b) - pose_a.transform_point(self.local_anchor_a)).dot(axis)
    }

    pub(super) fn validate(&self) -> Result<()> {
        unit_axis(self.local_axis_a, "linear limit axis")?;
        check_range(self.min, self.max)
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) -> Result<()> {
        let axis = a.orientation() * unit_axis(self.local_axis_a, "linear limit axis")?;
        let pa = a.pose().transform_point(self.local_anchor_a);
        let pb = b.pose().transform_point(self.local_anchor_b);
        let offset = (pb - pa).dot(axis);
        // The axis turns with A, so A's angular term uses B's anchor
        let jacobian = Jacobian {
            linear_a: -axis,
            angular_a: -(pb - a.position()).cross(axis),
            linear_b: axis,
            angular_b: (pb - b.position()).cross(axis),
        };
        let softness = self.softness.unwrap_or(settings.default_softness);
        range_rows(offset, jacobian, self.min, self.max, dt, settings, softness, out);
        Ok(())
    }
}

/// Keeps the twist of B relative to A about an axis fixed in A within
/// `[min, max]` radians.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AngularLimit {
    pub local_axis_a: Vec3,
    /// B's orientation relative to A at angle zero
    pub reference_rotation: Quat,
    pub min: f32,
    pub max: f32,
}

impl AngularLimit {
    /// Limit about a world axis; the current poses define angle zero.
    pub fn at_world(pose_a: &Pose, pose_b: &Pose, axis: Vec3, min: f32, max: f32) -> Result<Self> {
        let axis = unit_axis(axis, "angular limit axis")?;
        check_range(min, max)?;
        Ok(Self {
            local_axis_a: pose_a.inverse_transform_vector(axis),
            reference_rotation: relative_rotation(pose_a, pose_b),
            min,
            max,
        })
    }

    pub fn angle(&self, pose_a: &Pose, pose_b: &Pose) -> f32 {
        let deviation = relative_rotation(pose_a, pose_b) * self.reference_rotation.inverse();
        twist_angle(deviation, self.local_axis_a.normalize_or_zero())
    }

    pub(super) fn validate(&self) -> Result<()> {
        unit_axis(self.local_axis_a, "angular limit axis")?;
        check_range(self.min, self.max)
    }

    pub(super) fn rows(&self, a: &RigidBody, b: &RigidBody, dt: f32, settings: &SolverSettings, out: &mut Vec<ConstraintRow>) -> Result<()> {
        let axis = a.orientation() * unit_axis(self.local_axis_a, "angular limit axis")?;
        let angle = self.angle(&a.pose(), &b.pose());
        angle_limit_rows(angle, axis, self.min, self.max, dt, settings, out);
        Ok(())
    }
}
