//! Math types used throughout the crate.
//!
//! Vectors, quaternions and matrices come from `glam`; this module adds the
//! rigid [`Pose`] and a handful of helpers the collision and solver code share.

mod pose;

pub use glam::{EulerRot, Mat3, Quat, Vec3};
pub use pose::Pose;

/// Common math constants
pub mod consts {
    /// A small epsilon value for floating point comparisons
    pub const EPSILON: f32 = 1e-6;

    /// Squared lengths below this are treated as zero-length vectors
    pub const LENGTH_SQUARED_EPSILON: f32 = 1e-12;
}

/// Utility functions
pub mod utils {
    use super::consts::LENGTH_SQUARED_EPSILON;
    use super::{Quat, Vec3};

    /// Normalizes `v`, falling back to `fallback` for near zero-length input.
    #[inline]
    pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
        let len_sq = v.length_squared();
        if len_sq > LENGTH_SQUARED_EPSILON && len_sq.is_finite() {
            v / len_sq.sqrt()
        } else {
            tracing::trace!(?v, "degenerate vector, using canonical axis");
            fallback
        }
    }

    /// Two unit tangents completing `normal` to a right-handed orthonormal basis.
    #[inline]
    pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
        // Pick the axis least aligned with the normal
        let t1 = if normal.x.abs() < 0.57735 {
            Vec3::new(0.0, normal.z, -normal.y)
        } else {
            Vec3::new(normal.y, -normal.x, 0.0)
        };
        let t1 = normalize_or(t1, normal.any_orthonormal_vector());
        let t2 = normal.cross(t1);
        (t1, t2)
    }

    /// Integrates an angular velocity over `dt`, returning a unit quaternion.
    #[inline]
    pub fn integrate_rotation(rotation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
        let omega = angular_velocity * dt;
        let angle = omega.length();
        if angle < 1e-10 {
            return rotation;
        }
        let delta = Quat::from_axis_angle(omega / angle, angle);
        (delta * rotation).normalize()
    }

    /// Small-angle rotation vector of a quaternion (shortest arc).
    #[inline]
    pub fn rotation_vector(q: Quat) -> Vec3 {
        let q = if q.w < 0.0 { -q } else { q };
        let (axis, angle) = q.to_axis_angle();
        if angle.abs() < 1e-7 || !axis.is_finite() {
            Vec3::new(q.x, q.y, q.z) * 2.0
        } else {
            axis * angle
        }
    }

    /// Twist angle of `q` about the unit `axis`, wrapped to `[-pi, pi]`.
    #[inline]
    pub fn twist_angle(q: Quat, axis: Vec3) -> f32 {
        let projection = Vec3::new(q.x, q.y, q.z).dot(axis);
        let angle = 2.0 * projection.atan2(q.w);
        wrap_angle(angle)
    }

    /// Wraps an angle to `[-pi, pi]`.
    #[inline]
    pub fn wrap_angle(angle: f32) -> f32 {
        use std::f32::consts::{PI, TAU};
        let mut a = angle % TAU;
        if a > PI {
            a -= TAU;
        } else if a < -PI {
            a += TAU;
        }
        a
    }
}
