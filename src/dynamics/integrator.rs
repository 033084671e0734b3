use crate::math::utils::integrate_rotation;
use crate::math::{Pose, Vec3};

use super::rigid_body::RigidBody;

/// Applies the accumulated force and torque to the velocities, then
/// clears the accumulators.
pub fn integrate_forces(body: &mut RigidBody, dt: f32) {
    if !body.is_dynamic() || body.is_sleeping() {
        body.clear_forces();
        return;
    }

    body.linear_velocity += body.force() * (body.inverse_mass() * dt);
    body.angular_velocity += body.inverse_inertia_world() * body.torque() * dt;
    body.clear_forces();
}

/// Clamps velocities to prevent instability
pub fn clamp_velocities(body: &mut RigidBody, max_linear: f32, max_angular: f32) {
    body.linear_velocity = body.linear_velocity.clamp_length_max(max_linear);
    body.angular_velocity = body.angular_velocity.clamp_length_max(max_angular);
}

/// Integrates the pose of a dynamic, awake body (semi-implicit Euler).
///
/// Static and kinematic bodies keep the pose the host gave them.
pub fn integrate_pose(body: &mut RigidBody, dt: f32) {
    if !body.is_dynamic() || body.is_sleeping() {
        return;
    }

    let pose = body.pose();
    let position = pose.position + body.linear_velocity * dt;
    let orientation = integrate_rotation(pose.orientation, body.angular_velocity, dt);
    body.set_pose_unchecked(Pose::new(position, orientation));
}

/// Velocity after damping with coefficient `c` (fraction lost per second).
#[inline]
pub fn damped(velocity: Vec3, c: f32, dt: f32) -> Vec3 {
    velocity * (1.0 - c.clamp(0.0, 1.0)).powf(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::MotionType;
    use crate::geometry::Shape;
    use approx::assert_relative_eq;

    fn ball() -> RigidBody {
        RigidBody::dynamic(Shape::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_mass(1.0)
            .unwrap()
    }

    #[test]
    fn test_force_integration() {
        let mut body = ball();
        body.apply_force(Vec3::new(0.0, -10.0, 0.0));
        integrate_forces(&mut body, 0.5);
        integrate_pose(&mut body, 0.5);

        assert_relative_eq!(body.linear_velocity.y, -5.0);
        assert_relative_eq!(body.position().y, -2.5);
        assert_eq!(body.force(), Vec3::ZERO);
    }

    #[test]
    fn test_static_body_no_integration() {
        let mut body = RigidBody::fixed(Shape::sphere(1.0).unwrap());
        body.linear_velocity = Vec3::X;
        integrate_pose(&mut body, 1.0);
        assert_eq!(body.position(), Vec3::ZERO);
    }

    #[test]
    fn test_kinematic_pose_is_authoritative() {
        let mut body = ball();
        body.set_motion_type(MotionType::Kinematic).unwrap();
        body.linear_velocity = Vec3::X;
        integrate_pose(&mut body, 1.0);
        assert_eq!(body.position(), Vec3::ZERO);
    }

    #[test]
    fn test_angular_velocity_integration() {
        let mut body = ball();
        body.angular_velocity = Vec3::new(0.0, 0.0, std::f32::consts::PI);

        for _ in 0..60 {
            integrate_pose(&mut body, 1.0 / 60.0);
        }

        // Half a turn about Z flips the local X axis
        let local_x = body.orientation() * Vec3::X;
        assert!(local_x.x < -0.99);
        assert_relative_eq!(body.orientation().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_clamp_and_damping() {
        let mut body = ball();
        body.linear_velocity = Vec3::new(300.0, 0.0, 400.0);
        body.angular_velocity = Vec3::new(0.0, 80.0, 0.0);
        clamp_velocities(&mut body, 100.0, 50.0);
        assert_relative_eq!(body.linear_velocity.length(), 100.0, epsilon = 1e-3);
        assert_relative_eq!(body.angular_velocity.y, 50.0);

        let v = damped(Vec3::new(10.0, 0.0, 0.0), 0.1, 1.0);
        assert_relative_eq!(v.x, 9.0, epsilon = 1e-5);
        assert_eq!(damped(Vec3::X, 0.5, 0.0), Vec3::X);
    }
}
