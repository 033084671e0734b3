use crate::arena::arena_handle;
use crate::collision::{ObjectHandle, DEFAULT_GROUP};
use crate::error::{PhysicsError, Result};
use crate::geometry::{MassProperties, Shape};
use crate::math::{Mat3, Pose, Quat, Vec3};

arena_handle!(
    /// Generational handle to a [`RigidBody`] in a simulation.
    BodyHandle
);

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionType {
    /// Moved by forces, constraints and contacts
    #[default]
    Dynamic,
    /// Moved by the host; infinite mass, its velocity is seen by constraints
    Kinematic,
    /// Never moves
    Static,
}

/// A rigid body in the simulation.
///
/// The body keeps its shape; registering it with a simulation creates a
/// collision object that carries the shape and follows the body's pose.
#[derive(Debug, Clone)]
pub struct RigidBody {
    shape: Shape,
    object: Option<ObjectHandle>,
    motion_type: MotionType,

    pose: Pose,
    /// Linear velocity
    pub linear_velocity: Vec3,
    /// Angular velocity (in radians per second)
    pub angular_velocity: Vec3,

    mass: f32,
    inv_mass: f32,
    /// Local inertia diagonal
    inertia: Vec3,
    inv_inertia_local: Vec3,
    /// World space inverse inertia tensor, refreshed with the pose
    inv_inertia_world: Mat3,

    /// Accumulated force (reset each sub-step)
    force: Vec3,
    /// Accumulated torque (reset each sub-step)
    torque: Vec3,

    /// Friction coefficient
    pub friction: f32,
    /// Restitution (bounciness)
    pub restitution: f32,
    /// Collision group of the body's collision object
    pub group: u32,

    /// Whether the body may be put to sleep
    pub can_sleep: bool,
    sleeping: bool,
    sleep_timer: f32,
}

impl RigidBody {
    fn with_motion(shape: Shape, motion_type: MotionType, props: MassProperties) -> Self {
        let mut body = Self {
            shape,
            object: None,
            motion_type,
            pose: Pose::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia_local: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            friction: 0.6,
            restitution: 0.3,
            group: DEFAULT_GROUP,
            can_sleep: true,
            sleeping: false,
            sleep_timer: 0.0,
        };
        body.mass = props.mass;
        body.inertia = props.inertia;
        body.refresh_inverse_mass();
        body
    }

    /// A dynamic body whose mass follows from `shape` and `density`.
    ///
    /// Planes, meshes and rays have no finite mass and are rejected.
    pub fn dynamic(shape: Shape, density: f32) -> Result<Self> {
        let props = shape.mass_properties(density)?;
        if !(props.mass > 0.0 && props.mass.is_finite()) {
            return Err(PhysicsError::InvalidMass("shape mass must be positive"));
        }
        Ok(Self::with_motion(shape, MotionType::Dynamic, props))
    }

    /// A body that never moves.
    pub fn fixed(shape: Shape) -> Self {
        Self::with_motion(shape, MotionType::Static, MassProperties::new(0.0, Vec3::ZERO))
    }

    /// A body moved by the host.
    pub fn kinematic(shape: Shape) -> Self {
        Self::with_motion(shape, MotionType::Kinematic, MassProperties::new(0.0, Vec3::ZERO))
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.set_pose(pose);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_pose(Pose::new(position, self.pose.orientation));
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.set_pose(Pose::new(self.pose.position, orientation));
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    /// Rescales the mass, keeping the shape's inertia distribution.
    pub fn with_mass(mut self, mass: f32) -> Result<Self> {
        let props = MassProperties::new(self.mass, self.inertia).with_mass(mass);
        self.set_mass_properties(props)?;
        Ok(self)
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    pub fn with_can_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The body's collision object once it is registered.
    #[inline]
    pub fn collision_object(&self) -> Option<ObjectHandle> {
        self.object
    }

    pub(crate) fn set_collision_object(&mut self, object: Option<ObjectHandle>) {
        self.object = object;
    }

    #[inline]
    pub fn motion_type(&self) -> MotionType {
        self.motion_type
    }

    /// Switches the motion type. Only shapes with finite mass may become
    /// dynamic; a body that was never dynamic gets unit density.
    pub fn set_motion_type(&mut self, motion_type: MotionType) -> Result<()> {
        if motion_type == MotionType::Dynamic && !(self.mass > 0.0) {
            let props = self.shape.mass_properties(1.0)?;
            self.mass = props.mass;
            self.inertia = props.inertia;
        }
        self.motion_type = motion_type;
        if motion_type != MotionType::Dynamic {
            self.clear_forces();
            self.sleeping = false;
        }
        if motion_type == MotionType::Static {
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
        }
        self.refresh_inverse_mass();
        Ok(())
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.motion_type == MotionType::Dynamic
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.motion_type == MotionType::Kinematic
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.motion_type == MotionType::Static
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    #[inline]
    pub fn orientation(&self) -> Quat {
        self.pose.orientation
    }

    /// Moves the body and wakes it.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = Pose::new(pose.position, pose.orientation.normalize());
        self.update_world_inertia();
        self.wake_up();
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
        self.wake_up();
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
        self.wake_up();
    }

    /// Mass of a dynamic body; zero for static and kinematic bodies.
    #[inline]
    pub fn mass(&self) -> f32 {
        if self.is_dynamic() {
            self.mass
        } else {
            0.0
        }
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Local inertia diagonal.
    #[inline]
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    #[inline]
    pub fn inverse_inertia_world(&self) -> Mat3 {
        self.inv_inertia_world
    }

    /// Replaces mass and inertia.
    pub fn set_mass_properties(&mut self, props: MassProperties) -> Result<()> {
        if !(props.mass > 0.0 && props.mass.is_finite()) {
            return Err(PhysicsError::InvalidMass("mass must be positive and finite"));
        }
        if !(props.inertia.cmpgt(Vec3::ZERO).all() && props.inertia.is_finite()) {
            return Err(PhysicsError::InvalidMass("inertia must be positive and finite"));
        }
        self.mass = props.mass;
        self.inertia = props.inertia;
        self.refresh_inverse_mass();
        Ok(())
    }

    fn refresh_inverse_mass(&mut self) {
        if self.is_dynamic() && self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            self.inv_inertia_local = self.inertia.recip();
        } else {
            self.inv_mass = 0.0;
            self.inv_inertia_local = Vec3::ZERO;
        }
        self.update_world_inertia();
    }

    /// Updates the world space inertia tensor
    pub(crate) fn update_world_inertia(&mut self) {
        let rot = self.pose.rotation_matrix();
        self.inv_inertia_world = rot * Mat3::from_diagonal(self.inv_inertia_local) * rot.transpose();
    }

    pub(crate) fn set_pose_unchecked(&mut self, pose: Pose) {
        self.pose = pose;
        self.update_world_inertia();
    }

    /// Applies a force at the center of mass
    pub fn apply_force(&mut self, force: Vec3) {
        if self.is_dynamic() {
            self.force += force;
            self.wake_up();
        }
    }

    /// Applies a force at a world point
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        if self.is_dynamic() {
            self.force += force;
            self.torque += (point - self.pose.position).cross(force);
            self.wake_up();
        }
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_dynamic() {
            self.torque += torque;
            self.wake_up();
        }
    }

    /// Applies an impulse at the center of mass
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.is_dynamic() {
            self.linear_velocity += impulse * self.inv_mass;
            self.wake_up();
        }
    }

    /// Applies an impulse at a world point
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_dynamic() {
            self.linear_velocity += impulse * self.inv_mass;
            let r = point - self.pose.position;
            self.angular_velocity += self.inv_inertia_world * r.cross(impulse);
            self.wake_up();
        }
    }

    #[inline]
    pub fn force(&self) -> Vec3 {
        self.force
    }

    #[inline]
    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    /// Gets the velocity at a world point
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.pose.position)
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn wake_up(&mut self) {
        self.sleeping = false;
        self.sleep_timer = 0.0;
    }

    /// Puts a dynamic body to sleep, zeroing its velocities.
    pub fn sleep(&mut self) {
        if self.is_dynamic() {
            self.sleeping = true;
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
            self.clear_forces();
        }
    }

    /// True when both speeds are under the given thresholds.
    #[inline]
    pub(crate) fn is_slow(&self, linear_threshold: f32, angular_threshold: f32) -> bool {
        self.linear_velocity.length_squared() <= linear_threshold * linear_threshold
            && self.angular_velocity.length_squared() <= angular_threshold * angular_threshold
    }

    /// Advances the sleep timer; returns true when the body fell asleep.
    pub(crate) fn update_sleep(&mut self, dt: f32, slow: bool, time_to_sleep: f32) -> bool {
        if !self.can_sleep || !self.is_dynamic() || self.sleeping {
            return false;
        }
        if slow {
            self.sleep_timer += dt;
            if self.sleep_timer >= time_to_sleep {
                self.sleep();
                return true;
            }
        } else {
            self.sleep_timer = 0.0;
        }
        false
    }
}
