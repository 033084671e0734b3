use crate::arena::arena_handle;
use crate::dynamics::BodyHandle;
use crate::geometry::{Aabb, Shape};
use crate::math::Pose;

arena_handle!(
    /// Generational handle to a [`CollisionObject`] in a collision domain.
    ObjectHandle
);

/// Collision group used when none is given.
pub const DEFAULT_GROUP: u32 = 0;

/// A shape placed in the world, optionally owned by a rigid body.
///
/// The owner handle never keeps the body alive; once the body is removed
/// the handle stops resolving.
#[derive(Debug, Clone)]
pub struct CollisionObject {
    pub shape: Shape,
    pub pose: Pose,
    /// Collision group consulted by the collision filter.
    pub group: u32,
    pub owner: Option<BodyHandle>,
    /// Static objects never move; static pairs are skipped by the default
    /// broad-phase filter.
    pub is_static: bool,
    /// Disabled objects produce no pairs.
    pub enabled: bool,
}

impl CollisionObject {
    pub fn new(shape: Shape, pose: Pose) -> Self {
        Self {
            shape,
            pose,
            group: DEFAULT_GROUP,
            owner: None,
            is_static: false,
            enabled: true,
        }
    }

    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_owner(mut self, owner: BodyHandle) -> Self {
        self.owner = Some(owner);
        self
    }

    #[inline]
    pub fn world_aabb(&self) -> Aabb {
        self.shape.world_aabb(&self.pose)
    }
}
