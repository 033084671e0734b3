use std::sync::Arc;

use glam::Vec3;

use super::aabb::Aabb;
use super::shape::MassProperties;
use crate::error::{PhysicsError, Result};

/// A convex hull given by a point cloud.
///
/// The support point in a direction is the farthest vertex, so interior
/// points are harmless. Vertex data is shared between clones.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    vertices: Arc<[Vec3]>,
    local_aabb: Aabb,
}

impl ConvexHull {
    pub fn new(vertices: impl Into<Vec<Vec3>>) -> Result<Self> {
        let vertices: Vec<Vec3> = vertices.into();
        if vertices.is_empty() {
            return Err(PhysicsError::InvalidShape("convex hull needs at least one vertex"));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidShape("convex hull vertices must be finite"));
        }
        let local_aabb = Aabb::from_points(vertices.iter().copied());
        Ok(Self {
            vertices: vertices.into(),
            local_aabb,
        })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    /// Index and position of the farthest vertex along `direction`.
    pub fn support_vertex(&self, direction: Vec3) -> (usize, Vec3) {
        let mut best = (0, self.vertices[0]);
        let mut best_dot = best.1.dot(direction);
        for (i, &v) in self.vertices.iter().enumerate().skip(1) {
            let d = v.dot(direction);
            if d > best_dot {
                best_dot = d;
                best = (i, v);
            }
        }
        best
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        self.support_vertex(direction).1
    }

    /// True if both hulls share the same vertex buffer.
    #[inline]
    pub fn shares_data_with(&self, other: &ConvexHull) -> bool {
        Arc::ptr_eq(&self.vertices, &other.vertices)
    }

    /// Copy with its own vertex buffer.
    pub fn deep_clone(&self) -> Self {
        Self {
            vertices: self.vertices.iter().copied().collect(),
            local_aabb: self.local_aabb,
        }
    }

    /// Mass properties of the hull's bounding box, centered on the origin.
    ///
    /// Hulls are expected to be built around their center of mass.
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let size = self.local_aabb.size().max(Vec3::splat(1e-4));
        let mass = density * size.x * size.y * size.z;
        let sq = size * size;
        MassProperties::new(
            mass,
            Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0),
        )
    }
}
