use std::sync::Arc;

use glam::Vec3;

use super::aabb::Aabb;
use super::aabb_tree::AabbTree;
use crate::error::{PhysicsError, Result};

/// A single triangle, counter-clockwise winding facing its normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    #[inline]
    pub const fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unit face normal, or zero for a degenerate triangle.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a).normalize_or_zero()
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points([self.a, self.b, self.c])
    }

    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> Vec3 {
        match i {
            0 => self.a,
            1 => self.b,
            _ => self.c,
        }
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let (da, db, dc) = (self.a.dot(direction), self.b.dot(direction), self.c.dot(direction));
        if da >= db && da >= dc {
            self.a
        } else if db >= dc {
            self.b
        } else {
            self.c
        }
    }

    /// Closest point on the triangle to `p` (Voronoi region walk).
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            return a + ab * (d1 / (d1 - d3));
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            return a + ac * (d2 / (d2 - d6));
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
        }

        let denom = 1.0 / (va + vb + vc);
        a + ab * (vb * denom) + ac * (vc * denom)
    }

    /// Two-sided Moller-Trumbore test. Returns the hit distance.
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let e1 = self.b - self.a;
        let e2 = self.c - self.a;
        let h = direction.cross(e2);
        let det = e1.dot(h);
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.a;
        let u = s.dot(h) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t >= 0.0 && t <= max_distance).then_some(t)
    }
}

#[derive(Debug, Clone)]
struct MeshData {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    tree: AabbTree,
    local_aabb: Aabb,
}

impl MeshData {
    fn triangle(&self, index: usize) -> Triangle {
        let [i, j, k] = self.indices[index];
        Triangle::new(
            self.vertices[i as usize],
            self.vertices[j as usize],
            self.vertices[k as usize],
        )
    }

    fn partition(&mut self) {
        let bounds: Vec<Aabb> = (0..self.indices.len()).map(|i| self.triangle(i).aabb()).collect();
        self.tree = AabbTree::build(&bounds);
        self.local_aabb = Aabb::from_points(self.vertices.iter().copied());
    }
}

/// An indexed triangle mesh with a static partition over its triangles.
///
/// Clones share the triangle data. Editing vertices through
/// [`TriangleMesh::vertices_mut`] copies the data if it is shared and
/// leaves the partition stale until [`TriangleMesh::rebuild`] is called.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    data: Arc<MeshData>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self> {
        if indices.is_empty() {
            return Err(PhysicsError::InvalidShape("triangle mesh needs at least one triangle"));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidShape("triangle mesh vertices must be finite"));
        }
        let count = vertices.len() as u32;
        if indices.iter().flatten().any(|&i| i >= count) {
            return Err(PhysicsError::InvalidShape("triangle mesh index out of range"));
        }

        let mut data = MeshData {
            vertices,
            indices,
            tree: AabbTree::default(),
            local_aabb: Aabb::EMPTY,
        };
        data.partition();
        Ok(Self { data: Arc::new(data) })
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.data.indices.len()
    }

    #[inline]
    pub fn triangle(&self, index: usize) -> Triangle {
        self.data.triangle(index)
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.triangle_count()).map(|i| self.triangle(i))
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.data.vertices
    }

    /// Mutable vertex access. Call [`TriangleMesh::rebuild`] afterwards.
    pub fn vertices_mut(&mut self) -> &mut [Vec3] {
        &mut Arc::make_mut(&mut self.data).vertices
    }

    /// Recomputes the triangle partition and bounds after vertex edits.
    pub fn rebuild(&mut self) {
        Arc::make_mut(&mut self.data).partition();
    }

    #[inline]
    pub fn tree(&self) -> &AabbTree {
        &self.data.tree
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        self.data.local_aabb
    }

    /// Triangles whose bounds overlap a local-space box.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(usize, Triangle)) {
        self.data
            .tree
            .query_aabb(aabb, |i| callback(i as usize, self.data.triangle(i as usize)));
    }

    /// Nearest triangle hit by a local-space ray: `(triangle, distance)`.
    pub fn cast_local_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(usize, f32)> {
        self.data
            .tree
            .cast_ray(origin, direction, max_distance, |i, limit| {
                self.data.triangle(i as usize).ray_intersection(origin, direction, limit)
            })
            .map(|(i, t)| (i as usize, t))
    }

    #[inline]
    pub fn shares_data_with(&self, other: &TriangleMesh) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Copy with its own triangle data and partition.
    pub fn deep_clone(&self) -> Self {
        Self {
            data: Arc::new(MeshData::clone(&self.data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A flat `n x n` grid of unit quads in the XZ plane, facing +Y.
    fn grid(n: u32) -> TriangleMesh {
        let mut vertices = Vec::new();
        for z in 0..=n {
            for x in 0..=n {
                vertices.push(Vec3::new(x as f32, 0.0, z as f32));
            }
        }
        let mut indices = Vec::new();
        let row = n + 1;
        for z in 0..n {
            for x in 0..n {
                let i = z * row + x;
                indices.push([i, i + row, i + 1]);
                indices.push([i + 1, i + row, i + row + 1]);
            }
        }
        TriangleMesh::new(vertices, indices).unwrap()
    }

    #[test]
    fn test_triangle_normal_and_closest_point() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::X);
        assert!((tri.normal() - Vec3::Y).length() < 1e-6);
        assert!((tri.closest_point(Vec3::new(0.2, 5.0, 0.2)) - Vec3::new(0.2, 0.0, 0.2)).length() < 1e-6);
        assert_eq!(tri.closest_point(Vec3::new(-1.0, 0.0, -1.0)), Vec3::ZERO);
    }

    #[test]
    fn test_ray_hits_grid() {
        let mesh = grid(8);
        assert!((mesh.triangle(0).normal() - Vec3::Y).length() < 1e-6);

        let (_, t) = mesh
            .cast_local_ray(Vec3::new(3.3, 2.0, 4.7), Vec3::NEG_Y, 10.0)
            .expect("ray should hit the grid");
        assert!((t - 2.0).abs() < 1e-5);
        assert!(mesh.cast_local_ray(Vec3::new(9.5, 2.0, 4.0), Vec3::NEG_Y, 10.0).is_none());
    }

    #[test]
    fn test_query_aabb_returns_local_triangles() {
        let mesh = grid(8);
        let mut hits = Vec::new();
        mesh.query_aabb(
            &Aabb::new(Vec3::new(2.2, -0.1, 2.2), Vec3::new(2.8, 0.1, 2.8)),
            |i, _| hits.push(i),
        );
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_rebuild_after_edit_and_sharing() {
        let mut mesh = grid(2);
        let shared = mesh.clone();
        assert!(mesh.shares_data_with(&shared));

        for v in mesh.vertices_mut() {
            v.y += 1.0;
        }
        mesh.rebuild();

        assert!(!mesh.shares_data_with(&shared));
        assert_eq!(mesh.local_aabb().min.y, 1.0);
        assert_eq!(shared.local_aabb().min.y, 0.0);
        assert!(mesh.cast_local_ray(Vec3::new(0.5, 5.0, 0.5), Vec3::NEG_Y, 10.0).is_some());
    }

    #[test]
    fn test_invalid_meshes() {
        assert!(TriangleMesh::new(vec![Vec3::ZERO], vec![]).is_err());
        assert!(TriangleMesh::new(vec![Vec3::ZERO, Vec3::X], vec![[0, 1, 2]]).is_err());
    }
}
