use glam::{Quat, Vec3};

use super::gjk::{Simplex, SupportPoint};
use crate::geometry::SupportMap;

/// Maximum iterations for EPA algorithm
const EPA_MAX_ITERATIONS: usize = 64;

/// Tolerance for EPA convergence
const EPA_TOLERANCE: f32 = 1e-4;

/// Maximum number of faces in the polytope
const EPA_MAX_FACES: usize = 128;

/// Minimum distance for a new vertex to count as distinct
const DISTINCT_EPSILON: f32 = 1e-6;

/// Result of EPA algorithm
#[derive(Debug, Clone, Copy)]
pub struct EpaResult {
    /// Outward normal of the Minkowski difference at the closest face.
    /// Moving A by `-normal * depth` separates the shapes.
    pub normal: Vec3,
    /// Penetration depth
    pub depth: f32,
    /// Deepest point of A (world space)
    pub point_a: Vec3,
    /// Deepest point of B (world space)
    pub point_b: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct Face {
    indices: [usize; 3],
    /// Outward unit normal
    normal: Vec3,
    /// Distance from origin to the face plane
    distance: f32,
}

/// Expands the GJK simplex into the polytope and returns the penetration.
pub fn epa<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(simplex: &Simplex, a: &A, b: &B) -> Option<EpaResult> {
    let mut vertices = complete_simplex(simplex, a, b)?;
    let mut faces: Vec<Face> = Vec::with_capacity(EPA_MAX_FACES);

    for (indices, opposite) in [([0, 1, 2], 3), ([0, 3, 1], 2), ([0, 2, 3], 1), ([1, 3, 2], 0)] {
        let mut face = create_face(&vertices, indices)?;
        // Normals point away from the opposite vertex
        if face.normal.dot(vertices[opposite].point - vertices[indices[0]].point) > 0.0 {
            face.normal = -face.normal;
            face.distance = -face.distance;
            face.indices.swap(0, 1);
        }
        faces.push(face);
    }

    for _ in 0..EPA_MAX_ITERATIONS {
        let closest = *faces.iter().min_by(|x, y| x.distance.total_cmp(&y.distance))?;

        let new_vertex = SupportPoint::compute(a, b, closest.normal);
        if new_vertex.point.dot(closest.normal) - closest.distance < EPA_TOLERANCE {
            return Some(compute_contact(&vertices, &closest));
        }

        let new_index = vertices.len();
        vertices.push(new_vertex);

        // Remove faces visible from the new point, keeping their silhouette
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        faces.retain(|face| {
            let visible = face.normal.dot(new_vertex.point - vertices[face.indices[0]].point) > 0.0;
            if visible {
                for j in 0..3 {
                    add_or_remove_edge(&mut horizon, (face.indices[j], face.indices[(j + 1) % 3]));
                }
            }
            !visible
        });

        for (i, j) in horizon {
            if let Some(face) = create_face(&vertices, [i, j, new_index]) {
                faces.push(face);
            }
        }

        if faces.len() > EPA_MAX_FACES {
            tracing::trace!(faces = faces.len(), "EPA face budget exhausted");
            break;
        }
    }

    let closest = faces.iter().min_by(|x, y| x.distance.total_cmp(&y.distance))?;
    Some(compute_contact(&vertices, closest))
}

/// Grows a GJK simplex that ended on the boundary into a tetrahedron.
fn complete_simplex<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(
    simplex: &Simplex,
    a: &A,
    b: &B,
) -> Option<Vec<SupportPoint>> {
    let mut vertices: Vec<SupportPoint> = simplex.vertices().to_vec();
    if vertices.is_empty() {
        return None;
    }

    if vertices.len() == 1 {
        let origin = vertices[0].point;
        let added = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z]
            .into_iter()
            .map(|dir| SupportPoint::compute(a, b, dir))
            .find(|v| v.point.distance(origin) > DISTINCT_EPSILON)?;
        vertices.push(added);
    }

    if vertices.len() == 2 {
        let axis = (vertices[1].point - vertices[0].point).normalize_or_zero();
        if axis == Vec3::ZERO {
            return None;
        }
        let start = axis.any_orthonormal_vector();
        let added = (0..6)
            .map(|k| Quat::from_axis_angle(axis, k as f32 * std::f32::consts::FRAC_PI_3) * start)
            .map(|dir| SupportPoint::compute(a, b, dir))
            .find(|v| (v.point - vertices[0].point).cross(axis).length() > DISTINCT_EPSILON)?;
        vertices.push(added);
    }

    if vertices.len() == 3 {
        let (p0, p1, p2) = (vertices[0].point, vertices[1].point, vertices[2].point);
        let normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        if normal == Vec3::ZERO {
            return None;
        }
        let added = [normal, -normal]
            .into_iter()
            .map(|dir| SupportPoint::compute(a, b, dir))
            .find(|v| (v.point - p0).dot(normal).abs() > DISTINCT_EPSILON)?;
        vertices.push(added);
    }

    Some(vertices)
}

fn create_face(vertices: &[SupportPoint], indices: [usize; 3]) -> Option<Face> {
    let a = vertices[indices[0]].point;
    let b = vertices[indices[1]].point;
    let c = vertices[indices[2]].point;

    let normal = (b - a).cross(c - a);
    let len = normal.length();
    if len < 1e-10 {
        return None;
    }
    let normal = normal / len;
    Some(Face {
        indices,
        normal,
        distance: normal.dot(a),
    })
}

/// Adds an edge, or cancels it against its reverse (shared edge)
fn add_or_remove_edge(edges: &mut Vec<(usize, usize)>, edge: (usize, usize)) {
    let reverse = (edge.1, edge.0);
    if let Some(pos) = edges.iter().position(|e| *e == reverse) {
        edges.swap_remove(pos);
    } else {
        edges.push(edge);
    }
}

fn compute_contact(vertices: &[SupportPoint], face: &Face) -> EpaResult {
    let [i, j, k] = face.indices;
    let bary = barycentric_coordinates(
        face.normal * face.distance,
        vertices[i].point,
        vertices[j].point,
        vertices[k].point,
    );

    EpaResult {
        normal: face.normal,
        depth: face.distance.max(0.0),
        point_a: vertices[i].on_a * bary.x + vertices[j].on_a * bary.y + vertices[k].on_a * bary.z,
        point_b: vertices[i].on_b * bary.x + vertices[j].on_b * bary.y + vertices[k].on_b * bary.z,
    }
}

fn barycentric_coordinates(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;

    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-10 {
        return Vec3::splat(1.0 / 3.0);
    }

    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrow_phase::gjk::{gjk, GjkResult};
    use crate::geometry::Shape;
    use crate::math::Pose;

    fn penetration(a: &Shape, pa: Vec3, b: &Shape, pb: Vec3) -> EpaResult {
        let a = a.as_convex().unwrap().at(Pose::from_position(pa));
        let b = b.as_convex().unwrap().at(Pose::from_position(pb));
        let GjkResult::Intersecting(simplex) = gjk(&a, &b) else {
            panic!("expected intersection");
        };
        epa(&simplex, &a, &b).expect("epa result")
    }

    #[test]
    fn test_sphere_sphere_penetration() {
        let sphere = Shape::sphere(1.0).unwrap();
        let result = penetration(&sphere, Vec3::ZERO, &sphere, Vec3::new(1.5, 0.0, 0.0));

        assert!((result.depth - 0.5).abs() < 0.05);
        // A has to move toward -X to separate
        assert!(result.normal.x > 0.95);
    }

    #[test]
    fn test_box_box_penetration() {
        let box_shape = Shape::cuboid(Vec3::ONE).unwrap();
        let result = penetration(&box_shape, Vec3::ZERO, &box_shape, Vec3::new(0.0, 1.8, 0.2));

        assert!((result.depth - 0.2).abs() < 1e-3);
        assert!(result.normal.y > 0.99);
        assert!(result.point_a.y > result.point_b.y);
    }

    #[test]
    fn test_concentric_shapes() {
        // GJK stops on the first vertex; the simplex must be completed
        let box_shape = Shape::cuboid(Vec3::ONE).unwrap();
        let result = penetration(&box_shape, Vec3::ZERO, &box_shape, Vec3::ZERO);
        assert!((result.depth - 2.0).abs() < 1e-3);
    }
}
