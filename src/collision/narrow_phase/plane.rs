use glam::{Quat, Vec3};

use super::contact_between;
use crate::collision::contact::{Contact, ContactId};
use crate::geometry::{world_plane, Plane, Shape};
use crate::math::utils::{normalize_or, tangent_basis};
use crate::math::Pose;

/// Number of rim points sampled on each cylinder cap
const RIM_SAMPLES: u32 = 4;

/// Convex shape against a half-space.
///
/// Every candidate vertex of the shape is tested against the plane; rounded
/// shapes contribute their centers with a radius.
pub fn convex_plane(shape: &Shape, pose_a: &Pose, plane: &Plane, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let plane = world_plane(plane, pose_b);
    candidates(shape, pose_a, plane.normal)
        .into_iter()
        .filter_map(|(point, radius, feature)| {
            let height = plane.signed_distance(point);
            let depth = radius - height;
            (depth >= -margin).then(|| {
                contact_between(
                    point - plane.normal * radius,
                    point - plane.normal * height,
                    plane.normal,
                    depth,
                    ContactId::new(feature, 0),
                )
            })
        })
        .collect()
}

/// World points (with radius and feature id) that can touch a plane with
/// the given normal.
fn candidates(shape: &Shape, pose: &Pose, normal: Vec3) -> Vec<(Vec3, f32, u32)> {
    match shape {
        Shape::Box(b) => (0..8)
            .map(|i| (pose.transform_point(b.vertex(i)), 0.0, i as u32))
            .collect(),
        Shape::Sphere(s) => vec![(pose.position, s.radius, 0)],
        Shape::Capsule(c) => {
            let (p, q) = c.segment();
            vec![
                (pose.transform_point(p), c.radius, 0),
                (pose.transform_point(q), c.radius, 1),
            ]
        }
        Shape::Cylinder(c) => {
            let axis = pose.transform_vector(Vec3::Y);
            let down = -normal;
            let radial = down - axis * down.dot(axis);
            let start = normalize_or(radial, tangent_basis(axis).0);
            let mut points = Vec::with_capacity(2 * RIM_SAMPLES as usize);
            for (cap, y) in [(0, -c.half_height), (1, c.half_height)] {
                let center = pose.position + axis * y;
                for i in 0..RIM_SAMPLES {
                    let angle = i as f32 * std::f32::consts::TAU / RIM_SAMPLES as f32;
                    let dir = Quat::from_axis_angle(axis, angle) * start;
                    points.push((center + dir * c.radius, 0.0, cap * RIM_SAMPLES + i));
                }
            }
            points
        }
        Shape::ConvexHull(h) => h
            .vertices()
            .iter()
            .enumerate()
            .map(|(i, v)| (pose.transform_point(*v), 0.0, i as u32))
            .collect(),
        Shape::Plane(_) | Shape::TriangleMesh(_) | Shape::Ray(_) => Vec::new(),
    }
}
