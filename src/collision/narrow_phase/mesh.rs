use glam::Vec3;

use super::convex::manifold;
use super::{contact_between, push_unique};
use crate::collision::contact::{reduce_contacts, Contact, ContactId};
use crate::geometry::{Shape, Sphere, Triangle, TriangleMesh};
use crate::math::utils::normalize_or;
use crate::math::Pose;

/// Convex shape (A) against a triangle mesh (B).
///
/// Candidate triangles come from the mesh tree; each is treated as a thin
/// convex shape. Triangles are two-sided. The triangle index becomes the
/// mesh-side feature.
pub fn convex_mesh(shape: &Shape, pose_a: &Pose, mesh: &TriangleMesh, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let Some(convex) = shape.as_convex() else {
        return Vec::new();
    };
    let posed = convex.at(*pose_a);
    let query = shape.world_aabb(pose_a).expand(margin).transformed(&pose_b.inverse());

    let mut contacts = Vec::new();
    mesh.query_aabb(&query, |index, local| {
        let triangle = Triangle::new(
            pose_b.transform_point(local.a),
            pose_b.transform_point(local.b),
            pose_b.transform_point(local.c),
        );
        let found = match shape {
            Shape::Sphere(s) => sphere_triangle(s, pose_a, &triangle, margin).into_iter().collect(),
            _ => manifold(&posed, &triangle, margin),
        };
        for mut contact in found {
            contact.id = ContactId::new(contact.id.feature_a * 16 + contact.id.feature_b, index as u32);
            push_unique(&mut contacts, contact);
        }
    });

    reduce_contacts(&mut contacts);
    contacts
}

fn sphere_triangle(sphere: &Sphere, pose: &Pose, triangle: &Triangle, margin: f32) -> Option<Contact> {
    let center = pose.position;
    let closest = triangle.closest_point(center);
    let delta = center - closest;
    let reach = sphere.radius + margin;
    if delta.length_squared() > reach * reach {
        return None;
    }
    let normal = normalize_or(delta, triangle.normal());
    let normal = if normal == Vec3::ZERO { Vec3::Y } else { normal };
    let depth = sphere.radius - delta.length();
    Some(contact_between(
        center - normal * sphere.radius,
        closest,
        normal,
        depth,
        ContactId::new(0, 0),
    ))
}
