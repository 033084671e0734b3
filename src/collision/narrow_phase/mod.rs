//! Narrow phase: exact contact generation for a pair of shapes.
//!
//! Handlers are written for one ordering of their shape pair. [`collide`]
//! swaps the pair when needed and flips the result, so both orderings
//! produce the same contacts.

mod analytic;
mod box_box;
mod convex;
pub mod epa;
pub mod gjk;
mod mesh;
mod plane;
mod ray;

use std::cmp::Ordering;

use glam::Vec3;

pub use epa::{epa, EpaResult};
pub use gjk::{distance, gjk, intersects, GjkResult, Simplex, SupportPoint};
pub use ray::{cast_ray, RayIntersection};

use crate::collision::contact::{Contact, ContactId};
use crate::geometry::{Shape, ShapeType};
use crate::math::Pose;

/// Contacts closer than this are merged
const MERGE_DISTANCE_SQUARED: f32 = 1e-6;

/// Handler order: a pair is swapped when the first shape ranks higher.
fn dispatch_rank(shape: ShapeType) -> u8 {
    match shape {
        ShapeType::Ray => 0,
        ShapeType::Sphere => 1,
        ShapeType::Capsule => 2,
        ShapeType::Box => 3,
        ShapeType::Cylinder => 4,
        ShapeType::ConvexHull => 5,
        ShapeType::TriangleMesh => 6,
        ShapeType::Plane => 7,
    }
}

/// Contacts between two posed shapes, normals pointing from `b` toward `a`.
///
/// Separated pairs closer than `margin` yield contacts with negative depth.
/// Ray shapes report the hit distance as depth. Local anchors are left at
/// zero for the caller to fill in.
pub fn collide(a: &Shape, pose_a: &Pose, b: &Shape, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    if should_swap(a, pose_a, b, pose_b) {
        return collide_ordered(b, pose_b, a, pose_a, margin)
            .iter()
            .map(Contact::flipped)
            .collect();
    }
    collide_ordered(a, pose_a, b, pose_b, margin)
}

/// Same-type pairs are ordered by pose so swapping the arguments only flips
/// the contacts.
fn should_swap(a: &Shape, pose_a: &Pose, b: &Shape, pose_b: &Pose) -> bool {
    let (rank_a, rank_b) = (dispatch_rank(a.shape_type()), dispatch_rank(b.shape_type()));
    if rank_a != rank_b {
        return rank_a > rank_b;
    }
    pose_order(pose_a, pose_b) == Ordering::Greater
}

fn pose_order(a: &Pose, b: &Pose) -> Ordering {
    let key = |pose: &Pose| {
        let (p, q) = (pose.position, pose.orientation);
        [p.x, p.y, p.z, q.x, q.y, q.z, q.w]
    };
    key(a)
        .iter()
        .zip(key(b).iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|order| order.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn collide_ordered(a: &Shape, pose_a: &Pose, b: &Shape, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    match (a, b) {
        (Shape::Ray(ray), _) => ray::ray_shape(ray, pose_a, b, pose_b),
        (Shape::Sphere(x), Shape::Sphere(y)) => analytic::sphere_sphere(x, pose_a, y, pose_b, margin),
        (Shape::Sphere(x), Shape::Capsule(y)) => analytic::sphere_capsule(x, pose_a, y, pose_b, margin),
        (Shape::Sphere(x), Shape::Box(y)) => analytic::sphere_box(x, pose_a, y, pose_b, margin),
        (Shape::Capsule(x), Shape::Capsule(y)) => analytic::capsule_capsule(x, pose_a, y, pose_b, margin),
        (Shape::Box(x), Shape::Box(y)) => box_box::box_box(x, pose_a, y, pose_b, margin),
        (Shape::TriangleMesh(_) | Shape::Plane(_), Shape::TriangleMesh(_) | Shape::Plane(_)) => {
            tracing::trace!(a = ?a.shape_type(), b = ?b.shape_type(), "no contact handler for pair");
            Vec::new()
        }
        (_, Shape::Plane(plane)) => plane::convex_plane(a, pose_a, plane, pose_b, margin),
        (_, Shape::TriangleMesh(m)) => mesh::convex_mesh(a, pose_a, m, pose_b, margin),
        _ => match (a.as_convex(), b.as_convex()) {
            (Some(x), Some(y)) => convex::manifold(&x.at(*pose_a), &y.at(*pose_b), margin),
            _ => Vec::new(),
        },
    }
}

/// Contact midway between the two witness points.
#[inline]
fn contact_between(on_a: Vec3, on_b: Vec3, normal: Vec3, depth: f32, id: ContactId) -> Contact {
    Contact::new((on_a + on_b) * 0.5, normal, depth, id)
}

/// Adds `contact` unless one already sits at the same spot.
fn push_unique(contacts: &mut Vec<Contact>, contact: Contact) {
    let duplicate = contacts
        .iter()
        .any(|c| c.position.distance_squared(contact.position) < MERGE_DISTANCE_SQUARED);
    if !duplicate {
        contacts.push(contact);
    }
}
