//! General convex pairs: GJK for the separated case, EPA for the
//! penetrating case, then a one-shot manifold sampled around the normal.
//!
//! Feature ids: 0 is the GJK/EPA point, `1 + k` the k-th sample on either
//! side.

use std::f32::consts::TAU;

use glam::Vec3;

use super::epa::epa;
use super::gjk::{gjk, GjkResult};
use super::{contact_between, push_unique};
use crate::collision::contact::{reduce_contacts, Contact, ContactId};
use crate::geometry::SupportMap;
use crate::math::utils::{normalize_or, tangent_basis};

/// Number of tangent directions sampled around the normal
const SAMPLE_DIRECTIONS: usize = 8;

/// Tilt of the sampling directions away from the normal
const TILT: f32 = 0.05;

/// Contact manifold between two convex support maps.
pub fn manifold<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(a: &A, b: &B, margin: f32) -> Vec<Contact> {
    let Some((normal, depth, on_a, on_b)) = penetration(a, b, margin) else {
        return Vec::new();
    };

    let mut contacts = vec![contact_between(on_a, on_b, normal, depth, ContactId::new(0, 0))];

    let (t1, t2) = tangent_basis(normal);
    let tangents: [Vec3; SAMPLE_DIRECTIONS] = std::array::from_fn(|k| {
        let angle = k as f32 * TAU / SAMPLE_DIRECTIONS as f32;
        t1 * angle.cos() + t2 * angle.sin()
    });
    // Lateral extents of each shape across the tangent plane
    let extent_a = tangents.map(|t| a.support(t).dot(t));
    let extent_b = tangents.map(|t| b.support(t).dot(t));
    let within = |extent: &[f32; SAMPLE_DIRECTIONS], p: Vec3| {
        tangents.iter().zip(extent).all(|(t, e)| p.dot(*t) <= e + margin)
    };

    let top_b = b.support(normal).dot(normal);
    let bottom_a = a.support(-normal).dot(normal);

    for (k, t) in tangents.iter().enumerate() {
        let feature = 1 + k as u32;

        let p = a.support(-normal + *t * TILT);
        let d = top_b - p.dot(normal);
        if d >= -margin && within(&extent_b, p) {
            push_unique(
                &mut contacts,
                contact_between(p, p + normal * d, normal, d, ContactId::new(feature, 0)),
            );
        }

        let q = b.support(normal + *t * TILT);
        let d = q.dot(normal) - bottom_a;
        if d >= -margin && within(&extent_a, q) {
            push_unique(
                &mut contacts,
                contact_between(q - normal * d, q, normal, d, ContactId::new(0, feature)),
            );
        }
    }

    reduce_contacts(&mut contacts);
    contacts
}

/// Normal (from B toward A), depth and witness points, or `None` when the
/// shapes are farther apart than `margin`.
fn penetration<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(
    a: &A,
    b: &B,
    margin: f32,
) -> Option<(Vec3, f32, Vec3, Vec3)> {
    match gjk(a, b) {
        GjkResult::Separated {
            closest_a,
            closest_b,
            distance,
        } => {
            if distance > margin {
                return None;
            }
            let normal = normalize_or(closest_a - closest_b, normalize_or(a.center() - b.center(), Vec3::Y));
            Some((normal, -distance, closest_a, closest_b))
        }
        GjkResult::Intersecting(simplex) => match epa(&simplex, a, b) {
            Some(result) => Some((-result.normal, result.depth, result.point_a, result.point_b)),
            None => {
                tracing::trace!("EPA failed, separating along the center line");
                let normal = normalize_or(a.center() - b.center(), Vec3::Y);
                let on_a = a.support(-normal);
                let on_b = b.support(normal);
                Some((normal, (on_b - on_a).dot(normal), on_a, on_b))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Shape, Triangle};
    use crate::math::{Pose, Quat};
    use approx::assert_relative_eq;

    #[test]
    fn test_hull_resting_on_box() {
        let hull = Shape::convex_hull(
            crate::geometry::BoxShape::new(Vec3::splat(0.5)).unwrap().vertices().to_vec(),
        )
        .unwrap();
        let ground = Shape::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap();
        let a = hull.as_convex().unwrap().at(Pose::from_position(Vec3::new(0.0, 0.95, 0.0)));
        let b = ground.as_convex().unwrap().at(Pose::IDENTITY);

        let contacts = manifold(&a, &b, 0.01);
        assert_eq!(contacts.len(), 4);
        for c in &contacts {
            assert!(c.normal.y > 0.99, "normal {:?}", c.normal);
            assert_relative_eq!(c.depth, 0.05, epsilon = 1e-3);
        }
        // The manifold spans the face, not a single corner
        let span = contacts[0].position.distance(contacts[1].position);
        assert!(span > 0.5);
    }

    #[test]
    fn test_separated_within_margin() {
        let cylinder = Shape::cylinder(0.5, 0.5).unwrap();
        let a = cylinder.as_convex().unwrap().at(Pose::from_position(Vec3::new(0.0, 1.01, 0.0)));
        let b = cylinder.as_convex().unwrap().at(Pose::IDENTITY);

        let contacts = manifold(&a, &b, 0.02);
        assert!(!contacts.is_empty());
        assert!(contacts.iter().all(|c| c.depth < 0.0 && c.depth > -0.02));
        assert!(manifold(&a, &b, 0.005).is_empty());
    }

    #[test]
    fn test_tilted_hull_on_triangle() {
        let hull = Shape::convex_hull(vec![
            Vec3::new(0.0, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
            Vec3::new(0.0, 0.5, 0.5),
        ])
        .unwrap();
        let a = hull.as_convex().unwrap().at(Pose::new(
            Vec3::new(0.0, 0.45, 0.0),
            Quat::IDENTITY,
        ));
        let triangle = Triangle::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, -2.0));

        let contacts = manifold(&a, &triangle, 0.0);
        let deepest = contacts.iter().map(|c| c.depth).fold(f32::MIN, f32::max);
        assert_relative_eq!(deepest, 0.05, epsilon = 1e-3);
        assert!(contacts.iter().all(|c| c.normal.y > 0.99));
    }
}
