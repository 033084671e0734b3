//! Closed-form handlers for spheres, capsules and sphere-box pairs.
//!
//! Capsule features: 0 and 1 are the segment ends, 2 the segment interior,
//! 3 and 4 the two ends of a parallel overlap.

use glam::Vec3;

use super::box_box::{box_edge_feature, box_face_feature};
use super::contact_between;
use crate::collision::contact::{Contact, ContactId};
use crate::geometry::{BoxShape, Capsule, Sphere};
use crate::math::utils::normalize_or;
use crate::math::Pose;

/// Sphere against sphere
pub fn sphere_sphere(a: &Sphere, pose_a: &Pose, b: &Sphere, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    balls(pose_a.position, a.radius, pose_b.position, b.radius, margin, ContactId::new(0, 0))
        .into_iter()
        .collect()
}

/// Two spheres given by center and radius.
fn balls(center_a: Vec3, radius_a: f32, center_b: Vec3, radius_b: f32, margin: f32, id: ContactId) -> Option<Contact> {
    let delta = center_a - center_b;
    let dist_sq = delta.length_squared();
    let reach = radius_a + radius_b + margin;
    if dist_sq > reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = normalize_or(delta, Vec3::Y);
    let depth = radius_a + radius_b - dist;
    Some(contact_between(
        center_a - normal * radius_a,
        center_b + normal * radius_b,
        normal,
        depth,
        id,
    ))
}

/// World end points of a capsule segment.
fn world_segment(capsule: &Capsule, pose: &Pose) -> (Vec3, Vec3) {
    let (p, q) = capsule.segment();
    (pose.transform_point(p), pose.transform_point(q))
}

fn closest_on_segment(p: Vec3, q: Vec3, point: Vec3) -> (f32, Vec3) {
    let d = q - p;
    let len_sq = d.length_squared();
    if len_sq < 1e-12 {
        return (0.0, p);
    }
    let t = ((point - p).dot(d) / len_sq).clamp(0.0, 1.0);
    (t, p + d * t)
}

fn segment_feature(t: f32) -> u32 {
    if t <= 0.0 {
        0
    } else if t >= 1.0 {
        1
    } else {
        2
    }
}

/// Sphere against capsule
pub fn sphere_capsule(a: &Sphere, pose_a: &Pose, b: &Capsule, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let (p, q) = world_segment(b, pose_b);
    let (t, closest) = closest_on_segment(p, q, pose_a.position);
    balls(
        pose_a.position,
        a.radius,
        closest,
        b.radius,
        margin,
        ContactId::new(0, segment_feature(t)),
    )
    .into_iter()
    .collect()
}

/// Closest points between segments `p1q1` and `p2q2` as parameters (s, t).
pub(super) fn closest_segment_params(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (f32, f32) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a < 1e-12 && e < 1e-12 {
        return (0.0, 0.0);
    }
    if a < 1e-12 {
        return (0.0, (f / e).clamp(0.0, 1.0));
    }
    let c = d1.dot(r);
    if e < 1e-12 {
        return ((-c / a).clamp(0.0, 1.0), 0.0);
    }

    let b = d1.dot(d2);
    let denom = a * e - b * b;
    let mut s = if denom > 1e-12 {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }
    (s, t)
}

/// Capsule against capsule. Parallel overlapping capsules get two points.
pub fn capsule_capsule(a: &Capsule, pose_a: &Pose, b: &Capsule, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let (p1, q1) = world_segment(a, pose_a);
    let (p2, q2) = world_segment(b, pose_b);
    let d1 = q1 - p1;
    let d2 = q2 - p2;

    let parallel = d1.cross(d2).length_squared() <= 1e-6 * d1.length_squared() * d2.length_squared();
    if parallel && d1.length_squared() > 1e-12 {
        let len_sq = d1.length_squared();
        let s2 = (p2 - p1).dot(d1) / len_sq;
        let s3 = (q2 - p1).dot(d1) / len_sq;
        let lo = s2.min(s3).max(0.0);
        let hi = s2.max(s3).min(1.0);
        if hi - lo > 1e-4 {
            let contacts: Vec<Contact> = [(lo, 3), (hi, 4)]
                .into_iter()
                .filter_map(|(s, feature)| {
                    let on_a = p1 + d1 * s;
                    let (_, on_b) = closest_on_segment(p2, q2, on_a);
                    balls(on_a, a.radius, on_b, b.radius, margin, ContactId::new(feature, 2))
                })
                .collect();
            return contacts;
        }
    }

    let (s, t) = closest_segment_params(p1, q1, p2, q2);
    balls(
        p1 + d1 * s,
        a.radius,
        p2 + d2 * t,
        b.radius,
        margin,
        ContactId::new(segment_feature(s), segment_feature(t)),
    )
    .into_iter()
    .collect()
}

/// Sphere against box, including a center inside the box.
pub fn sphere_box(a: &Sphere, pose_a: &Pose, b: &BoxShape, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let h = b.half_extents;
    let center = pose_b.inverse_transform_point(pose_a.position);
    let clamped = center.clamp(-h, h);

    let (local_normal, local_on_b, depth, feature) = if clamped != center {
        let delta = center - clamped;
        let dist = delta.length();
        if dist > a.radius + margin {
            return Vec::new();
        }
        (normalize_or(delta, Vec3::Y), clamped, a.radius - dist, clamped_feature(center, h))
    } else {
        // Inside: push out through the nearest face
        let gap = h - center.abs();
        let axis = if gap.x <= gap.y && gap.x <= gap.z {
            0
        } else if gap.y <= gap.z {
            1
        } else {
            2
        };
        let negative = center[axis] < 0.0;
        let mut normal = Vec3::ZERO;
        normal[axis] = if negative { -1.0 } else { 1.0 };
        let mut on_b = center;
        on_b[axis] = normal[axis] * h[axis];
        (normal, on_b, a.radius + gap[axis], box_face_feature(axis, negative))
    };

    let normal = pose_b.transform_vector(local_normal);
    let on_b = pose_b.transform_point(local_on_b);
    vec![contact_between(
        pose_a.position - normal * a.radius,
        on_b,
        normal,
        depth,
        ContactId::new(0, feature),
    )]
}

/// Box feature nearest to an outside point, from the clamped axes.
fn clamped_feature(point: Vec3, h: Vec3) -> u32 {
    let outside = [point.x.abs() > h.x, point.y.abs() > h.y, point.z.abs() > h.z];
    match outside.iter().filter(|&&o| o).count() {
        1 => {
            let axis = outside.iter().position(|&o| o).unwrap_or(0);
            box_face_feature(axis, point[axis] < 0.0)
        }
        2 => {
            let axis = outside.iter().position(|&o| !o).unwrap_or(0);
            box_edge_feature(axis, point)
        }
        _ => BoxShape::support_vertex_index(point) as u32,
    }
}
