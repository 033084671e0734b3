//! Box against box: separating axis test over the 15 candidate axes, then
//! reference-face clipping or an edge-edge closest-point contact.
//!
//! Box features: corners are 0..8 (bit layout of [`BoxShape::vertex`]),
//! faces `16 + axis * 2 + negative`, edges `32 + axis * 4 + side bits`.
//! Points produced by clipping get `100 + polygon_index * 4 + side_plane`.

use glam::Vec3;

use super::analytic::closest_segment_params;
use super::contact_between;
use crate::collision::contact::{Contact, ContactId};
use crate::geometry::BoxShape;
use crate::math::Pose;

/// A face axis must beat the other box's by this factor to be preferred
const RELATIVE_TOLERANCE: f32 = 0.95;
const ABSOLUTE_TOLERANCE: f32 = 1e-3;

const CLIP_FEATURE_BASE: u32 = 100;

#[inline]
pub fn box_face_feature(axis: usize, negative: bool) -> u32 {
    16 + axis as u32 * 2 + negative as u32
}

/// Edge along `axis`, on the side of `point` for the two other axes.
#[inline]
pub fn box_edge_feature(axis: usize, point: Vec3) -> u32 {
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
    32 + axis as u32 * 4 + (point[u] >= 0.0) as u32 + 2 * (point[v] >= 0.0) as u32
}

/// Whether separation `candidate` is clearly larger than `best`.
#[inline]
fn beats(candidate: f32, best: f32) -> bool {
    candidate > best + (1.0 - RELATIVE_TOLERANCE) * best.abs() + ABSOLUTE_TOLERANCE
}

#[inline]
fn sign(x: f32) -> f32 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// A box in world space.
struct Frame {
    center: Vec3,
    axes: [Vec3; 3],
    half: [f32; 3],
}

impl Frame {
    fn new(shape: &BoxShape, pose: &Pose) -> Self {
        let rotation = pose.rotation_matrix();
        Self {
            center: pose.position,
            axes: [rotation.x_axis, rotation.y_axis, rotation.z_axis],
            half: shape.half_extents.to_array(),
        }
    }

    /// Half width of the box projected on `axis`.
    #[inline]
    fn project(&self, axis: Vec3) -> f32 {
        (0..3).map(|i| self.half[i] * self.axes[i].dot(axis).abs()).sum()
    }

    fn point(&self, local: Vec3) -> Vec3 {
        self.center + self.axes[0] * local.x + self.axes[1] * local.y + self.axes[2] * local.z
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

pub fn box_box(a: &BoxShape, pose_a: &Pose, b: &BoxShape, pose_b: &Pose, margin: f32) -> Vec<Contact> {
    let fa = Frame::new(a, pose_a);
    let fb = Frame::new(b, pose_b);
    let d = fb.center - fa.center;
    let separation = |axis: Vec3| d.dot(axis).abs() - fa.project(axis) - fb.project(axis);

    let mut best_a = (f32::NEG_INFINITY, 0);
    let mut best_b = (f32::NEG_INFINITY, 0);
    for i in 0..3 {
        let s = separation(fa.axes[i]);
        if s > margin {
            return Vec::new();
        }
        if s > best_a.0 {
            best_a = (s, i);
        }
        let s = separation(fb.axes[i]);
        if s > margin {
            return Vec::new();
        }
        if s > best_b.0 {
            best_b = (s, i);
        }
    }

    let mut best_edge: Option<(f32, usize, usize, Vec3)> = None;
    for i in 0..3 {
        for j in 0..3 {
            let axis = fa.axes[i].cross(fb.axes[j]);
            let len = axis.length();
            // Parallel edges are covered by the face axes
            if len < 1e-5 {
                continue;
            }
            let axis = axis / len;
            let s = separation(axis);
            if s > margin {
                return Vec::new();
            }
            if best_edge.map_or(true, |(best, ..)| s > best) {
                best_edge = Some((s, i, j, axis));
            }
        }
    }

    let (mut best, mut chosen, mut axis) = (best_a.0, Axis::FaceA(best_a.1), fa.axes[best_a.1]);
    if beats(best_b.0, best) {
        (best, chosen, axis) = (best_b.0, Axis::FaceB(best_b.1), fb.axes[best_b.1]);
    }
    if let Some((s, i, j, edge_axis)) = best_edge {
        if beats(s, best) {
            (chosen, axis) = (Axis::Edge(i, j), edge_axis);
        }
    }

    // From B toward A
    let normal = if d.dot(axis) > 0.0 { -axis } else { axis };

    match chosen {
        Axis::FaceA(i) => face_contacts(&fa, i, -normal, &fb, margin)
            .into_iter()
            .map(|(on_a, on_b, depth, ref_feature, inc_feature)| {
                contact_between(on_a, on_b, normal, depth, ContactId::new(ref_feature, inc_feature))
            })
            .collect(),
        Axis::FaceB(j) => face_contacts(&fb, j, normal, &fa, margin)
            .into_iter()
            .map(|(on_b, on_a, depth, ref_feature, inc_feature)| {
                contact_between(on_a, on_b, normal, depth, ContactId::new(inc_feature, ref_feature))
            })
            .collect(),
        Axis::Edge(i, j) => edge_contact(&fa, i, &fb, j, normal, margin).into_iter().collect(),
    }
}

/// Clips the incident face of `incident` against the reference face of
/// `reference` whose outward normal is `face_normal`.
///
/// Yields (point on reference, point on incident, depth, reference feature,
/// incident feature).
fn face_contacts(
    reference: &Frame,
    axis: usize,
    face_normal: Vec3,
    incident: &Frame,
    margin: f32,
) -> Vec<(Vec3, Vec3, f32, u32, u32)> {
    let s = sign(reference.axes[axis].dot(face_normal));
    let nf = reference.axes[axis] * s;
    let face_center = reference.center + nf * reference.half[axis];
    let (k1, k2) = ((axis + 1) % 3, (axis + 2) % 3);
    let (u1, e1) = (reference.axes[k1], reference.half[k1]);
    let (u2, e2) = (reference.axes[k2], reference.half[k2]);
    let ref_feature = box_face_feature(axis, s < 0.0);

    // Incident face: most anti-parallel to the reference normal
    let j = (0..3)
        .max_by(|&x, &y| {
            incident.axes[x]
                .dot(nf)
                .abs()
                .total_cmp(&incident.axes[y].dot(nf).abs())
        })
        .unwrap_or(0);
    let sj = -sign(incident.axes[j].dot(nf));
    let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
    let mut polygon: Vec<(Vec3, u32)> = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
        .into_iter()
        .map(|(a, b)| {
            let mut local = Vec3::ZERO;
            local[j] = sj * incident.half[j];
            local[j1] = a * incident.half[j1];
            local[j2] = b * incident.half[j2];
            (incident.point(local), BoxShape::support_vertex_index(local) as u32)
        })
        .collect();

    let planes = [
        (u1, u1.dot(face_center) + e1),
        (-u1, -u1.dot(face_center) + e1),
        (u2, u2.dot(face_center) + e2),
        (-u2, -u2.dot(face_center) + e2),
    ];
    for (p, (plane_normal, offset)) in planes.into_iter().enumerate() {
        polygon = clip(&polygon, plane_normal, offset, p as u32);
        if polygon.is_empty() {
            return Vec::new();
        }
    }

    polygon
        .into_iter()
        .filter_map(|(point, feature)| {
            let separation = nf.dot(point - face_center);
            (separation <= margin).then(|| (point - nf * separation, point, -separation, ref_feature, feature))
        })
        .collect()
}

/// Sutherland-Hodgman against the half-space `normal·x <= offset`.
fn clip(polygon: &[(Vec3, u32)], normal: Vec3, offset: f32, plane: u32) -> Vec<(Vec3, u32)> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (k, &(current, feature)) in polygon.iter().enumerate() {
        let (next, _) = polygon[(k + 1) % polygon.len()];
        let dc = normal.dot(current) - offset;
        let dn = normal.dot(next) - offset;
        if dc <= 0.0 {
            out.push((current, feature));
        }
        if (dc <= 0.0) != (dn <= 0.0) {
            let t = dc / (dc - dn);
            out.push((current + (next - current) * t, CLIP_FEATURE_BASE + k as u32 * 4 + plane));
        }
    }
    out
}

/// Closest points of the two supporting edges.
fn edge_contact(a: &Frame, i: usize, b: &Frame, j: usize, normal: Vec3, margin: f32) -> Option<Contact> {
    // Edge of A deepest along -normal, edge of B deepest along +normal
    let edge = |frame: &Frame, axis: usize, toward: Vec3| -> (Vec3, Vec3, u32) {
        let mut local = Vec3::ZERO;
        for k in (0..3).filter(|&k| k != axis) {
            local[k] = sign(frame.axes[k].dot(toward)) * frame.half[k];
        }
        let center = frame.point(local);
        let half = frame.axes[axis] * frame.half[axis];
        (center - half, center + half, box_edge_feature(axis, local))
    };
    let (p1, q1, feature_a) = edge(a, i, -normal);
    let (p2, q2, feature_b) = edge(b, j, normal);

    let (s, t) = closest_segment_params(p1, q1, p2, q2);
    let on_a = p1 + (q1 - p1) * s;
    let on_b = p2 + (q2 - p2) * t;
    let depth = (on_b - on_a).dot(normal);
    (depth >= -margin).then(|| contact_between(on_a, on_b, normal, depth, ContactId::new(feature_a, feature_b)))
}
