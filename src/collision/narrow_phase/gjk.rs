use glam::Vec3;

use crate::geometry::SupportMap;

/// Maximum iterations for GJK algorithm
const GJK_MAX_ITERATIONS: usize = 64;

/// Relative tolerance for GJK convergence
const GJK_TOLERANCE: f32 = 1e-6;

/// Squared distance below which the shapes are treated as touching
const GJK_CONTACT_EPSILON: f32 = 1e-10;

/// A vertex of the Minkowski difference with the support points that made it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SupportPoint {
    /// Point in the Minkowski difference (A - B space)
    pub point: Vec3,
    pub on_a: Vec3,
    pub on_b: Vec3,
}

impl SupportPoint {
    #[inline]
    pub fn compute<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(a: &A, b: &B, direction: Vec3) -> Self {
        let on_a = a.support(direction);
        let on_b = b.support(-direction);
        Self {
            point: on_a - on_b,
            on_a,
            on_b,
        }
    }
}

/// Up to four support points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simplex {
    vertices: [SupportPoint; 4],
    len: usize,
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn vertices(&self) -> &[SupportPoint] {
        &self.vertices[..self.len]
    }

    pub fn push(&mut self, vertex: SupportPoint) {
        debug_assert!(self.len < 4);
        self.vertices[self.len] = vertex;
        self.len += 1;
    }

    fn contains_point(&self, point: Vec3) -> bool {
        self.vertices().iter().any(|v| v.point.distance_squared(point) < GJK_CONTACT_EPSILON)
    }

    /// Keeps the vertices with a non-zero weight and returns the weighted
    /// closest point on each shape.
    fn reduce(&mut self, weights: [f32; 4]) -> (Vec3, Vec3, Vec3) {
        let mut kept = [SupportPoint::default(); 4];
        let mut len = 0;
        let (mut v, mut on_a, mut on_b) = (Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        for (vertex, &w) in self.vertices[..self.len].iter().zip(weights.iter()) {
            if w > 0.0 {
                v += vertex.point * w;
                on_a += vertex.on_a * w;
                on_b += vertex.on_b * w;
                kept[len] = *vertex;
                len += 1;
            }
        }
        self.vertices = kept;
        self.len = len;
        (v, on_a, on_b)
    }
}

/// Result of a GJK query
#[derive(Debug, Clone)]
pub enum GjkResult {
    /// Shapes overlap; the simplex seeds EPA
    Intersecting(Simplex),
    /// Shapes are apart by `distance`
    Separated {
        closest_a: Vec3,
        closest_b: Vec3,
        distance: f32,
    },
}

impl GjkResult {
    pub fn is_intersecting(&self) -> bool {
        matches!(self, GjkResult::Intersecting(_))
    }
}

/// Distance between two convex shapes, or the simplex enclosing the
/// origin when they overlap.
pub fn gjk<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(a: &A, b: &B) -> GjkResult {
    let mut simplex = Simplex::new();

    let mut v = a.center() - b.center();
    if v.length_squared() < GJK_CONTACT_EPSILON {
        v = Vec3::X;
    }
    let first = SupportPoint::compute(a, b, -v);
    simplex.push(first);
    v = first.point;
    let (mut closest_a, mut closest_b) = (first.on_a, first.on_b);

    for _ in 0..GJK_MAX_ITERATIONS {
        let dist_sq = v.length_squared();
        if dist_sq < GJK_CONTACT_EPSILON {
            return GjkResult::Intersecting(simplex);
        }

        let w = SupportPoint::compute(a, b, -v);
        // No progress toward the origin: v is the closest point
        if dist_sq - v.dot(w.point) <= GJK_TOLERANCE * dist_sq || simplex.contains_point(w.point) {
            break;
        }
        simplex.push(w);

        let weights = closest_weights(&simplex);
        let (next, on_a, on_b) = simplex.reduce(weights);
        if simplex.len() == 4 {
            return GjkResult::Intersecting(simplex);
        }
        // Numerical stall
        if next.length_squared() >= dist_sq {
            break;
        }
        v = next;
        closest_a = on_a;
        closest_b = on_b;
    }

    GjkResult::Separated {
        closest_a,
        closest_b,
        distance: v.length(),
    }
}

/// Barycentric weights of the point of the simplex closest to the origin.
/// All four weights set means the origin lies inside the tetrahedron.
fn closest_weights(simplex: &Simplex) -> [f32; 4] {
    let p: Vec<Vec3> = simplex.vertices().iter().map(|v| v.point).collect();
    match p.len() {
        1 => [1.0, 0.0, 0.0, 0.0],
        2 => {
            let (u, v) = segment_weights(p[0], p[1]);
            [u, v, 0.0, 0.0]
        }
        3 => {
            let w = triangle_weights(p[0], p[1], p[2]);
            [w[0], w[1], w[2], 0.0]
        }
        _ => tetrahedron_weights(p[0], p[1], p[2], p[3]),
    }
}

fn segment_weights(a: Vec3, b: Vec3) -> (f32, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < GJK_CONTACT_EPSILON {
        return (1.0, 0.0);
    }
    let t = (-a).dot(ab) / len_sq;
    if t <= 0.0 {
        (1.0, 0.0)
    } else if t >= 1.0 {
        (0.0, 1.0)
    } else {
        (1.0 - t, t)
    }
}

/// Voronoi region walk for the origin against triangle `abc`.
fn triangle_weights(a: Vec3, b: Vec3, c: Vec3) -> [f32; 3] {
    let ab = b - a;
    let ac = c - a;
    let d1 = ab.dot(-a);
    let d2 = ac.dot(-a);
    if d1 <= 0.0 && d2 <= 0.0 {
        return [1.0, 0.0, 0.0];
    }

    let d3 = ab.dot(-b);
    let d4 = ac.dot(-b);
    if d3 >= 0.0 && d4 <= d3 {
        return [0.0, 1.0, 0.0];
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let t = d1 / (d1 - d3);
        return [1.0 - t, t, 0.0];
    }

    let d5 = ab.dot(-c);
    let d6 = ac.dot(-c);
    if d6 >= 0.0 && d5 <= d6 {
        return [0.0, 0.0, 1.0];
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let t = d2 / (d2 - d6);
        return [1.0 - t, 0.0, t];
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return [0.0, 1.0 - t, t];
    }

    let denom = va + vb + vc;
    if denom.abs() < f32::EPSILON {
        // Degenerate triangle, fall back to its best edge
        let (u, v) = segment_weights(a, b);
        return [u, v, 0.0];
    }
    let v = vb / denom;
    let w = vc / denom;
    [1.0 - v - w, v, w]
}

/// True if the origin and `d` lie on opposite sides of face `abc`.
fn origin_outside_face(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
    let n = (b - a).cross(c - a);
    let side_origin = n.dot(-a);
    let side_d = n.dot(d - a);
    side_origin * side_d < 0.0
}

fn tetrahedron_weights(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> [f32; 4] {
    // Each face with the vertex opposite to it
    let faces = [
        ([0usize, 1, 2], a, b, c, d),
        ([0, 2, 3], a, c, d, b),
        ([0, 3, 1], a, d, b, c),
        ([1, 3, 2], b, d, c, a),
    ];
    let points = [a, b, c, d];
    let scale = (b - a).length_squared().max((c - a).length_squared()).max((d - a).length_squared());
    let flat = (b - a).cross(c - a).dot(d - a).abs() <= 1e-6 * scale * scale.sqrt();

    let mut best: Option<([f32; 4], f32)> = None;
    for (indices, p, q, r, opposite) in faces {
        if !flat && !origin_outside_face(p, q, r, opposite) {
            continue;
        }
        let w = triangle_weights(p, q, r);
        let mut weights = [0.0; 4];
        for (slot, weight) in indices.iter().zip(w) {
            weights[*slot] = weight;
        }
        let closest: Vec3 = points.iter().zip(weights.iter()).map(|(p, w)| *p * *w).sum();
        let dist_sq = closest.length_squared();
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((weights, dist_sq));
        }
    }

    // Origin enclosed
    best.map_or([1.0; 4], |(w, _)| w)
}

/// Simple intersection test using GJK
pub fn intersects<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(a: &A, b: &B) -> bool {
    gjk(a, b).is_intersecting()
}

/// Computes the distance between two shapes
pub fn distance<A: SupportMap + ?Sized, B: SupportMap + ?Sized>(a: &A, b: &B) -> f32 {
    match gjk(a, b) {
        GjkResult::Intersecting(_) => 0.0,
        GjkResult::Separated { distance, .. } => distance,
    }
}
