//! Ray casts against every shape type.
//!
//! A ray starting inside a solid shape hits at distance zero with the
//! normal facing back along the ray.

use glam::Vec3;

use super::box_box::box_face_feature;
use super::gjk::{gjk, GjkResult};
use crate::collision::contact::{Contact, ContactId};
use crate::geometry::{BoxShape, Capsule, ConvexHull, Cylinder, Plane, Ray, Shape, Sphere, SupportMap, TriangleMesh};
use crate::math::utils::normalize_or;
use crate::math::Pose;

const MAX_ADVANCEMENT_STEPS: usize = 32;
const ADVANCEMENT_TOLERANCE: f32 = 1e-4;

/// Where a ray meets a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayIntersection {
    /// Distance along the (unit) ray direction
    pub distance: f32,
    /// Outward surface normal at the hit
    pub normal: Vec3,
    /// Shape feature that was hit (box face, triangle index, ...)
    pub feature: u32,
}

impl RayIntersection {
    fn new(distance: f32, normal: Vec3, feature: u32) -> Self {
        Self {
            distance,
            normal,
            feature,
        }
    }
}

/// Casts a world-space ray against `shape` placed at `pose`.
pub fn cast_ray(
    shape: &Shape,
    pose: &Pose,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
) -> Option<RayIntersection> {
    let direction = direction.try_normalize()?;
    let local_origin = pose.inverse_transform_point(origin);
    let local_dir = pose.inverse_transform_vector(direction);

    let hit = match shape {
        Shape::Sphere(s) => ray_sphere(s, local_origin, local_dir, max_distance),
        Shape::Box(b) => ray_box(b, local_origin, local_dir, max_distance),
        Shape::Capsule(c) => ray_capsule(c, local_origin, local_dir, max_distance),
        Shape::Cylinder(c) => ray_cylinder(c, local_origin, local_dir, max_distance),
        Shape::Plane(p) => ray_plane(p, local_origin, local_dir, max_distance),
        Shape::TriangleMesh(m) => ray_mesh(m, local_origin, local_dir, max_distance),
        Shape::ConvexHull(h) => ray_hull(h, local_origin, local_dir, max_distance),
        Shape::Ray(_) => None,
    }?;

    Some(RayIntersection {
        normal: pose.transform_vector(hit.normal),
        ..hit
    })
}

/// Contact for a ray shape (A) against any shape (B).
pub fn ray_shape(ray: &Ray, pose_a: &Pose, shape: &Shape, pose_b: &Pose) -> Vec<Contact> {
    let origin = pose_a.position;
    let direction = pose_a.transform_vector(ray.direction);
    cast_ray(shape, pose_b, origin, direction, ray.length)
        .map(|hit| {
            Contact::new(
                origin + direction * hit.distance,
                hit.normal,
                hit.distance,
                ContactId::new(0, hit.feature),
            )
        })
        .into_iter()
        .collect()
}

fn inside(direction: Vec3) -> RayIntersection {
    RayIntersection::new(0.0, -direction, 0)
}

/// Smallest non-negative root of `a t^2 + 2 b t + c = 0`.
fn entry_root(a: f32, b: f32, c: f32) -> Option<f32> {
    if a.abs() < 1e-12 {
        return None;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    (t >= 0.0).then_some(t)
}

fn ray_sphere(s: &Sphere, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    ray_ball(Vec3::ZERO, s.radius, origin, dir, max, 0)
}

fn ray_ball(center: Vec3, radius: f32, origin: Vec3, dir: Vec3, max: f32, feature: u32) -> Option<RayIntersection> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(inside(dir));
    }
    let t = entry_root(1.0, m.dot(dir), c)?;
    (t <= max).then(|| RayIntersection::new(t, (m + dir * t) / radius, feature))
}

fn ray_box(b: &BoxShape, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    let h = b.half_extents;
    if origin.abs().cmple(h).all() {
        return Some(inside(dir));
    }

    let mut enter = 0.0f32;
    let mut exit = max;
    let mut entry_axis = None;
    for axis in 0..3 {
        if dir[axis].abs() < 1e-12 {
            if origin[axis].abs() > h[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut t0 = (-h[axis] - origin[axis]) * inv;
        let mut t1 = (h[axis] - origin[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > enter || entry_axis.is_none() && t0 >= enter {
            enter = t0;
            entry_axis = Some(axis);
        }
        exit = exit.min(t1);
        if enter > exit {
            return None;
        }
    }

    let axis = entry_axis?;
    let negative = dir[axis] > 0.0;
    let mut normal = Vec3::ZERO;
    normal[axis] = if negative { -1.0 } else { 1.0 };
    Some(RayIntersection::new(enter, normal, box_face_feature(axis, negative)))
}

fn ray_capsule(c: &Capsule, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    let (p, q) = c.segment();
    let on_axis = Vec3::new(0.0, origin.y.clamp(p.y, q.y), 0.0);
    if origin.distance_squared(on_axis) <= c.radius * c.radius {
        return Some(inside(dir));
    }

    let side = ray_tube(c.radius, c.half_height, origin, dir, max, 2);
    let caps = [(p, 0), (q, 1)]
        .into_iter()
        .filter_map(|(center, feature)| ray_ball(center, c.radius, origin, dir, max, feature));
    side.into_iter().chain(caps).min_by(|x, y| x.distance.total_cmp(&y.distance))
}

/// Side wall of a Y-aligned cylinder of the given half height.
fn ray_tube(radius: f32, half_height: f32, origin: Vec3, dir: Vec3, max: f32, feature: u32) -> Option<RayIntersection> {
    let (o, d) = (Vec3::new(origin.x, 0.0, origin.z), Vec3::new(dir.x, 0.0, dir.z));
    let t = entry_root(d.length_squared(), o.dot(d), o.length_squared() - radius * radius)?;
    let hit = origin + dir * t;
    (t <= max && hit.y.abs() <= half_height)
        .then(|| RayIntersection::new(t, Vec3::new(hit.x, 0.0, hit.z) / radius, feature))
}

fn ray_cylinder(c: &Cylinder, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    let radial_sq = origin.x * origin.x + origin.z * origin.z;
    if origin.y.abs() <= c.half_height && radial_sq <= c.radius * c.radius {
        return Some(inside(dir));
    }

    let side = ray_tube(c.radius, c.half_height, origin, dir, max, 2);
    let caps = [(-c.half_height, 0u32), (c.half_height, 1u32)]
        .into_iter()
        .filter_map(|(y, feature)| {
            if dir.y.abs() < 1e-12 {
                return None;
            }
            let t = (y - origin.y) / dir.y;
            let hit = origin + dir * t;
            let facing = if y > 0.0 { dir.y < 0.0 } else { dir.y > 0.0 };
            (facing && t >= 0.0 && t <= max && hit.x * hit.x + hit.z * hit.z <= c.radius * c.radius)
                .then(|| RayIntersection::new(t, Vec3::new(0.0, y.signum(), 0.0), feature))
        });
    side.into_iter().chain(caps).min_by(|x, y| x.distance.total_cmp(&y.distance))
}

fn ray_plane(p: &Plane, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    let height = p.signed_distance(origin);
    if height <= 0.0 {
        return Some(inside(dir));
    }
    let rate = p.normal.dot(dir);
    if rate >= 0.0 {
        return None;
    }
    let t = -height / rate;
    (t <= max).then(|| RayIntersection::new(t, p.normal, 0))
}

fn ray_mesh(m: &TriangleMesh, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    let (index, t) = m.cast_local_ray(origin, dir, max)?;
    let normal = m.triangle(index).normal();
    // Two-sided: face the ray
    let normal = if normal.dot(dir) > 0.0 { -normal } else { normal };
    Some(RayIntersection::new(t, normal, index as u32))
}

/// Conservative advancement of the ray point toward the hull.
fn ray_hull(h: &ConvexHull, origin: Vec3, dir: Vec3, max: f32) -> Option<RayIntersection> {
    struct Hull<'a>(&'a ConvexHull);
    impl SupportMap for Hull<'_> {
        fn support(&self, direction: Vec3) -> Vec3 {
            self.0.support(direction)
        }
        fn center(&self) -> Vec3 {
            self.0.local_aabb().center()
        }
    }

    let hull = Hull(h);
    let mut t = 0.0;
    let mut normal = -dir;
    for _ in 0..MAX_ADVANCEMENT_STEPS {
        let point = origin + dir * t;
        let GjkResult::Separated {
            closest_b, distance, ..
        } = gjk(&point, &hull)
        else {
            return Some(RayIntersection::new(t, normal, 0));
        };
        if distance < ADVANCEMENT_TOLERANCE {
            return Some(RayIntersection::new(t, normal, 0));
        }
        normal = normalize_or(point - closest_b, -dir);
        let approach = -normal.dot(dir);
        if approach <= 0.0 {
            return None;
        }
        t += distance / approach;
        if t > max {
            return None;
        }
    }
    tracing::trace!("ray advancement did not converge");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn cast(shape: &Shape, pose: Pose, origin: Vec3, dir: Vec3) -> Option<RayIntersection> {
        cast_ray(shape, &pose, origin, dir, 100.0)
    }

    #[test]
    fn test_ray_sphere() {
        let sphere = Shape::sphere(1.0).unwrap();
        let hit = cast(&sphere, Pose::from_position(Vec3::new(0.0, 0.0, 5.0)), Vec3::ZERO, Vec3::Z).unwrap();
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.z, -1.0, epsilon = 1e-5);

        assert!(cast(&sphere, Pose::from_position(Vec3::new(0.0, 3.0, 5.0)), Vec3::ZERO, Vec3::Z).is_none());
        assert!(cast_ray(&sphere, &Pose::from_position(Vec3::new(0.0, 0.0, 5.0)), Vec3::ZERO, Vec3::Z, 3.5).is_none());
    }

    #[test]
    fn test_ray_rotated_box() {
        let b = Shape::cuboid(Vec3::new(2.0, 0.5, 0.5)).unwrap();
        let pose = Pose::new(Vec3::new(0.0, 10.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let hit = cast(&b, pose, Vec3::ZERO, Vec3::Y).unwrap();
        // Long axis now vertical
        assert_relative_eq!(hit.distance, 8.0, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_starting_inside() {
        let b = Shape::cuboid(Vec3::ONE).unwrap();
        let hit = cast(&b, Pose::IDENTITY, Vec3::ZERO, Vec3::X).unwrap();
        assert_eq!(hit.distance, 0.0);
        assert_eq!(hit.normal, -Vec3::X);
    }

    #[test]
    fn test_ray_capsule_and_cylinder() {
        let capsule = Shape::capsule(0.5, 1.0).unwrap();
        let top = cast(&capsule, Pose::IDENTITY, Vec3::new(0.0, 5.0, 0.0), -Vec3::Y).unwrap();
        assert_relative_eq!(top.distance, 3.5, epsilon = 1e-5);
        assert_eq!(top.feature, 1);

        let cylinder = Shape::cylinder(0.5, 1.0).unwrap();
        let top = cast(&cylinder, Pose::IDENTITY, Vec3::new(0.2, 5.0, 0.0), -Vec3::Y).unwrap();
        assert_relative_eq!(top.distance, 4.0, epsilon = 1e-5);
        let side = cast(&cylinder, Pose::IDENTITY, Vec3::new(-5.0, 0.5, 0.0), Vec3::X).unwrap();
        assert_relative_eq!(side.distance, 4.5, epsilon = 1e-5);
        assert_relative_eq!(side.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_plane_and_mesh() {
        let plane = Shape::plane(Vec3::Y, 0.0).unwrap();
        let hit = cast(&plane, Pose::IDENTITY, Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, -1.0, 0.0)).unwrap();
        assert_relative_eq!(hit.distance, 2.0 * std::f32::consts::SQRT_2, epsilon = 1e-5);

        let mesh = Shape::triangle_mesh(
            vec![Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0)],
            vec![[0, 2, 1]],
        )
        .unwrap();
        let hit = cast(&mesh, Pose::IDENTITY, Vec3::new(0.0, -3.0, 0.0), Vec3::Y).unwrap();
        assert_relative_eq!(hit.distance, 3.0, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_hull() {
        let hull = Shape::convex_hull(BoxShape::new(Vec3::ONE).unwrap().vertices().to_vec()).unwrap();
        let hit = cast(&hull, Pose::IDENTITY, Vec3::new(-5.0, 0.2, 0.3), Vec3::X).unwrap();
        assert!((hit.distance - 4.0).abs() < 1e-3);
        assert!(hit.normal.x < -0.99);
    }
}
