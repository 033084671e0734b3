use glam::Vec3;

use super::aabb::Aabb;
use super::convex_hull::ConvexHull;
use super::mesh::{Triangle, TriangleMesh};
use super::primitives::{BoxShape, Capsule, Cylinder, Plane, Ray, Sphere};
use crate::error::{PhysicsError, Result};
use crate::math::Pose;

/// Tag of a [`Shape`], used for narrow-phase dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeType {
    Box,
    Sphere,
    Capsule,
    Cylinder,
    ConvexHull,
    Plane,
    TriangleMesh,
    Ray,
}

/// Collision geometry in the local frame of a collision object.
///
/// Hull and mesh variants share their data between clones; use
/// [`Shape::deep_clone`] for an independent copy.
#[derive(Debug, Clone)]
pub enum Shape {
    Box(BoxShape),
    Sphere(Sphere),
    Capsule(Capsule),
    Cylinder(Cylinder),
    ConvexHull(ConvexHull),
    Plane(Plane),
    TriangleMesh(TriangleMesh),
    Ray(Ray),
}

impl Shape {
    pub fn sphere(radius: f32) -> Result<Self> {
        Sphere::new(radius).map(Self::Sphere)
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        BoxShape::new(half_extents).map(Self::Box)
    }

    pub fn capsule(radius: f32, half_height: f32) -> Result<Self> {
        Capsule::new(radius, half_height).map(Self::Capsule)
    }

    pub fn cylinder(radius: f32, half_height: f32) -> Result<Self> {
        Cylinder::new(radius, half_height).map(Self::Cylinder)
    }

    pub fn convex_hull(vertices: impl Into<Vec<Vec3>>) -> Result<Self> {
        ConvexHull::new(vertices).map(Self::ConvexHull)
    }

    pub fn plane(normal: Vec3, distance: f32) -> Result<Self> {
        Plane::new(normal, distance).map(Self::Plane)
    }

    pub fn triangle_mesh(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self> {
        TriangleMesh::new(vertices, indices).map(Self::TriangleMesh)
    }

    pub fn ray(direction: Vec3, length: f32) -> Result<Self> {
        Ray::new(direction, length).map(Self::Ray)
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Box(_) => ShapeType::Box,
            Shape::Sphere(_) => ShapeType::Sphere,
            Shape::Capsule(_) => ShapeType::Capsule,
            Shape::Cylinder(_) => ShapeType::Cylinder,
            Shape::ConvexHull(_) => ShapeType::ConvexHull,
            Shape::Plane(_) => ShapeType::Plane,
            Shape::TriangleMesh(_) => ShapeType::TriangleMesh,
            Shape::Ray(_) => ShapeType::Ray,
        }
    }

    /// Re-checks parameters that may have been edited through public fields.
    pub fn validate(&self) -> Result<()> {
        match self {
            Shape::Box(b) => b.validate(),
            Shape::Sphere(s) => s.validate(),
            Shape::Capsule(c) => c.validate(),
            Shape::Cylinder(c) => c.validate(),
            Shape::Plane(p) => p.validate(),
            Shape::Ray(r) => r.validate(),
            Shape::ConvexHull(_) | Shape::TriangleMesh(_) => Ok(()),
        }
    }

    pub fn local_aabb(&self) -> Aabb {
        match self {
            Shape::Box(b) => b.local_aabb(),
            Shape::Sphere(s) => s.local_aabb(),
            Shape::Capsule(c) => c.local_aabb(),
            Shape::Cylinder(c) => c.local_aabb(),
            Shape::ConvexHull(h) => h.local_aabb(),
            Shape::Plane(p) => p.local_aabb(),
            Shape::TriangleMesh(m) => m.local_aabb(),
            Shape::Ray(r) => r.local_aabb(),
        }
    }

    pub fn world_aabb(&self, pose: &Pose) -> Aabb {
        match self {
            Shape::Sphere(s) => Aabb::from_center_half_extents(pose.position, Vec3::splat(s.radius)),
            Shape::Capsule(c) => {
                let axis = pose.transform_vector(Vec3::Y) * c.half_height;
                Aabb::from_points([pose.position - axis, pose.position + axis]).expand(c.radius)
            }
            Shape::Ray(r) => Aabb::from_points([pose.position, pose.transform_point(r.end())]),
            Shape::Plane(p) => world_plane(p, pose).local_aabb(),
            _ => self.local_aabb().transformed(pose),
        }
    }

    /// Borrowed view of a convex shape, `None` for planes and meshes.
    #[inline]
    pub fn as_convex(&self) -> Option<ConvexRef<'_>> {
        match self {
            Shape::Box(b) => Some(ConvexRef::Box(b)),
            Shape::Sphere(s) => Some(ConvexRef::Sphere(s)),
            Shape::Capsule(c) => Some(ConvexRef::Capsule(c)),
            Shape::Cylinder(c) => Some(ConvexRef::Cylinder(c)),
            Shape::ConvexHull(h) => Some(ConvexRef::Hull(h)),
            Shape::Ray(r) => Some(ConvexRef::Ray(r)),
            Shape::Plane(_) | Shape::TriangleMesh(_) => None,
        }
    }

    /// Whether a dynamic body may own this shape.
    #[inline]
    pub fn has_finite_mass(&self) -> bool {
        !matches!(self, Shape::Plane(_) | Shape::TriangleMesh(_) | Shape::Ray(_))
    }

    pub fn mass_properties(&self, density: f32) -> Result<MassProperties> {
        if !(density.is_finite() && density > 0.0) {
            return Err(PhysicsError::InvalidMass("density must be positive and finite"));
        }
        match self {
            Shape::Box(b) => Ok(b.mass_properties(density)),
            Shape::Sphere(s) => Ok(s.mass_properties(density)),
            Shape::Capsule(c) => Ok(c.mass_properties(density)),
            Shape::Cylinder(c) => Ok(c.mass_properties(density)),
            Shape::ConvexHull(h) => Ok(h.mass_properties(density)),
            Shape::Plane(_) | Shape::TriangleMesh(_) | Shape::Ray(_) => {
                Err(PhysicsError::InvalidMass("shape has no finite mass"))
            }
        }
    }

    /// Copy that owns its hull or mesh data.
    pub fn deep_clone(&self) -> Self {
        match self {
            Shape::ConvexHull(h) => Shape::ConvexHull(h.deep_clone()),
            Shape::TriangleMesh(m) => Shape::TriangleMesh(m.deep_clone()),
            other => other.clone(),
        }
    }
}

/// The plane of `plane` after moving it by `pose`.
pub fn world_plane(plane: &Plane, pose: &Pose) -> Plane {
    let normal = pose.transform_vector(plane.normal);
    Plane {
        normal,
        distance: plane.distance + normal.dot(pose.position),
    }
}

impl From<BoxShape> for Shape {
    fn from(b: BoxShape) -> Self {
        Shape::Box(b)
    }
}

impl From<Sphere> for Shape {
    fn from(s: Sphere) -> Self {
        Shape::Sphere(s)
    }
}

impl From<Capsule> for Shape {
    fn from(c: Capsule) -> Self {
        Shape::Capsule(c)
    }
}

impl From<TriangleMesh> for Shape {
    fn from(m: TriangleMesh) -> Self {
        Shape::TriangleMesh(m)
    }
}

/// Mass and principal moments of inertia about the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub mass: f32,
    /// Diagonal of the local inertia tensor.
    pub inertia: Vec3,
}

impl MassProperties {
    #[inline]
    pub fn new(mass: f32, inertia: Vec3) -> Self {
        Self { mass, inertia }
    }

    /// Same distribution rescaled to `mass`.
    pub fn with_mass(&self, mass: f32) -> Self {
        let scale = if self.mass > 0.0 { mass / self.mass } else { 0.0 };
        Self {
            mass,
            inertia: self.inertia * scale,
        }
    }
}

/// Anything that can report its farthest point along a direction.
///
/// GJK and EPA work on this abstraction, so triangles and posed shapes
/// plug in the same way.
pub trait SupportMap {
    fn support(&self, direction: Vec3) -> Vec3;

    /// A point inside the shape, used to seed searches.
    fn center(&self) -> Vec3;
}

/// Borrowed convex shape in its local frame.
#[derive(Debug, Clone, Copy)]
pub enum ConvexRef<'a> {
    Box(&'a BoxShape),
    Sphere(&'a Sphere),
    Capsule(&'a Capsule),
    Cylinder(&'a Cylinder),
    Hull(&'a ConvexHull),
    Ray(&'a Ray),
}

impl<'a> ConvexRef<'a> {
    #[inline]
    pub fn local_support(&self, direction: Vec3) -> Vec3 {
        match self {
            ConvexRef::Box(b) => b.support(direction),
            ConvexRef::Sphere(s) => s.support(direction),
            ConvexRef::Capsule(c) => c.support(direction),
            ConvexRef::Cylinder(c) => c.support(direction),
            ConvexRef::Hull(h) => h.support(direction),
            ConvexRef::Ray(r) => r.support(direction),
        }
    }

    /// Places the shape at `pose`.
    #[inline]
    pub fn at(self, pose: Pose) -> PosedConvex<'a> {
        PosedConvex { shape: self, pose }
    }
}

/// A convex shape placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct PosedConvex<'a> {
    pub shape: ConvexRef<'a>,
    pub pose: Pose,
}

impl SupportMap for PosedConvex<'_> {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.pose.inverse_transform_vector(direction);
        self.pose.transform_point(self.shape.local_support(local))
    }

    #[inline]
    fn center(&self) -> Vec3 {
        match self.shape {
            ConvexRef::Ray(r) => self.pose.transform_point(r.end() * 0.5),
            _ => self.pose.position,
        }
    }
}

impl SupportMap for Triangle {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        Triangle::support(self, direction)
    }

    #[inline]
    fn center(&self) -> Vec3 {
        self.centroid()
    }
}

/// A single point, for distance queries.
impl SupportMap for Vec3 {
    #[inline]
    fn support(&self, _direction: Vec3) -> Vec3 {
        *self
    }

    #[inline]
    fn center(&self) -> Vec3 {
        *self
    }
}
