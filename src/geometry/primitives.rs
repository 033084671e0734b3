use std::f32::consts::PI;

use glam::Vec3;

use super::aabb::Aabb;
use super::shape::MassProperties;
use crate::error::{PhysicsError, Result};

fn positive(value: f32, what: &'static str) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidShape(what))
    }
}

fn non_negative(value: f32, what: &'static str) -> Result<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidShape(what))
    }
}

/// A sphere centered at the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f32,
}

impl Sphere {
    pub fn new(radius: f32) -> Result<Self> {
        Ok(Self {
            radius: positive(radius, "sphere radius must be positive and finite")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.radius).map(|_| ())
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.radius))
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        direction.try_normalize().unwrap_or(Vec3::X) * self.radius
    }

    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let r = self.radius;
        let mass = density * (4.0 / 3.0) * PI * r * r * r;
        MassProperties::new(mass, Vec3::splat(0.4 * mass * r * r))
    }
}

/// An oriented box centered at the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    pub half_extents: Vec3,
}

impl BoxShape {
    pub fn new(half_extents: Vec3) -> Result<Self> {
        if half_extents.is_finite() && half_extents.min_element() > 0.0 {
            Ok(Self { half_extents })
        } else {
            Err(PhysicsError::InvalidShape("box half extents must be positive and finite"))
        }
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.half_extents).map(|_| ())
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::new(-self.half_extents, self.half_extents)
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let h = self.half_extents;
        Vec3::new(
            if direction.x >= 0.0 { h.x } else { -h.x },
            if direction.y >= 0.0 { h.y } else { -h.y },
            if direction.z >= 0.0 { h.z } else { -h.z },
        )
    }

    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let size = self.half_extents * 2.0;
        let mass = density * size.x * size.y * size.z;
        let sq = size * size;
        MassProperties::new(
            mass,
            Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0),
        )
    }

    /// Corner `i`; bit 0/1/2 of `i` selects the +x/+y/+z side.
    #[inline]
    pub fn vertex(&self, i: usize) -> Vec3 {
        let h = self.half_extents;
        Vec3::new(
            if i & 1 != 0 { h.x } else { -h.x },
            if i & 2 != 0 { h.y } else { -h.y },
            if i & 4 != 0 { h.z } else { -h.z },
        )
    }

    pub fn vertices(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| self.vertex(i))
    }

    /// Index of the corner selected by `support(direction)`.
    #[inline]
    pub fn support_vertex_index(direction: Vec3) -> usize {
        (direction.x >= 0.0) as usize | ((direction.y >= 0.0) as usize) << 1 | ((direction.z >= 0.0) as usize) << 2
    }
}

/// A capsule along the local Y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    /// Half length of the inner segment, caps excluded.
    pub half_height: f32,
}

impl Capsule {
    pub fn new(radius: f32, half_height: f32) -> Result<Self> {
        Ok(Self {
            radius: positive(radius, "capsule radius must be positive and finite")?,
            half_height: non_negative(half_height, "capsule half height must be non-negative and finite")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.radius, self.half_height).map(|_| ())
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        let r = self.radius;
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(r, self.half_height + r, r))
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let y = if direction.y >= 0.0 { self.half_height } else { -self.half_height };
        Vec3::new(0.0, y, 0.0) + direction.try_normalize().unwrap_or(Vec3::Y) * self.radius
    }

    /// End points of the inner segment.
    #[inline]
    pub fn segment(&self) -> (Vec3, Vec3) {
        (Vec3::new(0.0, -self.half_height, 0.0), Vec3::new(0.0, self.half_height, 0.0))
    }

    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let r = self.radius;
        let h = self.half_height * 2.0;
        let cylinder_mass = density * PI * r * r * h;
        let sphere_mass = density * (4.0 / 3.0) * PI * r * r * r;

        let i_cylinder_axial = 0.5 * cylinder_mass * r * r;
        let i_cylinder_radial = cylinder_mass * (3.0 * r * r + h * h) / 12.0;
        let i_sphere = 0.4 * sphere_mass * r * r;
        // Hemispheres sit at the segment ends; 3/8 r is each cap's centroid offset
        let offset = self.half_height + 0.375 * r;
        let i_caps_radial = i_sphere + sphere_mass * (offset * offset - (0.375 * r) * (0.375 * r));

        MassProperties::new(
            cylinder_mass + sphere_mass,
            Vec3::new(
                i_cylinder_radial + i_caps_radial,
                i_cylinder_axial + i_sphere,
                i_cylinder_radial + i_caps_radial,
            ),
        )
    }
}

/// A solid cylinder along the local Y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    pub radius: f32,
    pub half_height: f32,
}

impl Cylinder {
    pub fn new(radius: f32, half_height: f32) -> Result<Self> {
        Ok(Self {
            radius: positive(radius, "cylinder radius must be positive and finite")?,
            half_height: positive(half_height, "cylinder half height must be positive and finite")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.radius, self.half_height).map(|_| ())
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        let r = self.radius;
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(r, self.half_height, r))
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let y = if direction.y >= 0.0 { self.half_height } else { -self.half_height };
        let radial = Vec3::new(direction.x, 0.0, direction.z);
        let rim = radial.try_normalize().map_or(Vec3::ZERO, |d| d * self.radius);
        Vec3::new(rim.x, y, rim.z)
    }

    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let r = self.radius;
        let h = self.half_height * 2.0;
        let mass = density * PI * r * r * h;
        let radial = mass * (3.0 * r * r + h * h) / 12.0;
        MassProperties::new(mass, Vec3::new(radial, 0.5 * mass * r * r, radial))
    }
}

/// A half-space. Points with `normal·x <= distance` are solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing out of the solid side.
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Result<Self> {
        let normal = normal
            .try_normalize()
            .ok_or(PhysicsError::InvalidShape("plane normal must be non-zero and finite"))?;
        if !distance.is_finite() {
            return Err(PhysicsError::InvalidShape("plane distance must be finite"));
        }
        Ok(Self { normal, distance })
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.normal, self.distance).map(|_| ())
    }

    /// Signed distance of a local point above the surface.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }

    /// Unbounded except when the normal is axis aligned.
    pub fn local_aabb(&self) -> Aabb {
        let mut aabb = Aabb::INFINITE;
        for axis in 0..3 {
            let n = self.normal[axis];
            if (n.abs() - 1.0).abs() < 1e-6 {
                if n > 0.0 {
                    aabb.max[axis] = self.distance;
                } else {
                    aabb.min[axis] = -self.distance;
                }
            }
        }
        aabb
    }
}

/// A ray segment starting at the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Unit direction.
    pub direction: Vec3,
    pub length: f32,
}

impl Ray {
    pub fn new(direction: Vec3, length: f32) -> Result<Self> {
        let direction = direction
            .try_normalize()
            .ok_or(PhysicsError::InvalidShape("ray direction must be non-zero and finite"))?;
        Ok(Self {
            direction,
            length: positive(length, "ray length must be positive and finite")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        Self::new(self.direction, self.length).map(|_| ())
    }

    #[inline]
    pub fn end(&self) -> Vec3 {
        self.direction * self.length
    }

    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_points([Vec3::ZERO, self.end()])
    }

    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        if direction.dot(self.direction) > 0.0 {
            self.end()
        } else {
            Vec3::ZERO
        }
    }
}
