//! Collision geometry: shapes, bounding boxes and the static triangle tree.

mod aabb;
pub mod aabb_tree;
mod convex_hull;
mod mesh;
mod primitives;
mod shape;

pub use aabb::Aabb;
pub use aabb_tree::AabbTree;
pub use convex_hull::ConvexHull;
pub use mesh::{Triangle, TriangleMesh};
pub use primitives::{BoxShape, Capsule, Cylinder, Plane, Ray, Sphere};
pub use shape::{world_plane, ConvexRef, MassProperties, PosedConvex, Shape, ShapeType, SupportMap};
