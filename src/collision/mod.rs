//! Collision detection: objects, broad phase, filtering, narrow phase and
//! persistent contact sets.

pub mod broad_phase;
pub mod contact;
mod domain;
mod filter;
pub mod narrow_phase;
mod object;

pub use broad_phase::{BroadPhase, BroadPhaseFilter, ObjectPair, RejectStaticPairs};
pub use contact::{reduce_contacts, Contact, ContactId, ContactSet, MAX_CONTACTS};
pub use domain::{CollisionDomain, RayHit};
pub use filter::CollisionFilter;
pub use narrow_phase::{cast_ray, collide, RayIntersection};
pub use object::{CollisionObject, ObjectHandle, DEFAULT_GROUP};
