//! The collision domain: objects, broad phase, filter and contact sets.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::{debug, trace};

use super::broad_phase::{BroadPhase, ObjectPair};
use super::contact::ContactSet;
use super::filter::CollisionFilter;
use super::narrow_phase::{self, cast_ray};
use super::object::{CollisionObject, ObjectHandle};
use crate::arena::Arena;
use crate::dynamics::BodyHandle;
use crate::error::{PhysicsError, Result};
use crate::geometry::{Aabb, Shape};
use crate::math::Pose;
use crate::settings::ContactSettings;

/// Nearest hit of a ray cast through the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub object: ObjectHandle,
    /// Body owning the hit object, if any
    pub owner: Option<BodyHandle>,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Owns every collision object and keeps their contact sets current.
///
/// [`CollisionDomain::update`] runs the broad phase, drops pairs the
/// [`CollisionFilter`] disables, and rebuilds the contact set of every
/// remaining pair. Contacts inherit impulses from matching contacts of the
/// previous update.
#[derive(Debug)]
pub struct CollisionDomain {
    objects: Arena<ObjectHandle, CollisionObject>,
    broad_phase: BroadPhase,
    filter: CollisionFilter,
    contact_sets: BTreeMap<ObjectPair, ContactSet>,
    settings: ContactSettings,
}

impl Default for CollisionDomain {
    fn default() -> Self {
        Self::new(ContactSettings::default())
    }
}

impl CollisionDomain {
    pub fn new(settings: ContactSettings) -> Self {
        Self {
            objects: Arena::new(),
            broad_phase: BroadPhase::new(settings.broad_phase_margin),
            filter: CollisionFilter::new(),
            contact_sets: BTreeMap::new(),
            settings,
        }
    }

    #[inline]
    pub fn settings(&self) -> &ContactSettings {
        &self.settings
    }

    /// Takes effect on the next update. The broad-phase margin only
    /// applies to objects inserted afterwards.
    pub fn set_settings(&mut self, settings: ContactSettings) {
        self.settings = settings;
    }

    pub fn add_object(&mut self, object: CollisionObject) -> ObjectHandle {
        let aabb = object.world_aabb();
        let enabled = object.enabled;
        let handle = self.objects.insert(object);
        if enabled {
            self.broad_phase.insert_or_update(handle, aabb);
        }
        trace!(?handle, "collision object added");
        handle
    }

    /// Removes an object together with its contact sets and filter entries.
    pub fn remove_object(&mut self, handle: ObjectHandle) -> Option<CollisionObject> {
        let object = self.objects.remove(handle)?;
        self.broad_phase.remove(handle);
        self.filter.forget_object(handle);
        self.contact_sets.retain(|pair, _| !pair.contains(handle));
        trace!(?handle, "collision object removed");
        Some(object)
    }

    #[inline]
    pub fn object(&self, handle: ObjectHandle) -> Option<&CollisionObject> {
        self.objects.get(handle)
    }

    /// Edits are picked up by the next update.
    #[inline]
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut CollisionObject> {
        self.objects.get_mut(handle)
    }

    /// Moves an object and refits its broad-phase bounds right away, so
    /// queries see the new pose before the next update.
    pub fn set_object_pose(&mut self, handle: ObjectHandle, pose: Pose) -> Result<()> {
        let object = self
            .objects
            .get_mut(handle)
            .ok_or(PhysicsError::UnknownObject(handle))?;
        object.pose = pose;
        if object.enabled {
            let aabb = object.world_aabb();
            self.broad_phase.insert_or_update(handle, aabb);
        }
        Ok(())
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectHandle, &CollisionObject)> + '_ {
        self.objects.iter()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Recomputes candidate pairs and rebuilds every contact set.
    pub fn update(&mut self) {
        self.broad_phase.update_pairs(&self.objects);

        let margin = self.settings.contact_margin;
        let tolerance = self.settings.contact_match_tolerance;
        let mut live = BTreeMap::new();

        for &pair in self.broad_phase.pairs() {
            let (Some(a), Some(b)) = (self.objects.get(pair.a), self.objects.get(pair.b)) else {
                continue;
            };
            if !self.filter.can_collide(pair, a, b) {
                continue;
            }

            let mut fresh = narrow_phase::collide(&a.shape, &a.pose, &b.shape, &b.pose, margin);
            fresh.retain(|c| c.depth >= -margin);
            if fresh.is_empty() {
                continue;
            }
            for contact in &mut fresh {
                contact.local_anchor_a = a.pose.inverse_transform_point(contact.position);
                contact.local_anchor_b = b.pose.inverse_transform_point(contact.position);
            }

            let mut set = self
                .contact_sets
                .remove(&pair)
                .unwrap_or_else(|| ContactSet::new(pair.a, pair.b));
            set.update(fresh, tolerance);
            live.insert(pair, set);
        }

        self.contact_sets = live;
        debug!(
            objects = self.objects.len(),
            pairs = self.broad_phase.pairs().len(),
            contact_sets = self.contact_sets.len(),
            "collision domain updated"
        );
    }

    /// Contact sets that involve `object`.
    pub fn contacts_for(&self, object: ObjectHandle) -> impl Iterator<Item = &ContactSet> + '_ {
        self.contact_sets.values().filter(move |set| set.involves(object))
    }

    /// Every live contact set, ordered by object pair.
    pub fn contact_sets(&self) -> impl Iterator<Item = &ContactSet> + '_ {
        self.contact_sets.values()
    }

    /// The contact set of a pair in either order. Its `object_a` is the
    /// smaller handle.
    pub fn contact_set(&self, a: ObjectHandle, b: ObjectHandle) -> Option<&ContactSet> {
        self.contact_sets.get(&ObjectPair::new(a, b))
    }

    pub(crate) fn contact_set_mut(&mut self, pair: ObjectPair) -> Option<&mut ContactSet> {
        self.contact_sets.get_mut(&pair)
    }

    pub(crate) fn contact_pairs(&self) -> impl Iterator<Item = (ObjectPair, &ContactSet)> + '_ {
        self.contact_sets.iter().map(|(pair, set)| (*pair, set))
    }

    #[inline]
    pub fn contact_set_count(&self) -> usize {
        self.contact_sets.len()
    }

    /// Nearest object hit by a ray.
    ///
    /// With `group` set, only objects whose group the filter lets collide
    /// with it are considered. Ray shapes and disabled objects are skipped.
    pub fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, group: Option<u32>) -> Option<RayHit> {
        let direction = direction.try_normalize()?;
        let mut best: Option<RayHit> = None;

        for (handle, entry) in self.broad_phase.query_ray(origin, direction, max_distance) {
            if best.is_some_and(|hit| entry > hit.distance) {
                break;
            }
            let Some(object) = self.objects.get(handle) else {
                continue;
            };
            if !object.enabled || matches!(object.shape, Shape::Ray(_)) {
                continue;
            }
            if group.is_some_and(|g| !self.filter.groups_collide(g, object.group)) {
                continue;
            }
            let Some(hit) = cast_ray(&object.shape, &object.pose, origin, direction, max_distance) else {
                continue;
            };
            if best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(RayHit {
                    object: handle,
                    owner: object.owner,
                    point: origin + direction * hit.distance,
                    normal: hit.normal,
                    distance: hit.distance,
                });
            }
        }
        best
    }

    /// Objects whose bounds overlap `aabb`, in handle order.
    pub fn objects_overlapping(&self, aabb: &Aabb) -> Vec<ObjectHandle> {
        let mut found = Vec::new();
        self.broad_phase.query_aabb(aabb, |handle| {
            if self.objects.get(handle).is_some_and(|o| o.world_aabb().intersects(aabb)) {
                found.push(handle);
            }
        });
        found.sort_unstable();
        found
    }

    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    #[inline]
    pub fn broad_phase_mut(&mut self) -> &mut BroadPhase {
        &mut self.broad_phase
    }

    #[inline]
    pub fn filter(&self) -> &CollisionFilter {
        &self.filter
    }

    #[inline]
    pub fn filter_mut(&mut self) -> &mut CollisionFilter {
        &mut self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ball(x: f32, y: f32) -> CollisionObject {
        CollisionObject::new(Shape::sphere(0.5).unwrap(), Pose::from_position(Vec3::new(x, y, 0.0)))
    }

    fn floor() -> CollisionObject {
        CollisionObject::new(Shape::plane(Vec3::Y, 0.0).unwrap(), Pose::IDENTITY).with_static(true)
    }

    #[test]
    fn test_update_builds_contact_sets() {
        let mut domain = CollisionDomain::default();
        let ground = domain.add_object(floor());
        let resting = domain.add_object(ball(0.0, 0.45));
        let far = domain.add_object(ball(5.0, 3.0));
        domain.update();

        assert_eq!(domain.contact_set_count(), 1);
        let set = domain.contact_set(resting, ground).unwrap();
        assert_eq!(set.len(), 1);
        assert_relative_eq!(set.contacts()[0].depth, 0.05, epsilon = 1e-5);
        assert_eq!(domain.contacts_for(far).count(), 0);
    }

    #[test]
    fn test_normal_points_toward_first_object() {
        let mut domain = CollisionDomain::default();
        let ground = domain.add_object(floor());
        let resting = domain.add_object(ball(0.0, 0.45));
        domain.update();

        let set = domain.contact_set(ground, resting).unwrap();
        let expected = if set.object_a == ground { -Vec3::Y } else { Vec3::Y };
        assert_eq!(set.contacts()[0].normal, expected);
    }

    #[test]
    fn test_impulses_survive_updates() {
        let mut domain = CollisionDomain::default();
        let ground = domain.add_object(floor());
        let resting = domain.add_object(ball(0.0, 0.45));
        domain.update();

        let pair = ObjectPair::new(ground, resting);
        domain.contact_set_mut(pair).unwrap().contacts_mut()[0].normal_impulse = 4.0;
        domain.set_object_pose(resting, Pose::from_position(Vec3::new(0.001, 0.44, 0.0))).unwrap();
        domain.update();
        assert_eq!(domain.contact_set(ground, resting).unwrap().contacts()[0].normal_impulse, 4.0);
    }

    #[test]
    fn test_static_pairs_have_no_contacts() {
        let mut domain = CollisionDomain::default();
        domain.add_object(floor());
        domain.add_object(ball(0.0, 0.2).with_static(true));
        domain.update();
        assert_eq!(domain.contact_set_count(), 0);
    }

    #[test]
    fn test_group_filter_gates_contacts() {
        let mut domain = CollisionDomain::default();
        domain.add_object(floor().with_group(1));
        domain.add_object(ball(0.0, 0.45).with_group(2));

        domain.filter_mut().set(1, 2, false);
        domain.update();
        assert_eq!(domain.contact_set_count(), 0);

        domain.filter_mut().set(2, 1, true);
        domain.update();
        assert_eq!(domain.contact_set_count(), 1);
    }

    #[test]
    fn test_object_pair_filter() {
        let mut domain = CollisionDomain::default();
        let a = domain.add_object(ball(0.0, 0.0));
        let b = domain.add_object(ball(0.8, 0.0));
        domain.filter_mut().set_objects(a, b, false);
        domain.update();
        assert!(domain.contact_set(a, b).is_none());
    }

    #[test]
    fn test_remove_object_drops_its_sets() {
        let mut domain = CollisionDomain::default();
        let ground = domain.add_object(floor());
        let resting = domain.add_object(ball(0.0, 0.45));
        domain.update();

        assert!(domain.remove_object(resting).is_some());
        assert_eq!(domain.contact_set_count(), 0);
        assert!(domain.object(resting).is_none());
        assert!(domain.remove_object(resting).is_none());
        assert_eq!(
            domain.set_object_pose(resting, Pose::IDENTITY),
            Err(PhysicsError::UnknownObject(resting))
        );
        domain.update();
        assert_eq!(domain.contacts_for(ground).count(), 0);
    }

    #[test]
    fn test_separated_within_margin_is_kept() {
        let mut domain = CollisionDomain::new(ContactSettings {
            contact_margin: 0.05,
            ..ContactSettings::default()
        });
        let ground = domain.add_object(floor());
        let hovering = domain.add_object(ball(0.0, 0.53));
        domain.update();
        let set = domain.contact_set(ground, hovering).unwrap();
        assert!(set.contacts()[0].depth < 0.0);

        domain.set_object_pose(hovering, Pose::from_position(Vec3::new(0.0, 0.6, 0.0))).unwrap();
        domain.update();
        assert!(domain.contact_set(ground, hovering).is_none());
    }

    #[test]
    fn test_ray_cast_nearest_hit() {
        let mut domain = CollisionDomain::default();
        let ground = domain.add_object(floor());
        let upper = domain.add_object(ball(0.0, 3.0).with_group(4));

        let hit = domain.ray_cast(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, 100.0, None).unwrap();
        assert_eq!(hit.object, upper);
        assert_relative_eq!(hit.distance, 6.5, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-4);

        domain.filter_mut().set(0, 4, false);
        let hit = domain.ray_cast(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, 100.0, Some(0)).unwrap();
        assert_eq!(hit.object, ground);
        assert_relative_eq!(hit.point.y, 0.0, epsilon = 1e-4);

        assert!(domain.ray_cast(Vec3::new(0.0, 10.0, 0.0), Vec3::Y, 100.0, None).is_none());
    }

    #[test]
    fn test_objects_overlapping() {
        let mut domain = CollisionDomain::default();
        let a = domain.add_object(ball(0.0, 0.0));
        let b = domain.add_object(ball(2.0, 0.0));
        domain.add_object(ball(10.0, 0.0));

        let found = domain.objects_overlapping(&Aabb::new(Vec3::splat(-1.0), Vec3::new(2.0, 1.0, 1.0)));
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_ray_object_picks_contacts() {
        let mut domain = CollisionDomain::default();
        let target = domain.add_object(ball(0.0, 0.0));
        let picker = domain.add_object(CollisionObject::new(
            Shape::ray(-Vec3::Y, 10.0).unwrap(),
            Pose::from_position(Vec3::new(0.0, 5.0, 0.0)),
        ));
        domain.update();

        let set = domain.contact_set(target, picker).unwrap();
        assert_relative_eq!(set.contacts()[0].depth, 4.5, epsilon = 1e-4);
    }
}
