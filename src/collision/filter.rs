//! Collision filtering by group pair, group and object pair.
//!
//! Everything collides unless disabled here. The filter runs after the
//! broad phase; a rejected pair gets no contact set.

use std::collections::HashSet;

use super::broad_phase::ObjectPair;
use super::object::{CollisionObject, ObjectHandle};

/// Enable table consulted for every broad-phase pair.
///
/// ```
/// use rigidsim::collision::CollisionFilter;
///
/// let mut filter = CollisionFilter::default();
/// filter.set(1, 2, false); // debris never hits triggers
/// assert!(!filter.groups_collide(2, 1));
/// assert!(filter.groups_collide(1, 1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollisionFilter {
    /// Disabled group pairs, stored with the smaller group first
    disabled_group_pairs: HashSet<(u32, u32)>,
    /// Groups that collide with nothing
    disabled_groups: HashSet<u32>,
    disabled_object_pairs: HashSet<ObjectPair>,
}

impl CollisionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables collisions between two groups (symmetric).
    pub fn set(&mut self, group_a: u32, group_b: u32, enabled: bool) {
        let key = (group_a.min(group_b), group_a.max(group_b));
        if enabled {
            self.disabled_group_pairs.remove(&key);
        } else {
            self.disabled_group_pairs.insert(key);
        }
    }

    /// Enables or disables every collision of one group.
    pub fn set_group(&mut self, group: u32, enabled: bool) {
        if enabled {
            self.disabled_groups.remove(&group);
        } else {
            self.disabled_groups.insert(group);
        }
    }

    /// Enables or disables collisions between two specific objects.
    pub fn set_objects(&mut self, a: ObjectHandle, b: ObjectHandle, enabled: bool) {
        let pair = ObjectPair::new(a, b);
        if enabled {
            self.disabled_object_pairs.remove(&pair);
        } else {
            self.disabled_object_pairs.insert(pair);
        }
    }

    pub fn groups_collide(&self, group_a: u32, group_b: u32) -> bool {
        !self.disabled_groups.contains(&group_a)
            && !self.disabled_groups.contains(&group_b)
            && !self
                .disabled_group_pairs
                .contains(&(group_a.min(group_b), group_a.max(group_b)))
    }

    /// Full check for a candidate pair.
    pub fn can_collide(&self, pair: ObjectPair, a: &CollisionObject, b: &CollisionObject) -> bool {
        self.groups_collide(a.group, b.group) && !self.disabled_object_pairs.contains(&pair)
    }

    /// Drops object-pair entries that mention `object`.
    pub(crate) fn forget_object(&mut self, object: ObjectHandle) {
        self.disabled_object_pairs.retain(|p| !p.contains(object));
    }

    /// Re-enables everything.
    pub fn clear(&mut self) {
        self.disabled_group_pairs.clear();
        self.disabled_groups.clear();
        self.disabled_object_pairs.clear();
    }
}
