use glam::Vec3;

use super::object::ObjectHandle;

/// Maximum number of contacts kept per object pair.
pub const MAX_CONTACTS: usize = 4;

/// Identifies a contact by the features that produced it.
///
/// Features are shape-specific indices (box corner, face, edge, triangle,
/// sample). Equal ids across frames let a contact inherit its impulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContactId {
    pub feature_a: u32,
    pub feature_b: u32,
}

impl ContactId {
    #[inline]
    pub const fn new(feature_a: u32, feature_b: u32) -> Self {
        Self {
            feature_a,
            feature_b,
        }
    }

    /// The same id seen from the other object.
    #[inline]
    pub const fn flipped(self) -> Self {
        Self::new(self.feature_b, self.feature_a)
    }
}

/// A single contact point between two collision objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact point, midway between the surfaces.
    pub position: Vec3,
    /// Unit normal pointing from the second object toward the first.
    pub normal: Vec3,
    /// Penetration depth; negative when the surfaces are apart. For ray
    /// contacts this is the distance along the ray.
    pub depth: f32,
    pub id: ContactId,
    /// Contact point in the first object's local frame.
    pub local_anchor_a: Vec3,
    /// Contact point in the second object's local frame.
    pub local_anchor_b: Vec3,
    /// Accumulated normal impulse, carried across frames.
    pub normal_impulse: f32,
    /// Accumulated friction impulses along the two tangents.
    pub tangent_impulse: [f32; 2],
}

impl Contact {
    pub fn new(position: Vec3, normal: Vec3, depth: f32, id: ContactId) -> Self {
        Self {
            position,
            normal,
            depth,
            id,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            normal_impulse: 0.0,
            tangent_impulse: [0.0; 2],
        }
    }

    /// The same contact seen with the objects swapped.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            id: self.id.flipped(),
            local_anchor_a: self.local_anchor_b,
            local_anchor_b: self.local_anchor_a,
            ..*self
        }
    }

    fn inherit_impulses(&mut self, prior: &Contact) {
        self.normal_impulse = prior.normal_impulse;
        self.tangent_impulse = prior.tangent_impulse;
    }
}

/// All contacts between one pair of collision objects.
#[derive(Debug, Clone)]
pub struct ContactSet {
    pub object_a: ObjectHandle,
    pub object_b: ObjectHandle,
    contacts: Vec<Contact>,
}

impl ContactSet {
    pub fn new(object_a: ObjectHandle, object_b: ObjectHandle) -> Self {
        Self {
            object_a,
            object_b,
            contacts: Vec::with_capacity(MAX_CONTACTS),
        }
    }

    #[inline]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    #[inline]
    pub fn contacts_mut(&mut self) -> &mut [Contact] {
        &mut self.contacts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn deepest(&self) -> Option<&Contact> {
        self.contacts.iter().max_by(|a, b| a.depth.total_cmp(&b.depth))
    }

    /// True if `object` is one of the pair.
    #[inline]
    pub fn involves(&self, object: ObjectHandle) -> bool {
        self.object_a == object || self.object_b == object
    }

    /// The pair member that is not `object`.
    pub fn other(&self, object: ObjectHandle) -> Option<ObjectHandle> {
        if self.object_a == object {
            Some(self.object_b)
        } else if self.object_b == object {
            Some(self.object_a)
        } else {
            None
        }
    }

    /// Replaces the contacts with a fresh batch.
    ///
    /// The batch is reduced to [`MAX_CONTACTS`], then each contact takes
    /// the impulses of the prior contact with the same id, provided its
    /// anchor moved less than `match_tolerance`.
    pub fn update(&mut self, mut fresh: Vec<Contact>, match_tolerance: f32) {
        reduce_contacts(&mut fresh);
        let tolerance_sq = match_tolerance * match_tolerance;
        for contact in &mut fresh {
            let prior = self.contacts.iter().find(|p| {
                p.id == contact.id
                    && p.local_anchor_a.distance_squared(contact.local_anchor_a) <= tolerance_sq
                    && p.local_anchor_b.distance_squared(contact.local_anchor_b) <= tolerance_sq
            });
            if let Some(prior) = prior {
                contact.inherit_impulses(prior);
            }
        }
        self.contacts = fresh;
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }
}

/// Shrinks `contacts` to at most [`MAX_CONTACTS`] points.
///
/// Keeps the deepest point, then the point farthest from it, then the
/// point spanning the largest triangle, then the point adding the most
/// area outside that triangle.
pub fn reduce_contacts(contacts: &mut Vec<Contact>) {
    if contacts.len() <= MAX_CONTACTS {
        return;
    }

    let mut chosen: Vec<usize> = Vec::with_capacity(MAX_CONTACTS);
    let Some(first) = (0..contacts.len()).max_by(|&a, &b| contacts[a].depth.total_cmp(&contacts[b].depth)) else {
        return;
    };
    chosen.push(first);
    let normal = contacts[first].normal;
    let p0 = contacts[first].position;

    let pick = |chosen: &[usize], score: &dyn Fn(Vec3) -> f32| -> Option<usize> {
        (0..contacts.len())
            .filter(|i| !chosen.contains(i))
            .map(|i| (i, score(contacts[i].position)))
            .filter(|&(_, s)| s > 1e-9)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    };

    let Some(second) = pick(&chosen, &|p| p.distance_squared(p0)) else {
        let deepest = contacts[first];
        contacts.clear();
        contacts.push(deepest);
        return;
    };
    chosen.push(second);
    let p1 = contacts[second].position;

    if let Some(third) = pick(&chosen, &|p| (p1 - p0).cross(p - p0).dot(normal).abs()) {
        chosen.push(third);
        let mut tri = [p0, p1, contacts[third].position];
        // Counter-clockwise about the normal
        if (tri[1] - tri[0]).cross(tri[2] - tri[0]).dot(normal) < 0.0 {
            tri.swap(1, 2);
        }
        let outside_area = |p: Vec3| -> f32 {
            (0..3)
                .map(|e| {
                    let (a, b) = (tri[e], tri[(e + 1) % 3]);
                    -(b - a).cross(p - a).dot(normal)
                })
                .fold(0.0, f32::max)
        };
        if let Some(fourth) = pick(&chosen, &outside_area) {
            chosen.push(fourth);
        }
    }

    let kept: Vec<Contact> = chosen.iter().map(|&i| contacts[i]).collect();
    *contacts = kept;
}
