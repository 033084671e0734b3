use glam::Vec3;

use super::object::{CollisionObject, ObjectHandle};
use crate::arena::{Arena, ArenaHandle};
use crate::geometry::Aabb;

const NULL: u32 = u32::MAX;

/// An unordered pair of collision objects, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPair {
    pub a: ObjectHandle,
    pub b: ObjectHandle,
}

impl ObjectPair {
    #[inline]
    pub fn new(first: ObjectHandle, second: ObjectHandle) -> Self {
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }

    #[inline]
    pub fn contains(&self, object: ObjectHandle) -> bool {
        self.a == object || self.b == object
    }
}

/// Decides whether a candidate pair may proceed to the narrow phase.
///
/// Runs for every overlapping pair, so it must be cheap and pure.
pub trait BroadPhaseFilter: Send + Sync {
    fn accepts(&self, a: &CollisionObject, b: &CollisionObject) -> bool;
}

impl<F> BroadPhaseFilter for F
where
    F: Fn(&CollisionObject, &CollisionObject) -> bool + Send + Sync,
{
    #[inline]
    fn accepts(&self, a: &CollisionObject, b: &CollisionObject) -> bool {
        self(a, b)
    }
}

/// Rejects pairs where both objects are static. Installed by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectStaticPairs;

impl BroadPhaseFilter for RejectStaticPairs {
    #[inline]
    fn accepts(&self, a: &CollisionObject, b: &CollisionObject) -> bool {
        !(a.is_static && b.is_static)
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// Fat bounds for leaves, union of children otherwise.
    aabb: Aabb,
    parent: u32,
    left: u32,
    right: u32,
    height: i32,
    object: Option<ObjectHandle>,
}

impl Node {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.object.is_some()
    }
}

/// Incremental dynamic AABB tree over collision objects.
///
/// Leaves store fattened bounds; an object is only reinserted when its
/// tight bounds leave the fat ones. Inserts and removals rebalance the
/// tree with rotations. Objects with unbounded extents (planes) live in a
/// side list tested against every leaf. Candidate pairs are the objects
/// whose fat bounds overlap and which pass the installed
/// [`BroadPhaseFilter`].
pub struct BroadPhase {
    nodes: Vec<Node>,
    root: u32,
    /// Leaf node per object slot index
    leaves: Vec<u32>,
    unbounded: Vec<(ObjectHandle, Aabb)>,
    free_list: Vec<u32>,
    margin: f32,
    filter: Option<Box<dyn BroadPhaseFilter>>,
    pairs: Vec<ObjectPair>,
}

impl std::fmt::Debug for BroadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadPhase")
            .field("objects", &self.len())
            .field("unbounded", &self.unbounded.len())
            .field("pairs", &self.pairs.len())
            .field("margin", &self.margin)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl BroadPhase {
    /// Empty tree fattening bounds by `margin`, with [`RejectStaticPairs`].
    pub fn new(margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            root: NULL,
            leaves: Vec::new(),
            unbounded: Vec::new(),
            free_list: Vec::new(),
            margin,
            filter: Some(Box::new(RejectStaticPairs)),
            pairs: Vec::new(),
        }
    }

    pub fn set_filter(&mut self, filter: impl BroadPhaseFilter + 'static) {
        self.filter = Some(Box::new(filter));
    }

    /// Removes the pair filter; every overlapping pair is then reported.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    #[inline]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Candidate pairs from the last [`BroadPhase::update_pairs`], sorted.
    #[inline]
    pub fn pairs(&self) -> &[ObjectPair] {
        &self.pairs
    }

    /// Number of tracked objects, bounded and unbounded.
    pub fn len(&self) -> usize {
        self.leaves.iter().filter(|&&leaf| leaf != NULL).count() + self.unbounded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root == NULL && self.unbounded.is_empty()
    }

    pub fn contains(&self, object: ObjectHandle) -> bool {
        self.leaf_of(object).is_some() || self.unbounded_slot(object).is_some()
    }

    /// Height of the tree of bounded objects; 0 for a single leaf or none.
    pub fn height(&self) -> usize {
        if self.root == NULL {
            0
        } else {
            self.nodes[self.root as usize].height.max(0) as usize
        }
    }

    fn unbounded_slot(&self, object: ObjectHandle) -> Option<usize> {
        self.unbounded.iter().position(|(h, _)| *h == object)
    }

    fn leaf_of(&self, object: ObjectHandle) -> Option<u32> {
        let leaf = *self.leaves.get(object.index())?;
        (leaf != NULL && self.nodes[leaf as usize].object == Some(object)).then_some(leaf)
    }

    /// Brings the tree in sync with `objects` and recomputes the pair list.
    pub fn update_pairs(&mut self, objects: &Arena<ObjectHandle, CollisionObject>) {
        let stale: Vec<ObjectHandle> = self
            .nodes
            .iter()
            .filter_map(|n| n.object)
            .filter(|&h| self.leaf_of(h).is_some())
            .chain(self.unbounded.iter().map(|(h, _)| *h))
            .filter(|&h| objects.get(h).map_or(true, |o| !o.enabled))
            .collect();
        for handle in stale {
            self.remove(handle);
        }

        for (handle, object) in objects.iter() {
            if object.enabled {
                self.insert_or_update(handle, object.world_aabb());
            }
        }

        let mut pairs = Vec::new();
        self.for_each_overlap(|a, b| {
            let (Some(oa), Some(ob)) = (objects.get(a), objects.get(b)) else {
                return;
            };
            if self.filter.as_ref().map_or(true, |f| f.accepts(oa, ob)) {
                pairs.push(ObjectPair::new(a, b));
            }
        });
        pairs.sort_unstable();
        pairs.dedup();
        tracing::trace!(pairs = pairs.len(), "broad phase updated");
        self.pairs = pairs;
    }

    /// Inserts an object, or refits it if it already has a leaf.
    ///
    /// Returns true if the tree structure changed.
    pub fn insert_or_update(&mut self, object: ObjectHandle, aabb: Aabb) -> bool {
        if !is_bounded(&aabb) {
            if let Some(slot) = self.unbounded_slot(object) {
                self.unbounded[slot].1 = aabb;
                return false;
            }
            self.remove(object);
            self.unbounded.push((object, aabb));
            return true;
        }
        if let Some(slot) = self.unbounded_slot(object) {
            self.unbounded.remove(slot);
        }
        match self.leaf_of(object) {
            Some(leaf) if self.nodes[leaf as usize].aabb.contains_aabb(&aabb) => false,
            Some(_) => {
                self.remove(object);
                self.insert(object, aabb);
                true
            }
            None => {
                self.insert(object, aabb);
                true
            }
        }
    }

    fn insert(&mut self, object: ObjectHandle, aabb: Aabb) {
        let leaf = self.allocate(Node {
            aabb: aabb.expand(self.margin),
            parent: NULL,
            left: NULL,
            right: NULL,
            height: 0,
            object: Some(object),
        });
        let index = object.index();
        if index >= self.leaves.len() {
            self.leaves.resize(index + 1, NULL);
        }
        self.leaves[index] = leaf;

        if self.root == NULL {
            self.root = leaf;
            return;
        }

        let sibling = self.find_best_sibling(leaf);
        let old_parent = self.nodes[sibling as usize].parent;
        let parent_aabb = self.nodes[leaf as usize].aabb.union(&self.nodes[sibling as usize].aabb);
        let parent = self.allocate(Node {
            aabb: parent_aabb,
            parent: old_parent,
            left: sibling,
            right: leaf,
            height: 0,
            object: None,
        });
        self.nodes[sibling as usize].parent = parent;
        self.nodes[leaf as usize].parent = parent;
        self.replace_child(old_parent, sibling, parent);
        self.refit(parent);
    }

    /// Removes an object's leaf. Unknown objects are ignored.
    pub fn remove(&mut self, object: ObjectHandle) {
        if let Some(slot) = self.unbounded_slot(object) {
            self.unbounded.remove(slot);
            self.pairs.retain(|p| !p.contains(object));
            return;
        }
        let Some(leaf) = self.leaf_of(object) else {
            return;
        };
        self.leaves[object.index()] = NULL;
        self.pairs.retain(|p| !p.contains(object));

        if leaf == self.root {
            self.root = NULL;
            self.release(leaf);
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        self.replace_child(grandparent, parent, sibling);
        self.nodes[sibling as usize].parent = grandparent;
        if grandparent != NULL {
            self.refit(grandparent);
        }

        self.release(leaf);
        self.release(parent);
    }

    /// Objects whose fat bounds overlap `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(ObjectHandle)) {
        for (object, bounds) in &self.unbounded {
            if bounds.intersects(aabb) {
                callback(*object);
            }
        }
        self.query_tree(aabb, callback);
    }

    /// Objects whose fat bounds a ray may hit, with their entry distance.
    pub fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Vec<(ObjectHandle, f32)> {
        let mut results: Vec<(ObjectHandle, f32)> = self
            .unbounded
            .iter()
            .filter_map(|(object, bounds)| {
                let (t_enter, _) = bounds.ray_intersection(origin, direction, max_distance)?;
                Some((*object, t_enter))
            })
            .collect();
        let mut stack = if self.root == NULL { Vec::new() } else { vec![self.root] };
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            let Some((t_enter, _)) = node.aabb.ray_intersection(origin, direction, max_distance) else {
                continue;
            };
            match node.object {
                Some(object) => results.push((object, t_enter)),
                None => {
                    stack.push(node.left);
                    stack.push(node.right);
                }
            }
        }
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results
    }

    fn for_each_overlap(&self, mut callback: impl FnMut(ObjectHandle, ObjectHandle)) {
        for (i, (object, bounds)) in self.unbounded.iter().enumerate() {
            for (other, other_bounds) in &self.unbounded[i + 1..] {
                if bounds.intersects(other_bounds) {
                    callback(*object, *other);
                }
            }
            self.query_tree(bounds, |leaf| callback(*object, leaf));
        }
        if self.root == NULL {
            return;
        }
        let mut stack = Vec::new();
        for leaf in self.nodes.iter().filter(|n| n.is_leaf()) {
            let Some(object) = leaf.object else { continue };
            stack.clear();
            stack.push(self.root);
            while let Some(current) = stack.pop() {
                let node = &self.nodes[current as usize];
                if !node.aabb.intersects(&leaf.aabb) {
                    continue;
                }
                match node.object {
                    Some(other) if object < other => callback(object, other),
                    Some(_) => {}
                    None => {
                        stack.push(node.left);
                        stack.push(node.right);
                    }
                }
            }
        }
    }

    fn allocate(&mut self, node: Node) -> u32 {
        match self.free_list.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, index: u32) {
        let node = &mut self.nodes[index as usize];
        node.object = None;
        node.parent = NULL;
        node.left = NULL;
        node.right = NULL;
        self.free_list.push(index);
    }

    /// Surface-area heuristic descent for the cheapest sibling.
    fn find_best_sibling(&self, leaf: u32) -> u32 {
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut best = self.root;
        let mut best_cost = leaf_aabb.union(&self.nodes[best as usize].aabb).surface_area();

        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            let combined_cost = leaf_aabb.union(&node.aabb).surface_area();
            if combined_cost < best_cost {
                best = current;
                best_cost = combined_cost;
            }
            if !node.is_leaf() {
                let inherited = combined_cost - node.aabb.surface_area();
                let left_cost = leaf_aabb.union(&self.nodes[node.left as usize].aabb).surface_area() + inherited;
                let right_cost = leaf_aabb.union(&self.nodes[node.right as usize].aabb).surface_area() + inherited;
                if left_cost < best_cost || right_cost < best_cost {
                    stack.push(node.left);
                    stack.push(node.right);
                }
            }
        }
        best
    }

    /// Leaves of the tree whose fat bounds overlap `aabb`.
    fn query_tree(&self, aabb: &Aabb, mut callback: impl FnMut(ObjectHandle)) {
        if self.root == NULL {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }
            match node.object {
                Some(object) => callback(object),
                None => {
                    stack.push(node.left);
                    stack.push(node.right);
                }
            }
        }
    }

    /// Points `parent`'s link to `old` at `new`; a NULL parent makes `new`
    /// the root.
    fn replace_child(&mut self, parent: u32, old: u32, new: u32) {
        if parent == NULL {
            self.root = new;
            return;
        }
        let node = &mut self.nodes[parent as usize];
        if node.left == old {
            node.left = new;
        } else {
            node.right = new;
        }
    }

    /// Recomputes an internal node's bounds and height from its children.
    fn update_node(&mut self, index: u32) {
        let node = &self.nodes[index as usize];
        let (left, right) = (node.left as usize, node.right as usize);
        let aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
        let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
        let node = &mut self.nodes[index as usize];
        node.aabb = aabb;
        node.height = height;
    }

    /// Walks from `start` to the root, rebalancing and refitting each
    /// internal node.
    fn refit(&mut self, start: u32) {
        let mut current = start;
        while current != NULL {
            if self.nodes[current as usize].is_leaf() {
                current = self.nodes[current as usize].parent;
                continue;
            }
            current = self.balance(current);
            self.update_node(current);
            current = self.nodes[current as usize].parent;
        }
    }

    /// Rotates the taller child of `index` above it when the child heights
    /// differ by more than one. Returns the node now at `index`'s position.
    fn balance(&mut self, index: u32) -> u32 {
        let node = &self.nodes[index as usize];
        if node.is_leaf() || node.height < 2 {
            return index;
        }
        let (left, right) = (node.left, node.right);
        let skew = self.nodes[right as usize].height - self.nodes[left as usize].height;
        if skew > 1 {
            self.rotate_up(index, right)
        } else if skew < -1 {
            self.rotate_up(index, left)
        } else {
            index
        }
    }

    /// Promotes `child` into `parent`'s place. The child keeps its taller
    /// subtree; the shorter one moves under `parent`.
    fn rotate_up(&mut self, parent: u32, child: u32) -> u32 {
        let (f, g) = (self.nodes[child as usize].left, self.nodes[child as usize].right);
        let (keep, moved) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };

        let grandparent = self.nodes[parent as usize].parent;
        self.replace_child(grandparent, parent, child);
        self.nodes[child as usize].parent = grandparent;

        self.replace_child(parent, child, moved);
        self.nodes[moved as usize].parent = parent;

        let node = &mut self.nodes[child as usize];
        node.left = parent;
        node.right = keep;
        self.nodes[parent as usize].parent = child;

        self.update_node(parent);
        self.update_node(child);
        child
    }
}

fn is_bounded(aabb: &Aabb) -> bool {
    aabb.min.is_finite() && aabb.max.is_finite()
}
