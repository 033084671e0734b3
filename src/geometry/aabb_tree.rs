use glam::Vec3;

use super::aabb::Aabb;

const MAX_LEAF_ITEMS: usize = 4;

#[derive(Debug, Clone)]
enum NodeKind {
    /// Range into `items`.
    Leaf { start: u32, count: u32 },
    Internal { left: u32, right: u32 },
}

#[derive(Debug, Clone)]
struct Node {
    aabb: Aabb,
    kind: NodeKind,
}

/// A static bounding-volume tree over indexed items.
///
/// Built once from per-item bounds by recursive median splits along the
/// longest centroid axis, then queried many times. Used for the triangles
/// of a [`TriangleMesh`](super::TriangleMesh); the moving objects of a scene
/// live in the broad phase's dynamic tree instead.
#[derive(Debug, Clone, Default)]
pub struct AabbTree {
    nodes: Vec<Node>,
    items: Vec<u32>,
}

impl AabbTree {
    /// Builds a tree where item `i` is bounded by `bounds[i]`.
    pub fn build(bounds: &[Aabb]) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(bounds.len().max(1) * 2),
            items: (0..bounds.len() as u32).collect(),
        };
        if !bounds.is_empty() {
            let count = tree.items.len();
            tree.build_recursive(bounds, 0, count);
        }
        tree
    }

    fn build_recursive(&mut self, bounds: &[Aabb], start: usize, end: usize) -> u32 {
        let aabb = self.items[start..end]
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.union(&bounds[i as usize]));
        let index = self.nodes.len() as u32;

        if end - start <= MAX_LEAF_ITEMS {
            self.nodes.push(Node {
                aabb,
                kind: NodeKind::Leaf {
                    start: start as u32,
                    count: (end - start) as u32,
                },
            });
            return index;
        }

        let centroids = self.items[start..end]
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.expand_to_include(bounds[i as usize].center()));
        let axis = centroids.longest_axis();
        let mid = start + (end - start) / 2;
        self.items[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            let ca = bounds[a as usize].center()[axis];
            let cb = bounds[b as usize].center()[axis];
            ca.total_cmp(&cb)
        });

        // Placeholder, patched once both children exist
        self.nodes.push(Node {
            aabb,
            kind: NodeKind::Internal { left: 0, right: 0 },
        });
        let left = self.build_recursive(bounds, start, mid);
        let right = self.build_recursive(bounds, mid, end);
        self.nodes[index as usize].kind = NodeKind::Internal { left, right };
        index
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Bounds of everything in the tree.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |root| root.aabb)
    }

    /// Calls `callback` for every item whose bounds overlap `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(u32)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0u32];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    for &item in &self.items[start as usize..(start + count) as usize] {
                        callback(item);
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Finds the nearest item hit by a ray.
    ///
    /// `hit` performs the exact test for one item and returns its distance;
    /// the search window shrinks to the closest hit found so far.
    pub fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mut hit: impl FnMut(u32, f32) -> Option<f32>,
    ) -> Option<(u32, f32)> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<(u32, f32)> = None;
        let mut limit = max_distance;
        let mut stack = vec![0u32];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            if node.aabb.ray_intersection(origin, direction, limit).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, count } => {
                    for &item in &self.items[start as usize..(start + count) as usize] {
                        if let Some(t) = hit(item, limit) {
                            if t <= limit {
                                limit = t;
                                best = Some((item, t));
                            }
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        best
    }

    /// Depth of the deepest leaf, for diagnostics.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: u32) -> usize {
            match nodes[index as usize].kind {
                NodeKind::Leaf { .. } => 1,
                NodeKind::Internal { left, right } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}
