//! Sparse octree with caller-supplied containment and collision predicates.

use ember_math::{Aabb3, Ray};

/// Box-item containment predicate: does `item` belong in a node with this box?
pub type ContainmentFn<T> = Box<dyn Fn(&T, &Aabb3) -> bool + Send + Sync>;

/// Ray-item collision predicate: ray parameter of the hit, if any.
pub type CollisionFn<T> = Box<dyn Fn(&T, &Ray) -> Option<f32> + Send + Sync>;

/// Nodes smaller than this along every axis are not split further.
const MIN_NODE_EXTENT: f32 = 1e-4;

/// Slack when comparing a node's entry distance against the best hit so far.
const PRUNE_EPSILON: f32 = 1e-5;

/// Default number of nodes a single item may be stored in.
pub const DEFAULT_MAX_STRADDLE: usize = 4;

/// An octree node. Children are allocated only for octants that receive items.
#[derive(Debug, Clone)]
pub struct OctreeNode<T> {
    /// Box covered by this node.
    pub aabb: Aabb3,
    /// Items stored at this node.
    pub items: Vec<T>,
    /// Children in octant order: bit 0 = +x, bit 1 = +y, bit 2 = +z.
    children: Option<Box<[Option<OctreeNode<T>>; 8]>>,
}

impl<T> OctreeNode<T> {
    fn new(aabb: Aabb3) -> Self {
        Self {
            aabb,
            items: Vec::new(),
            children: None,
        }
    }

    /// Child node for `octant`, if one was allocated.
    pub fn child(&self, octant: usize) -> Option<&OctreeNode<T>> {
        self.children.as_ref().and_then(|c| c[octant].as_ref())
    }

    /// Iterate over the allocated children.
    pub fn children(&self) -> impl Iterator<Item = &OctreeNode<T>> {
        self.children.iter().flat_map(|c| c.iter().flatten())
    }

    /// True if no children were ever allocated.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// A ray hit against an octree item.
#[derive(Debug)]
pub struct OctreeHit<'a, T> {
    /// The item that was hit.
    pub item: &'a T,
    /// Ray parameter of the hit.
    pub distance: f32,
}

impl<T> Clone for OctreeHit<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OctreeHit<'_, T> {}

/// Octree statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctreeStats {
    /// Allocated nodes, root included.
    pub node_count: usize,
    /// Nodes without children.
    pub leaf_count: usize,
    /// Items stored across all nodes, duplicates included.
    pub stored_items: usize,
    /// Items accepted by [`SparseOctree::insert`].
    pub inserted_items: usize,
    /// Deepest level holding a node (root = 0).
    pub depth_reached: u8,
}

/// Sparse octree over a fixed bounding volume.
///
/// Items are pushed down into every child whose box satisfies the
/// containment predicate, so an item straddling a split plane is stored in
/// several nodes. Each item is stored in at most `max_straddle` nodes: once
/// it touches more children than its remaining share allows, it stays at the
/// current node. Depth is fixed at construction.
pub struct SparseOctree<T> {
    root: OctreeNode<T>,
    max_depth: u8,
    max_straddle: usize,
    containment: ContainmentFn<T>,
    collision: CollisionFn<T>,
    len: usize,
}

impl<T: Clone> SparseOctree<T> {
    /// Create an empty octree covering `bounds`.
    pub fn new(
        bounds: Aabb3,
        max_depth: u8,
        containment: impl Fn(&T, &Aabb3) -> bool + Send + Sync + 'static,
        collision: impl Fn(&T, &Ray) -> Option<f32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            root: OctreeNode::new(bounds),
            max_depth,
            max_straddle: DEFAULT_MAX_STRADDLE,
            containment: Box::new(containment),
            collision: Box::new(collision),
            len: 0,
        }
    }

    /// Set how many nodes a single item may be stored in. Values are clamped
    /// to `1..=8`.
    pub fn with_max_straddle(mut self, max_straddle: usize) -> Self {
        self.max_straddle = max_straddle.clamp(1, 8);
        self
    }

    /// Insert an item.
    ///
    /// Returns `false` (and stores nothing) if the item does not satisfy the
    /// containment predicate against the root box.
    pub fn insert(&mut self, item: T) -> bool {
        if !(self.containment)(&item, &self.root.aabb) {
            return false;
        }
        let ctx = InsertCtx {
            max_depth: self.max_depth,
            max_straddle: self.max_straddle,
            containment: &self.containment,
        };
        insert_node(&mut self.root, item, 0, ctx.max_straddle, &ctx);
        self.len += 1;
        true
    }

    /// Nearest hit along `ray` across all nodes, or `None`.
    pub fn raycast(&self, ray: &Ray) -> Option<OctreeHit<'_, T>> {
        let mut best = None;
        self.raycast_node(&self.root, ray, &mut best);
        best
    }

    fn raycast_node<'a>(
        &'a self,
        node: &'a OctreeNode<T>,
        ray: &Ray,
        best: &mut Option<OctreeHit<'a, T>>,
    ) {
        let Some((t_enter, _)) = ray.intersect_aabb(&node.aabb) else {
            return;
        };
        if let Some(hit) = best {
            if t_enter > hit.distance + PRUNE_EPSILON {
                return;
            }
        }

        for item in &node.items {
            if let Some(distance) = (self.collision)(item, ray) {
                if best.map_or(true, |b| distance < b.distance) {
                    *best = Some(OctreeHit { item, distance });
                }
            }
        }

        // Visit children front to back so the prune above kicks in early.
        let mut order: Vec<(f32, &OctreeNode<T>)> = node
            .children()
            .filter_map(|child| ray.intersect_aabb(&child.aabb).map(|(t, _)| (t, child)))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, child) in order {
            self.raycast_node(child, ray, best);
        }
    }

    /// Structure statistics.
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            inserted_items: self.len,
            ..Default::default()
        };
        collect_stats(&self.root, 0, &mut stats);
        stats
    }
}

impl<T: Clone + PartialEq> SparseOctree<T> {
    /// Every distinct item hit along `ray`, sorted by distance.
    pub fn raycast_all(&self, ray: &Ray) -> Vec<OctreeHit<'_, T>> {
        let mut hits: Vec<OctreeHit<'_, T>> = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if ray.intersect_aabb(&node.aabb).is_none() {
                continue;
            }
            for item in &node.items {
                if let Some(distance) = (self.collision)(item, ray) {
                    if !hits.iter().any(|h| h.item == item) {
                        hits.push(OctreeHit { item, distance });
                    }
                }
            }
            stack.extend(node.children());
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

impl<T> SparseOctree<T> {
    /// The root bounding volume.
    pub fn bounds(&self) -> &Aabb3 {
        &self.root.aabb
    }

    /// Maximum subdivision depth.
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// The root node.
    pub fn root(&self) -> &OctreeNode<T> {
        &self.root
    }

    /// Number of items accepted by `insert` (not counting duplicates).
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing was inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SparseOctree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseOctree")
            .field("bounds", &self.root.aabb)
            .field("max_depth", &self.max_depth)
            .field("max_straddle", &self.max_straddle)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

struct InsertCtx<'a, T> {
    max_depth: u8,
    max_straddle: usize,
    containment: &'a ContainmentFn<T>,
}

/// Push `item` down from `node`, storing at most `budget` copies of it.
///
/// The item splits into every child octant it touches only when each of
/// those children can be given a share of the budget; the shares sum to
/// `budget`, so the copies across the whole subtree never exceed it.
fn insert_node<T: Clone>(
    node: &mut OctreeNode<T>,
    item: T,
    depth: u8,
    budget: usize,
    ctx: &InsertCtx<'_, T>,
) {
    let splittable = depth < ctx.max_depth && node.aabb.extents().max() > MIN_NODE_EXTENT;
    if splittable {
        let parent = node.aabb;
        let fits: Vec<usize> = (0..8)
            .filter(|&i| (ctx.containment)(&item, &parent.octant(i)))
            .collect();

        if let Some((&last, rest)) = fits.split_last() {
            if fits.len() <= budget {
                let share = budget / fits.len();
                let extra = budget % fits.len();
                let children = node.children.get_or_insert_with(Default::default);
                for (n, &i) in rest.iter().enumerate() {
                    let child = children[i].get_or_insert_with(|| OctreeNode::new(parent.octant(i)));
                    let child_budget = share + usize::from(n < extra);
                    insert_node(child, item.clone(), depth + 1, child_budget, ctx);
                }
                let child =
                    children[last].get_or_insert_with(|| OctreeNode::new(parent.octant(last)));
                insert_node(child, item, depth + 1, share, ctx);
                return;
            }
        }
    }
    node.items.push(item);
}

fn collect_stats<T>(node: &OctreeNode<T>, depth: u8, stats: &mut OctreeStats) {
    stats.node_count += 1;
    stats.stored_items += node.items.len();
    stats.depth_reached = stats.depth_reached.max(depth);
    if node.is_leaf() {
        stats.leaf_count += 1;
    }
    for child in node.children() {
        collect_stats(child, depth + 1, stats);
    }
}
