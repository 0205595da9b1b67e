// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dynamic AABB tree: node pool, proxy lifecycle, queries, ray casts.

use alloc::vec;
use alloc::vec::Vec;
use glam::Vec3;

use crate::types::{Aabb, find_orthogonal};

/// Sentinel node index.
pub(crate) const NULL: u32 = u32::MAX;

/// Slots allocated on the first insertion.
const INITIAL_CAPACITY: usize = 16;

/// Default leaf fattening margin, in world units.
///
/// Leaf bounds are stored expanded by this margin beyond the tight object
/// bounds, so small per-frame movement is absorbed without restructuring.
pub const DEFAULT_MARGIN: f32 = 0.5;

/// Handle to a leaf of an [`AabbTree`], issued by
/// [`AabbTree::create_proxy`].
///
/// A `Proxy` is the leaf's node index. It stays valid until
/// [`AabbTree::destroy_proxy`]; use after destruction is a contract
/// violation and panics where detectable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Proxy(pub(crate) u32);

impl Proxy {
    /// Slot index of the underlying leaf node. Snapshot records are indexed
    /// by this value.
    pub const fn index(self) -> u32 {
        self.0
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<P> {
    /// Fattened bounds for leaves; union of child bounds for internal nodes.
    pub(crate) bounds: Aabb,
    /// Parent link for live nodes; next-free link while the slot is unused.
    pub(crate) parent: u32,
    pub(crate) child_a: u32,
    pub(crate) child_b: u32,
    /// 0 for leaves, -1 for free slots.
    pub(crate) height: i32,
    /// Caller payload; `Some` exactly on live leaves.
    pub(crate) payload: Option<P>,
    /// Set when the leaf's bounds change; cleared by the consumer.
    pub(crate) moved: bool,
}

impl<P> Node<P> {
    pub(crate) const fn is_leaf(&self) -> bool {
        self.child_a == NULL
    }

    fn free_slot(next: u32) -> Self {
        Self {
            bounds: Aabb::EMPTY,
            parent: next,
            child_a: NULL,
            child_b: NULL,
            height: -1,
            payload: None,
            moved: false,
        }
    }
}

/// A dynamic bounding-volume hierarchy over axis-aligned boxes.
///
/// Leaves wrap caller objects via fattened bounds; internal nodes are kept
/// height-balanced with single AVL-style rotations. Insertion places each
/// leaf next to the sibling minimizing a surface-area cost. All node links
/// are indices into one growable array; no node is ever shared between
/// proxies.
///
/// Mutation is single-threaded by construction (`&mut self`), and traversal
/// callbacks cannot mutate the tree they walk (`&self`).
pub struct AabbTree<P: Copy> {
    pub(crate) nodes: Vec<Node<P>>,
    pub(crate) root: u32,
    free_list: u32,
    node_count: usize,
    margin: f32,
}

impl<P: Copy> Default for AabbTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy> core::fmt::Debug for AabbTree<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AabbTree")
            .field("capacity", &self.nodes.len())
            .field("nodes_alive", &self.node_count)
            .field("height", &self.height())
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}

impl<P: Copy> AabbTree<P> {
    /// Create an empty tree with the [`DEFAULT_MARGIN`] fat margin.
    pub fn new() -> Self {
        Self::with_margin(DEFAULT_MARGIN)
    }

    /// Create an empty tree with an explicit fat margin (world units).
    ///
    /// The margin is fixed for the tree's lifetime. Zero is valid and makes
    /// leaf bounds exactly the tight bounds, at the cost of reinsertion on
    /// every movement.
    pub fn with_margin(margin: f32) -> Self {
        assert!(margin >= 0.0, "fat margin must be non-negative");
        Self {
            nodes: Vec::new(),
            root: NULL,
            free_list: NULL,
            node_count: 0,
            margin,
        }
    }

    /// The fat margin this tree was constructed with.
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Number of live nodes (leaves plus internal nodes).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Total node slots allocated, live or free. Never shrinks.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// True when no proxies exist.
    pub fn is_empty(&self) -> bool {
        self.root == NULL
    }

    /// Height of the root node; 0 for an empty or single-leaf tree.
    pub fn height(&self) -> i32 {
        if self.root == NULL {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Register an object. `bounds` are the tight object bounds; the stored
    /// leaf bounds are fattened by the tree margin. The new leaf starts with
    /// its `moved` flag set.
    pub fn create_proxy(&mut self, bounds: Aabb, payload: P) -> Proxy {
        let leaf = self.allocate_node();
        let node = &mut self.nodes[leaf as usize];
        node.bounds = bounds.expanded(self.margin);
        node.payload = Some(payload);
        node.moved = true;
        self.insert_leaf(leaf);
        Proxy(leaf)
    }

    /// Deregister an object. The proxy is invalid afterwards.
    pub fn destroy_proxy(&mut self, proxy: Proxy) {
        let leaf = self.checked_leaf(proxy);
        self.remove_leaf(leaf);
        self.free_node(leaf);
    }

    /// Move or resize an object. Returns `true` when the leaf was reinserted.
    ///
    /// When the new tight bounds still fit inside the leaf's current fat
    /// bounds this is a no-op — the tree is untouched and `moved` is not
    /// set — which is what absorbs small per-frame jitter.
    pub fn update_proxy(&mut self, proxy: Proxy, bounds: Aabb) -> bool {
        let leaf = self.checked_leaf(proxy);
        if self.nodes[leaf as usize].bounds.contains(&bounds) {
            return false;
        }
        self.remove_leaf(leaf);
        let node = &mut self.nodes[leaf as usize];
        node.bounds = bounds.expanded(self.margin);
        node.moved = true;
        self.insert_leaf(leaf);
        true
    }

    /// The payload stored on a proxy.
    pub fn payload(&self, proxy: Proxy) -> P {
        let leaf = self.checked_leaf(proxy);
        self.nodes[leaf as usize]
            .payload
            .expect("leaf node without payload")
    }

    /// The proxy's current fattened bounds.
    pub fn bounds(&self, proxy: Proxy) -> Aabb {
        let leaf = self.checked_leaf(proxy);
        self.nodes[leaf as usize].bounds
    }

    /// Whether the proxy's bounds changed since [`AabbTree::clear_moved`].
    pub fn moved(&self, proxy: Proxy) -> bool {
        let leaf = self.checked_leaf(proxy);
        self.nodes[leaf as usize].moved
    }

    /// Mark the proxy's movement as consumed.
    pub fn clear_moved(&mut self, proxy: Proxy) {
        let leaf = self.checked_leaf(proxy);
        self.nodes[leaf as usize].moved = false;
    }

    /// Visit every proxy whose fat bounds overlap `bounds`.
    ///
    /// `visit` returning `false` terminates the traversal early. The return
    /// value reports whether any leaf overlapped the region, regardless of
    /// what the visitor decided.
    pub fn query<F>(&self, bounds: Aabb, mut visit: F) -> bool
    where
        F: FnMut(Proxy, P) -> bool,
    {
        if self.root == NULL {
            return false;
        }
        let mut touched = false;
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects(&bounds) {
                continue;
            }
            if node.is_leaf() {
                touched = true;
                let payload = node.payload.expect("leaf node without payload");
                if !visit(Proxy(index), payload) {
                    return true;
                }
            } else {
                stack.push(node.child_a);
                stack.push(node.child_b);
            }
        }
        touched
    }

    /// Whether any proxy's fat bounds overlap `bounds`.
    pub fn overlaps(&self, bounds: Aabb) -> bool {
        self.query(bounds, |_, _| false)
    }

    /// Cast the segment `from -> to` through the tree.
    ///
    /// For every leaf whose fat bounds the segment enters (nearest-first is
    /// not guaranteed), `callback(from, to, proxy, payload)` is invoked. Its
    /// return value is the new clipping fraction for the rest of the search:
    /// a negative value rejects the hit and keeps the previous fraction,
    /// `0.0` effectively ends the search, and any other non-negative value
    /// clips the remaining segment to that fraction of `to - from`.
    ///
    /// Returns whether any leaf bounds were entered, regardless of what the
    /// callback decided.
    pub fn ray_cast<F>(&self, from: Vec3, to: Vec3, mut callback: F) -> bool
    where
        F: FnMut(Vec3, Vec3, Proxy, P) -> f32,
    {
        self.ray_cast_inner(from, to, Some(&mut callback))
    }

    /// Cast the segment `from -> to` and report whether it enters any leaf.
    ///
    /// Each hit clips the remaining segment to the hit's own entry fraction,
    /// so the traversal narrows as it goes.
    pub fn ray_cast_any(&self, from: Vec3, to: Vec3) -> bool {
        self.ray_cast_inner(from, to, None)
    }

    fn ray_cast_inner(
        &self,
        from: Vec3,
        to: Vec3,
        mut callback: Option<&mut dyn FnMut(Vec3, Vec3, Proxy, P) -> f32>,
    ) -> bool {
        if self.root == NULL {
            return false;
        }
        let r = (to - from).normalize_or_zero();
        if r == Vec3::ZERO {
            // Degenerate segment: no box face can be entered.
            return false;
        }
        // Axis perpendicular to the segment, for the separating-axis prune.
        let v = find_orthogonal(r);
        let abs_v = v.abs();

        let mut max_fraction = 1.0_f32;
        let mut seg_bounds = Aabb::from_points(from, from + max_fraction * (to - from));

        let mut hit = false;
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects(&seg_bounds) {
                continue;
            }

            // Separating axis: the whole segment lies on one side of the box
            // when |dot(v, from - center)| exceeds the box's radius along v.
            let c = node.bounds.center();
            let h = node.bounds.half_extents();
            if v.dot(from - c).abs() - abs_v.dot(h) > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let Some(fraction) = node.bounds.ray_cast(from, to, max_fraction) else {
                    continue;
                };
                hit = true;
                let payload = node.payload.expect("leaf node without payload");
                let clip = match &mut callback {
                    Some(cb) => cb(from, to, Proxy(index), payload),
                    None => fraction,
                };
                if clip >= 0.0 {
                    max_fraction = clip;
                    seg_bounds = Aabb::from_points(from, from + max_fraction * (to - from));
                }
            } else {
                stack.push(node.child_a);
                stack.push(node.child_b);
            }
        }
        hit
    }

    /// Check every structural invariant; panics on the first violation.
    ///
    /// Walks the whole tree and free list, so this is test/debug tooling,
    /// not something to call per frame.
    pub fn validate(&self) {
        if self.root != NULL {
            assert_eq!(
                self.nodes[self.root as usize].parent,
                NULL,
                "root must have no parent"
            );
        }

        let mut live = 0_usize;
        let mut stack = Vec::new();
        if self.root != NULL {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            live += 1;
            let node = &self.nodes[index as usize];
            assert!(node.height >= 0, "reachable node must be live");
            if node.is_leaf() {
                assert_eq!(node.child_b, NULL, "leaf with a single child");
                assert_eq!(node.height, 0, "leaf height must be 0");
                assert!(node.payload.is_some(), "leaf without payload");
            } else {
                let a = node.child_a as usize;
                let b = node.child_b as usize;
                assert!(node.payload.is_none(), "internal node with payload");
                assert_eq!(self.nodes[a].parent, index, "child_a parent link");
                assert_eq!(self.nodes[b].parent, index, "child_b parent link");
                assert_eq!(
                    node.height,
                    1 + self.nodes[a].height.max(self.nodes[b].height),
                    "height formula"
                );
                assert!(
                    (self.nodes[a].height - self.nodes[b].height).abs() <= 1,
                    "balance invariant"
                );
                assert_eq!(
                    node.bounds,
                    self.nodes[a].bounds.union(self.nodes[b].bounds),
                    "internal bounds must equal the union of child bounds"
                );
                stack.push(node.child_a);
                stack.push(node.child_b);
            }
        }
        assert_eq!(live, self.node_count, "live node count");

        let mut free = 0_usize;
        let mut index = self.free_list;
        while index != NULL {
            free += 1;
            assert!(free <= self.nodes.len(), "free list cycle");
            let node = &self.nodes[index as usize];
            assert_eq!(node.height, -1, "free node height must be -1");
            index = node.parent;
        }
        assert_eq!(live + free, self.nodes.len(), "every slot live or free");
    }

    // --- node pool ---

    fn allocate_node(&mut self) -> u32 {
        if self.free_list == NULL {
            self.grow();
        }
        let index = self.free_list;
        let node = &mut self.nodes[index as usize];
        self.free_list = node.parent;
        node.parent = NULL;
        node.child_a = NULL;
        node.child_b = NULL;
        node.height = 0;
        node.payload = None;
        node.moved = false;
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, index: u32) {
        let node = &mut self.nodes[index as usize];
        node.parent = self.free_list;
        node.child_a = NULL;
        node.child_b = NULL;
        node.height = -1;
        node.payload = None;
        node.moved = false;
        node.bounds = Aabb::EMPTY;
        self.free_list = index;
        self.node_count -= 1;
    }

    /// Double the backing array and link the new slots into a fresh free
    /// list.
    fn grow(&mut self) {
        let old = self.nodes.len();
        let new = if old == 0 { INITIAL_CAPACITY } else { old * 2 };
        for i in old..new {
            let next = if i + 1 < new {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "node indices are 32-bit by design"
                )]
                let next = (i + 1) as u32;
                next
            } else {
                NULL
            };
            self.nodes.push(Node::free_slot(next));
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "node indices are 32-bit by design"
        )]
        let head = old as u32;
        self.free_list = head;
    }

    // --- structure ---

    fn checked_leaf(&self, proxy: Proxy) -> u32 {
        let node = &self.nodes[proxy.idx()];
        assert!(
            node.height == 0 && node.is_leaf(),
            "stale or never-issued proxy: {proxy:?}"
        );
        proxy.0
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL;
            return;
        }

        // Descend towards the sibling that minimizes the surface-area cost
        // of adding the leaf.
        let leaf_bounds = self.nodes[leaf as usize].bounds;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let child_a = self.nodes[index as usize].child_a;
            let child_b = self.nodes[index as usize].child_b;

            let area = self.nodes[index as usize].bounds.area();
            let combined_area = self.nodes[index as usize].bounds.union(leaf_bounds).area();

            // Cost of pairing the leaf with this whole subtree.
            let cost = 2.0 * combined_area;
            // Cost every deeper placement inherits from growing this node.
            let inheritance = 2.0 * (combined_area - area);

            let a = &self.nodes[child_a as usize];
            let cost_a = if a.is_leaf() {
                leaf_bounds.union(a.bounds).area() + inheritance
            } else {
                leaf_bounds.union(a.bounds).area() - a.bounds.area() + inheritance
            };

            let b = &self.nodes[child_b as usize];
            let cost_b = if b.is_leaf() {
                leaf_bounds.union(b.bounds).area() + inheritance
            } else {
                leaf_bounds.union(b.bounds).area() - b.bounds.area() + inheritance
            };

            if cost < cost_a && cost < cost_b {
                break;
            }
            index = if cost_a < cost_b { child_a } else { child_b };
        }
        let sibling = index;

        // Splice a new parent in above the sibling.
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node();
        let sibling_bounds = self.nodes[sibling as usize].bounds;
        let sibling_height = self.nodes[sibling as usize].height;
        {
            let node = &mut self.nodes[new_parent as usize];
            node.parent = old_parent;
            node.bounds = leaf_bounds.union(sibling_bounds);
            node.height = sibling_height + 1;
            node.child_a = sibling;
            node.child_b = leaf;
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;
        if old_parent == NULL {
            self.root = new_parent;
        } else if self.nodes[old_parent as usize].child_a == sibling {
            self.nodes[old_parent as usize].child_a = new_parent;
        } else {
            self.nodes[old_parent as usize].child_b = new_parent;
        }

        self.fix_upward(new_parent);
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if self.root == leaf {
            self.root = NULL;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].child_a == leaf {
            self.nodes[parent as usize].child_b
        } else {
            self.nodes[parent as usize].child_a
        };

        if grandparent == NULL {
            // The parent was the root; the sibling takes its place.
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL;
            self.free_node(parent);
        } else {
            if self.nodes[grandparent as usize].child_a == parent {
                self.nodes[grandparent as usize].child_a = sibling;
            } else {
                self.nodes[grandparent as usize].child_b = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;
            self.free_node(parent);
            self.fix_upward(grandparent);
        }
    }

    /// Walk from `index` to the root, rebalancing and refitting each
    /// ancestor.
    fn fix_upward(&mut self, mut index: u32) {
        while index != NULL {
            index = self.balance(index);
            self.refit(index);
            index = self.nodes[index as usize].parent;
        }
    }

    /// Recompute an internal node's bounds and height from its children.
    fn refit(&mut self, index: u32) {
        let child_a = self.nodes[index as usize].child_a;
        let child_b = self.nodes[index as usize].child_b;
        let height = 1 + self.nodes[child_a as usize]
            .height
            .max(self.nodes[child_b as usize].height);
        let bounds = self.nodes[child_a as usize]
            .bounds
            .union(self.nodes[child_b as usize].bounds);
        let node = &mut self.nodes[index as usize];
        node.height = height;
        node.bounds = bounds;
    }

    /// Restore the balance invariant at `a` with a single rotation, if its
    /// children's heights differ by more than one. Returns the root of the
    /// balanced subtree.
    fn balance(&mut self, a: u32) -> u32 {
        let node = &self.nodes[a as usize];
        if node.is_leaf() || node.height < 2 {
            return a;
        }
        let b = node.child_a;
        let c = node.child_b;
        let diff = self.nodes[c as usize].height - self.nodes[b as usize].height;
        if diff > 1 {
            self.rotate_up(a, c)
        } else if diff < -1 {
            self.rotate_up(a, b)
        } else {
            a
        }
    }

    /// Promote child `c` of `a` one level up. The taller of `c`'s children
    /// stays attached to `c`; the shorter one takes `c`'s old slot under
    /// `a`. Returns `c`, the new root of the subtree.
    fn rotate_up(&mut self, a: u32, c: u32) -> u32 {
        let f = self.nodes[c as usize].child_a;
        let g = self.nodes[c as usize].child_b;

        // c takes a's place in the tree.
        let a_parent = self.nodes[a as usize].parent;
        self.nodes[c as usize].child_a = a;
        self.nodes[c as usize].parent = a_parent;
        self.nodes[a as usize].parent = c;
        if a_parent == NULL {
            self.root = c;
        } else if self.nodes[a_parent as usize].child_a == a {
            self.nodes[a_parent as usize].child_a = c;
        } else {
            self.nodes[a_parent as usize].child_b = c;
        }

        let (tall, short) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[c as usize].child_b = tall;
        if self.nodes[a as usize].child_a == c {
            self.nodes[a as usize].child_a = short;
        } else {
            self.nodes[a as usize].child_b = short;
        }
        self.nodes[short as usize].parent = a;

        // a's bounds changed first, c's depend on a's.
        self.refit(a);
        self.refit(c);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Deterministic xorshift, same flavor as the bench helpers.
    struct Rng(u64);

    impl Rng {
        fn new(seed: u64) -> Self {
            Self(seed)
        }

        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn next_f32(&mut self) -> f32 {
            let v = self.next_u64() >> 40;
            (v as f32) / ((1_u64 << 24) as f32)
        }

        fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
            lo + (hi - lo) * self.next_f32()
        }
    }

    fn unit_box(corner: Vec3) -> Aabb {
        Aabb::new(corner, corner + Vec3::ONE)
    }

    #[test]
    fn scenario_two_clusters() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let _near = tree.create_proxy(unit_box(Vec3::ZERO), 0);
        let _far = tree.create_proxy(unit_box(Vec3::splat(10.0)), 1);

        let mut hits = Vec::new();
        tree.query(
            Aabb::new(Vec3::splat(-1.0), Vec3::splat(2.0)),
            |_, payload| {
                hits.push(payload);
                true
            },
        );
        assert_eq!(hits, [0]);

        hits.clear();
        tree.query(
            Aabb::new(Vec3::splat(-1.0), Vec3::splat(12.0)),
            |_, payload| {
                hits.push(payload);
                true
            },
        );
        hits.sort_unstable();
        assert_eq!(hits, [0, 1]);
    }

    #[test]
    fn scenario_axis_ray() {
        let mut tree: AabbTree<u32> = AabbTree::with_margin(0.0);
        tree.create_proxy(Aabb::new(Vec3::splat(-1.0), Vec3::ONE), 7);

        let mut fraction = f32::NAN;
        let hit = tree.ray_cast(
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            |from, to, _, payload| {
                assert_eq!(payload, 7);
                // Recompute the exact entry fraction the tree already tested.
                fraction = Aabb::new(Vec3::splat(-1.0), Vec3::ONE)
                    .ray_cast(from, to, 1.0)
                    .expect("callback leaf must intersect");
                fraction
            },
        );
        assert!(hit);
        assert!((fraction - 0.4).abs() < 1e-6, "entry at x = -1 is t = 0.4");
    }

    #[test]
    fn hundred_proxies_stay_balanced() {
        let mut rng = Rng::new(0xC0FF_EE00_1234_5678);
        // Shuffled grid: random-looking, guaranteed non-overlapping.
        let mut corners = Vec::new();
        for x in 0..10 {
            for y in 0..10 {
                let jitter = rng.next_range(0.0, 0.8);
                corners.push(Vec3::new(x as f32 * 3.0, y as f32 * 3.0, jitter));
            }
        }
        for i in (1..corners.len()).rev() {
            let j = (rng.next_u64() % (i as u64 + 1)) as usize;
            corners.swap(i, j);
        }

        let mut tree: AabbTree<usize> = AabbTree::new();
        for (i, corner) in corners.iter().enumerate() {
            tree.create_proxy(unit_box(*corner), i);
        }
        tree.validate();
        // Loose balance bound: 2 * ceil(log2(100)) = 14.
        assert!(tree.height() <= 14, "height {} too large", tree.height());
    }

    #[test]
    fn query_visits_every_proxy_exactly_once() {
        let mut tree: AabbTree<usize> = AabbTree::new();
        for i in 0..37 {
            let corner = Vec3::new((i % 6) as f32 * 4.0, (i / 6) as f32 * 4.0, 0.0);
            tree.create_proxy(unit_box(corner), i);
        }

        let mut seen = Vec::new();
        let touched = tree.query(
            Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0)),
            |_, payload| {
                seen.push(payload);
                true
            },
        );
        assert!(touched);
        seen.sort_unstable();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn query_early_exit_stops_traversal() {
        let mut tree: AabbTree<usize> = AabbTree::new();
        for i in 0..16 {
            tree.create_proxy(unit_box(Vec3::new(i as f32 * 3.0, 0.0, 0.0)), i);
        }
        let mut visits = 0;
        let touched = tree.query(
            Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0)),
            |_, _| {
                visits += 1;
                false
            },
        );
        assert!(touched, "early exit still reports the overlap");
        assert_eq!(visits, 1);
    }

    #[test]
    fn update_inside_fat_bounds_is_a_noop() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let a = tree.create_proxy(unit_box(Vec3::ZERO), 0);
        let _b = tree.create_proxy(unit_box(Vec3::splat(5.0)), 1);
        assert!(tree.moved(a));
        tree.clear_moved(a);

        let count = tree.node_count();
        let bounds = tree.bounds(a);

        // Jitter well inside the default 0.5 margin.
        let moved = tree.update_proxy(a, Aabb::new(Vec3::splat(0.2), Vec3::splat(1.2)));
        assert!(!moved);
        assert_eq!(tree.node_count(), count);
        assert_eq!(tree.bounds(a), bounds);
        assert!(!tree.moved(a), "no-op update must not set the moved flag");

        // A real move reinserts and flags.
        let moved = tree.update_proxy(a, unit_box(Vec3::splat(20.0)));
        assert!(moved);
        assert!(tree.moved(a));
        tree.validate();
    }

    #[test]
    fn destroy_then_create_reuses_the_pool() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let proxies: Vec<_> = (0..8)
            .map(|i| tree.create_proxy(unit_box(Vec3::new(i as f32 * 3.0, 0.0, 0.0)), i))
            .collect();
        let capacity = tree.capacity();

        tree.destroy_proxy(proxies[3]);
        tree.validate();
        let replacement = tree.create_proxy(unit_box(Vec3::new(40.0, 0.0, 0.0)), 99);
        tree.validate();

        assert_eq!(tree.capacity(), capacity, "pool must not grow");
        assert_eq!(tree.payload(replacement), 99);
    }

    #[test]
    fn destroying_the_last_proxy_empties_the_tree() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let only = tree.create_proxy(unit_box(Vec3::ZERO), 0);
        assert!(!tree.is_empty());
        tree.destroy_proxy(only);
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
        tree.validate();
        assert!(!tree.overlaps(Aabb::new(Vec3::splat(-10.0), Vec3::splat(10.0))));
        assert!(!tree.ray_cast_any(Vec3::splat(-1.0), Vec3::splat(1.0)));
    }

    #[test]
    #[should_panic(expected = "stale or never-issued proxy")]
    fn stale_proxy_fails_fast() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let a = tree.create_proxy(unit_box(Vec3::ZERO), 0);
        let _keep = tree.create_proxy(unit_box(Vec3::splat(5.0)), 1);
        tree.destroy_proxy(a);
        tree.destroy_proxy(a);
    }

    #[test]
    fn invariants_hold_under_random_churn() {
        let mut rng = Rng::new(0xDEAD_BEEF_0BAD_F00D);
        let mut tree: AabbTree<u64> = AabbTree::new();
        let mut live: Vec<Proxy> = Vec::new();
        let mut next_payload = 0_u64;

        for _ in 0..400 {
            let roll = rng.next_u64() % 100;
            if live.is_empty() || roll < 45 {
                let corner = Vec3::new(
                    rng.next_range(-50.0, 50.0),
                    rng.next_range(-50.0, 50.0),
                    rng.next_range(-50.0, 50.0),
                );
                let size = Vec3::new(
                    rng.next_range(0.1, 4.0),
                    rng.next_range(0.1, 4.0),
                    rng.next_range(0.1, 4.0),
                );
                live.push(tree.create_proxy(Aabb::new(corner, corner + size), next_payload));
                next_payload += 1;
            } else if roll < 75 {
                let which = (rng.next_u64() as usize) % live.len();
                let corner = Vec3::new(
                    rng.next_range(-50.0, 50.0),
                    rng.next_range(-50.0, 50.0),
                    rng.next_range(-50.0, 50.0),
                );
                tree.update_proxy(live[which], unit_box(corner));
            } else {
                let which = (rng.next_u64() as usize) % live.len();
                tree.destroy_proxy(live.swap_remove(which));
            }
            tree.validate();
        }
        assert!(!live.is_empty(), "churn mix must leave survivors");
    }

    #[test]
    fn ray_cast_matches_brute_force_at_zero_margin() {
        let mut rng = Rng::new(0x5EED_5EED_5EED_5EED);
        let mut tree: AabbTree<usize> = AabbTree::with_margin(0.0);
        let mut boxes = Vec::new();
        for i in 0..64 {
            let corner = Vec3::new(
                rng.next_range(-20.0, 20.0),
                rng.next_range(-20.0, 20.0),
                rng.next_range(-20.0, 20.0),
            );
            let size = Vec3::new(
                rng.next_range(0.2, 3.0),
                rng.next_range(0.2, 3.0),
                rng.next_range(0.2, 3.0),
            );
            let bounds = Aabb::new(corner, corner + size);
            tree.create_proxy(bounds, i);
            boxes.push(bounds);
        }

        for _ in 0..128 {
            let from = Vec3::new(
                rng.next_range(-30.0, 30.0),
                rng.next_range(-30.0, 30.0),
                rng.next_range(-30.0, 30.0),
            );
            let to = Vec3::new(
                rng.next_range(-30.0, 30.0),
                rng.next_range(-30.0, 30.0),
                rng.next_range(-30.0, 30.0),
            );

            let mut from_tree = Vec::new();
            // Rejecting every hit keeps the clip fraction at 1.0, so the
            // traversal enumerates every entered leaf.
            tree.ray_cast(from, to, |_, _, _, payload| {
                from_tree.push(payload);
                -1.0
            });
            from_tree.sort_unstable();

            let mut brute: Vec<usize> = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.ray_cast(from, to, 1.0).is_some())
                .map(|(i, _)| i)
                .collect();
            brute.sort_unstable();

            assert_eq!(from_tree, brute, "ray {from:?} -> {to:?}");
        }
    }

    #[test]
    fn ray_cast_clipping_prunes_farther_leaves() {
        let mut tree: AabbTree<u32> = AabbTree::with_margin(0.0);
        // Three boxes along +x, progressively farther.
        tree.create_proxy(Aabb::new(Vec3::new(2.0, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0)), 0);
        tree.create_proxy(Aabb::new(Vec3::new(5.0, -1.0, -1.0), Vec3::new(6.0, 1.0, 1.0)), 1);
        tree.create_proxy(Aabb::new(Vec3::new(8.0, -1.0, -1.0), Vec3::new(9.0, 1.0, 1.0)), 2);

        let from = Vec3::new(0.0, 0.0, 0.0);
        let to = Vec3::new(10.0, 0.0, 0.0);

        let mut nearest = f32::MAX;
        let mut nearest_payload = u32::MAX;
        let hit = tree.ray_cast(from, to, |f, t, _, payload| {
            let entry = tree_entry(f, t, payload);
            if entry < nearest {
                nearest = entry;
                nearest_payload = payload;
            }
            entry
        });
        assert!(hit);
        assert_eq!(nearest_payload, 0);
        assert!((nearest - 0.2).abs() < 1e-6, "first box entered at x = 2");

        fn tree_entry(from: Vec3, to: Vec3, payload: u32) -> f32 {
            let x0 = [2.0, 5.0, 8.0][payload as usize];
            let b = Aabb::new(Vec3::new(x0, -1.0, -1.0), Vec3::new(x0 + 1.0, 1.0, 1.0));
            b.ray_cast(from, to, 1.0).expect("callback leaf must intersect")
        }
    }

    #[test]
    fn moved_flag_tracks_consumption() {
        let mut tree: AabbTree<u32> = AabbTree::new();
        let a = tree.create_proxy(unit_box(Vec3::ZERO), 0);
        assert!(tree.moved(a), "fresh proxies start moved");
        tree.clear_moved(a);
        assert!(!tree.moved(a));
        tree.update_proxy(a, unit_box(Vec3::splat(30.0)));
        assert!(tree.moved(a));
    }
}
