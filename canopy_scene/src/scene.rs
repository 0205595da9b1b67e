// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shape registry: generational handles, tree synchronization, exports.

use alloc::vec::Vec;
use canopy_tree::{Aabb, AabbTree, Proxy, Snapshot};
use glam::Vec3;

use crate::shape::{BlendOp, Shape, ShapeRecord};

/// Identifier for a shape in a [`Scene`].
///
/// A small, copyable handle made of a slot index and a generation counter.
/// Removing a shape frees its slot; a later insert may reuse the slot with a
/// higher generation, so stale ids never alias a live shape. Operations on a
/// stale id are silent no-ops.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ShapeId(u32, u32);

impl ShapeId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Shape flags controlling export and query participation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u8 {
        /// Exported to the shape buffer and seen by region queries.
        const VISIBLE  = 0b0000_0001;
        /// Seen by ray casts.
        const PICKABLE = 0b0000_0010;
    }
}

impl Default for ShapeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::PICKABLE
    }
}

/// Filters applied during [`Scene::query`] and [`Scene::ray_cast`].
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// If true, only consider shapes marked [`ShapeFlags::VISIBLE`].
    pub visible_only: bool,
    /// If true, only consider shapes marked [`ShapeFlags::PICKABLE`].
    pub pickable_only: bool,
}

impl QueryFilter {
    fn admits(self, flags: ShapeFlags) -> bool {
        if self.visible_only && !flags.contains(ShapeFlags::VISIBLE) {
            return false;
        }
        if self.pickable_only && !flags.contains(ShapeFlags::PICKABLE) {
            return false;
        }
        true
    }
}

#[derive(Clone, Debug)]
struct Entry {
    shape: Shape,
    op: BlendOp,
    flags: ShapeFlags,
    proxy: Proxy,
    /// Bounds changed since the last [`Scene::sync`].
    dirty: bool,
}

/// A registry of ray-marched shapes backed by an [`AabbTree`].
///
/// The scene owns the tree. Shape mutations mark entries dirty;
/// [`Scene::sync`] flushes dirty bounds into the tree once per frame, and
/// the export methods produce the two GPU buffers a ray marcher consumes:
/// the shape parameters ([`Scene::shape_records`]) and the tree snapshot
/// ([`Scene::bounds_snapshot`]).
pub struct Scene {
    entries: Vec<Option<Entry>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    tree: AabbTree<ShapeId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("slots", &self.entries.len())
            .field("alive", &self.len())
            .field("free", &self.free_list.len())
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Create an empty scene with the tree's default fat margin.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            tree: AabbTree::new(),
        }
    }

    /// Create an empty scene with an explicit tree fat margin.
    pub fn with_margin(margin: f32) -> Self {
        Self {
            tree: AabbTree::with_margin(margin),
            ..Self::new()
        }
    }

    /// Number of live shapes.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    /// True when no shapes are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying spatial tree, for diagnostics.
    pub fn tree(&self) -> &AabbTree<ShapeId> {
        &self.tree
    }

    /// Whether `id` still refers to a live shape.
    pub fn is_alive(&self, id: ShapeId) -> bool {
        self.entry(id).is_some()
    }

    /// Register a shape. Its bounds enter the tree immediately.
    pub fn insert(&mut self, shape: Shape, op: BlendOp) -> ShapeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generations[idx] += 1;
            idx
        } else {
            self.entries.push(None);
            self.generations.push(1);
            self.entries.len() - 1
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "shape ids use 32-bit slot indices by design"
        )]
        let id = ShapeId::new(idx as u32, self.generations[idx]);
        let proxy = self.tree.create_proxy(shape.bounds(), id);
        self.entries[idx] = Some(Entry {
            shape,
            op,
            flags: ShapeFlags::default(),
            proxy,
            dirty: false,
        });
        id
    }

    /// Deregister a shape. Stale ids are ignored.
    pub fn remove(&mut self, id: ShapeId) {
        if self.entry(id).is_none() {
            return;
        }
        let entry = self.entries[id.idx()].take().expect("entry checked alive");
        self.tree.destroy_proxy(entry.proxy);
        self.free_list.push(id.idx());
    }

    /// Replace a shape's geometry. The tree is updated on the next
    /// [`Scene::sync`].
    pub fn set_shape(&mut self, id: ShapeId, shape: Shape) {
        if let Some(entry) = self.entry_mut(id) {
            entry.shape = shape;
            entry.dirty = true;
        }
    }

    /// Change a shape's blend operator. No geometry change.
    pub fn set_blend_op(&mut self, id: ShapeId, op: BlendOp) {
        if let Some(entry) = self.entry_mut(id) {
            entry.op = op;
        }
    }

    /// Change a shape's flags. No geometry change.
    pub fn set_flags(&mut self, id: ShapeId, flags: ShapeFlags) {
        if let Some(entry) = self.entry_mut(id) {
            entry.flags = flags;
        }
    }

    /// The shape stored under `id`.
    pub fn shape(&self, id: ShapeId) -> Option<Shape> {
        self.entry(id).map(|e| e.shape)
    }

    /// The blend operator stored under `id`.
    pub fn blend_op(&self, id: ShapeId) -> Option<BlendOp> {
        self.entry(id).map(|e| e.op)
    }

    /// The flags stored under `id`.
    pub fn flags(&self, id: ShapeId) -> Option<ShapeFlags> {
        self.entry(id).map(|e| e.flags)
    }

    /// Flush dirty shape bounds into the tree.
    ///
    /// Returns how many tree leaves actually moved since the previous sync,
    /// consuming the tree's per-leaf `moved` flags. Freshly inserted shapes
    /// count as moved once. Shapes whose new bounds still fit their fat
    /// leaf bounds do not restructure the tree and do not count.
    pub fn sync(&mut self) -> usize {
        let mut moved = 0;
        for slot in 0..self.entries.len() {
            let Some(entry) = self.entries[slot].as_mut() else {
                continue;
            };
            let proxy = entry.proxy;
            let shape = entry.shape;
            let dirty = core::mem::take(&mut entry.dirty);
            if dirty {
                self.tree.update_proxy(proxy, shape.bounds());
            }
            if self.tree.moved(proxy) {
                self.tree.clear_moved(proxy);
                moved += 1;
            }
        }
        moved
    }

    /// Encode every live, visible shape for GPU upload, in slot order.
    pub fn shape_records(&self) -> Vec<ShapeRecord> {
        let mut out = Vec::with_capacity(self.len());
        for entry in self.entries.iter().flatten() {
            if entry.flags.contains(ShapeFlags::VISIBLE) {
                out.push(entry.shape.record(entry.op));
            }
        }
        out
    }

    /// Snapshot the bounds tree for GPU upload.
    ///
    /// `tighten` is subtracted from the leaf fat margin; a ray marcher
    /// typically passes its blend distance here so leaf bounds hug the
    /// shapes as closely as the blend allows.
    pub fn bounds_snapshot(&self, tighten: f32) -> Snapshot {
        self.tree.snapshot(tighten)
    }

    /// Visit every shape whose fat bounds overlap `bounds`, subject to
    /// `filter`. `visit` returning `false` stops the traversal.
    ///
    /// Returns whether any leaf overlapped the region — including leaves
    /// the filter rejected, matching the tree's contract.
    pub fn query<F>(&self, bounds: Aabb, filter: QueryFilter, mut visit: F) -> bool
    where
        F: FnMut(ShapeId) -> bool,
    {
        self.tree.query(bounds, |_, id| match self.entry(id) {
            Some(entry) if filter.admits(entry.flags) => visit(id),
            _ => true,
        })
    }

    /// Cast the segment `from -> to` through the scene, subject to `filter`.
    ///
    /// `hit(from, to, id)` follows the tree's clipping contract: return a
    /// negative value to reject the hit, or the new clip fraction to accept
    /// it. Returns whether any leaf bounds were entered.
    pub fn ray_cast<F>(&self, from: Vec3, to: Vec3, filter: QueryFilter, mut hit: F) -> bool
    where
        F: FnMut(Vec3, Vec3, ShapeId) -> f32,
    {
        self.tree
            .ray_cast(from, to, |f, t, _, id| match self.entry(id) {
                Some(entry) if filter.admits(entry.flags) => hit(f, t, id),
                _ => -1.0,
            })
    }

    /// Whether the segment `from -> to` enters any shape admitted by
    /// `filter`.
    pub fn ray_cast_any(&self, from: Vec3, to: Vec3, filter: QueryFilter) -> bool {
        let mut found = false;
        self.ray_cast(from, to, filter, |_, _, _| {
            found = true;
            0.0
        });
        found
    }

    // --- internals ---

    fn entry(&self, id: ShapeId) -> Option<&Entry> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.entries[id.idx()].as_ref()
    }

    fn entry_mut(&mut self, id: ShapeId) -> Option<&mut Entry> {
        if self.generations.get(id.idx()) != Some(&id.1) {
            return None;
        }
        self.entries[id.idx()].as_mut()
    }
}
