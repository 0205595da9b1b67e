// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flattened tree export for an external (typically GPU) consumer.

use alloc::vec::Vec;
use bytemuck::{Pod, Zeroable};

use crate::tree::{AabbTree, NULL};

/// One exported tree node, laid out as two GPU `float4` registers.
///
/// The byte layout is the upload contract with the consuming shader:
/// 32 bytes per record, bounds corners interleaved with child indices.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct NodeRecord {
    /// Bounds minimum corner.
    pub min: [f32; 3],
    /// First child's record index; `-1` on leaves.
    pub child_a: i32,
    /// Bounds maximum corner.
    pub max: [f32; 3],
    /// Second child's record index; `-1` on leaves.
    pub child_b: i32,
}

impl NodeRecord {
    /// Byte stride of one record in an exported buffer.
    pub const STRIDE: usize = core::mem::size_of::<Self>();

    /// Whether this record is a leaf (no children).
    pub fn is_leaf(&self) -> bool {
        self.child_a < 0
    }
}

/// A flattened copy of the tree produced by [`AabbTree::snapshot`].
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// One record per node slot, ordered by node index. Dead slots are
    /// zeroed so consumers can index records by node id without remapping.
    pub records: Vec<NodeRecord>,
    /// Index of the root record; `-1` when the tree is empty.
    pub root: i32,
}

impl Snapshot {
    /// The record buffer as raw bytes, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }
}

fn signed(index: u32) -> i32 {
    if index == NULL { -1 } else { index as i32 }
}

impl<P: Copy> AabbTree<P> {
    /// Flatten the live nodes into fixed-stride records plus the root index.
    ///
    /// `tighten` is subtracted from each leaf's fat bounds (clamped at the
    /// box center), letting the consumer see bounds closer to the tight
    /// object bounds than the structural fat margin. Internal bounds are
    /// exported as stored, so a top-down traversal of the records stays
    /// conservative. Records for free slots are zeroed.
    pub fn snapshot(&self, tighten: f32) -> Snapshot {
        let mut records = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.height < 0 {
                records.push(NodeRecord::zeroed());
                continue;
            }
            let bounds = if node.is_leaf() {
                node.bounds.shrunk(tighten)
            } else {
                node.bounds
            };
            records.push(NodeRecord {
                min: bounds.min.to_array(),
                child_a: signed(node.child_a),
                max: bounds.max.to_array(),
                child_b: signed(node.child_b),
            });
        }
        Snapshot {
            records,
            root: signed(self.root),
        }
    }
}
