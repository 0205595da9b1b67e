// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Tree: a dynamic 3D AABB tree (incremental BVH).
//!
//! Canopy Tree is a reusable spatial index over a set of moving or resizable
//! objects.
//!
//! - Register, move, and deregister objects incrementally — no global
//!   rebuild. Leaf bounds are fattened by a fixed margin so small movement
//!   never restructures the tree.
//! - Placement uses a surface-area cost heuristic; single AVL-style
//!   rotations keep the tree height-balanced after every change.
//! - Query by region overlap or by ray/segment cast, both with
//!   callback-driven early exit and iterative (explicit-stack) traversal.
//! - Export the live tree as fixed-stride [`NodeRecord`]s plus a root index
//!   for an external consumer, typically a GPU compute pass doing its own
//!   traversal.
//!
//! All node links are indices into one growable arena with an intrusive
//! free list; handles ([`Proxy`]) are plain indices, and trees are ordinary
//! owned values — create as many independent instances as you need.
//!
//! # Example
//!
//! ```rust
//! use canopy_tree::{Aabb, AabbTree};
//! use glam::Vec3;
//!
//! let mut tree: AabbTree<u32> = AabbTree::new();
//! let a = tree.create_proxy(Aabb::new(Vec3::ZERO, Vec3::ONE), 1);
//! let _b = tree.create_proxy(Aabb::new(Vec3::splat(10.0), Vec3::splat(11.0)), 2);
//!
//! // Region query with an early-exit visitor.
//! let mut seen = Vec::new();
//! tree.query(Aabb::new(Vec3::splat(-1.0), Vec3::splat(2.0)), |_, payload| {
//!     seen.push(payload);
//!     true
//! });
//! assert_eq!(seen, vec![1]);
//!
//! // Segment cast through the field.
//! assert!(tree.ray_cast_any(Vec3::new(-5.0, 0.5, 0.5), Vec3::new(5.0, 0.5, 0.5)));
//!
//! // Movement inside the fat margin is absorbed without touching the tree.
//! let restructured = tree.update_proxy(a, Aabb::new(Vec3::splat(0.1), Vec3::splat(1.1)));
//! assert!(!restructured);
//! ```
//!
//! Snapshots flatten the arena for an external renderer:
//!
//! ```rust
//! use canopy_tree::{Aabb, AabbTree, NodeRecord};
//! use glam::Vec3;
//!
//! let mut tree: AabbTree<u32> = AabbTree::new();
//! tree.create_proxy(Aabb::new(Vec3::ZERO, Vec3::ONE), 1);
//!
//! let snap = tree.snapshot(0.0);
//! assert_eq!(NodeRecord::STRIDE, 32);
//! assert!(snap.root >= 0);
//! assert_eq!(snap.as_bytes().len(), snap.records.len() * NodeRecord::STRIDE);
//! ```
//!
//! ## Contract notes
//!
//! - Mutation is externally serialized: all mutating operations take
//!   `&mut self`, and traversal callbacks receive no way to mutate the tree
//!   being walked. Each traversal allocates its own small work stack, so
//!   nested queries on the same tree are fine.
//! - Using a destroyed [`Proxy`] is a contract violation; it panics where
//!   detectable rather than being silently ignored.
//! - Coordinates are assumed finite. Degenerate (zero or inverted) boxes
//!   are valid inputs; NaNs are not.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod snapshot;
pub mod tree;
pub mod types;

pub use snapshot::{NodeRecord, Snapshot};
pub use tree::{AabbTree, DEFAULT_MARGIN, Proxy};
pub use types::{Aabb, find_orthogonal};
