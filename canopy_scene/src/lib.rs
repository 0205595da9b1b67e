// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: a ray-marched shape registry over [`canopy_tree`].
//!
//! Canopy Scene is the bookkeeping layer between gameplay code that owns
//! shapes and a GPU ray marcher that consumes buffers.
//!
//! - Shapes are tagged variants ([`Shape`]) — sphere, oriented box, capsule,
//!   cylinder — with pure per-variant bounds and GPU encodings; there is no
//!   dispatch hierarchy to subclass.
//! - Each shape gets a generational [`ShapeId`]; stale ids are harmless.
//! - Mutations mark entries dirty; one [`Scene::sync`] per frame flushes
//!   bounds into the spatial tree, which absorbs small movement in its fat
//!   margins.
//! - [`Scene::shape_records`] and [`Scene::bounds_snapshot`] produce the two
//!   fixed-stride buffers a shader needs: shape parameters and the AABB tree
//!   for bounded traversal.
//!
//! # Example
//!
//! ```rust
//! use canopy_scene::{BlendOp, QueryFilter, Scene, Shape};
//! use glam::Vec3;
//!
//! let mut scene = Scene::new();
//! let ball = scene.insert(
//!     Shape::Sphere { center: Vec3::ZERO, radius: 1.0 },
//!     BlendOp::Union,
//! );
//! let _hole = scene.insert(
//!     Shape::Sphere { center: Vec3::new(0.5, 0.0, 0.0), radius: 0.5 },
//!     BlendOp::Subtract,
//! );
//!
//! // Per frame: move things, then sync once.
//! scene.set_shape(ball, Shape::Sphere { center: Vec3::new(0.2, 0.0, 0.0), radius: 1.0 });
//! let moved = scene.sync();
//! assert!(moved <= 2);
//!
//! // Upload buffers.
//! let shapes = scene.shape_records();
//! let bounds = scene.bounds_snapshot(0.0);
//! assert_eq!(shapes.len(), 2);
//! assert!(bounds.root >= 0);
//!
//! // Pick whatever the camera ray enters first.
//! let hit = scene.ray_cast_any(
//!     Vec3::new(-5.0, 0.0, 0.0),
//!     Vec3::new(5.0, 0.0, 0.0),
//!     QueryFilter { pickable_only: true, ..Default::default() },
//! );
//! assert!(hit);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod scene;
pub mod shape;

pub use scene::{QueryFilter, Scene, ShapeFlags, ShapeId};
pub use shape::{BlendOp, Shape, ShapeRecord};
