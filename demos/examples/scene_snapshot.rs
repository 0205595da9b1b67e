// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene snapshot.
//!
//! Register a few ray-marched shapes, run the per-frame sync, and export
//! the two GPU buffers a ray marcher consumes.
//!
//! Run:
//! - `cargo run -p canopy_demos --example scene_snapshot`

use canopy_scene::{BlendOp, QueryFilter, Scene, Shape, ShapeRecord};
use canopy_tree::NodeRecord;
use glam::{Quat, Vec3};

fn main() {
    let mut scene = Scene::new();

    let ball = scene.insert(
        Shape::Sphere {
            center: Vec3::new(0.0, 1.0, 0.0),
            radius: 1.0,
        },
        BlendOp::Union,
    );
    scene.insert(
        Shape::Box {
            center: Vec3::new(0.0, -0.25, 0.0),
            half_extents: Vec3::new(4.0, 0.25, 4.0),
            rotation: Quat::IDENTITY,
            corner_radius: 0.05,
        },
        BlendOp::Union,
    );
    scene.insert(
        Shape::Capsule {
            a: Vec3::new(2.0, 0.0, 0.0),
            b: Vec3::new(2.0, 2.0, 0.0),
            radius: 0.4,
        },
        BlendOp::Subtract,
    );

    // Frame 1: everything is new, so everything counts as moved.
    let moved = scene.sync();
    println!("frame 1: {moved} leaves moved");

    // Frame 2: a small bounce stays inside the fat margins.
    scene.set_shape(
        ball,
        Shape::Sphere {
            center: Vec3::new(0.0, 1.2, 0.0),
            radius: 1.0,
        },
    );
    let moved = scene.sync();
    println!("frame 2: {moved} leaves moved");
    assert_eq!(moved, 0, "a 0.2 bounce fits the 0.5 fat margin");

    // Upload buffers: shape parameters and the bounds tree.
    let shapes = scene.shape_records();
    let bounds = scene.bounds_snapshot(0.1);
    println!(
        "shape buffer: {} records x {} bytes",
        shapes.len(),
        ShapeRecord::STRIDE
    );
    println!(
        "bounds buffer: {} records x {} bytes, root {}",
        bounds.records.len(),
        NodeRecord::STRIDE,
        bounds.root
    );

    // Editor-style picking ray.
    let picked = scene.ray_cast_any(
        Vec3::new(-10.0, 1.0, 0.0),
        Vec3::new(10.0, 1.0, 0.0),
        QueryFilter {
            pickable_only: true,
            ..Default::default()
        },
    );
    println!("picking ray hit something: {picked}");
    assert!(picked);
}
