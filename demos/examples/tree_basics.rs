// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree basics.
//!
//! Build a small tree, move a proxy, query a region, and cast a ray.
//!
//! Run:
//! - `cargo run -p canopy_demos --example tree_basics`

use canopy_tree::{Aabb, AabbTree};
use glam::Vec3;

fn main() {
    let mut tree: AabbTree<&str> = AabbTree::new();

    let crate_box = tree.create_proxy(Aabb::new(Vec3::ZERO, Vec3::ONE), "crate");
    let _barrel = tree.create_proxy(
        Aabb::new(Vec3::new(4.0, 0.0, 0.0), Vec3::new(5.0, 2.0, 1.0)),
        "barrel",
    );
    let _crane = tree.create_proxy(
        Aabb::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(2.0, 14.0, 2.0)),
        "crane",
    );
    println!("{tree:?}");

    // Nudging a proxy inside its fat margin leaves the tree untouched.
    let restructured = tree.update_proxy(
        crate_box,
        Aabb::new(Vec3::splat(0.2), Vec3::splat(1.2)),
    );
    println!("small nudge restructured: {restructured}");

    // Everything near the ground plane.
    let mut near_ground = Vec::new();
    tree.query(
        Aabb::new(Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 3.0, 10.0)),
        |_, name| {
            near_ground.push(name);
            true
        },
    );
    near_ground.sort_unstable();
    println!("near ground: {near_ground:?}");
    assert_eq!(near_ground, ["barrel", "crate"]);

    // A ray down the x axis reports the first thing it enters.
    let from = Vec3::new(-10.0, 0.5, 0.5);
    let to = Vec3::new(10.0, 0.5, 0.5);
    let mut first = ("", f32::MAX);
    tree.ray_cast(from, to, |f, t, proxy, name| {
        let entry = tree
            .bounds(proxy)
            .ray_cast(f, t, 1.0)
            .expect("callback leaves intersect the segment");
        if entry < first.1 {
            first = (name, entry);
        }
        entry
    });
    println!("ray hit {:?} at fraction {}", first.0, first.1);
    assert_eq!(first.0, "crate");

    // Snapshot for an external consumer.
    let snap = tree.snapshot(0.0);
    println!(
        "snapshot: {} records ({} bytes), root {}",
        snap.records.len(),
        snap.as_bytes().len(),
        snap.root
    );
}
