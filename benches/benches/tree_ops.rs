// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_tree::{Aabb, AabbTree};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::Vec3;

#[derive(Clone)]
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
        (v as f32) / ((1u64 << 24) as f32)
    }
    fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
    fn next_vec3(&mut self, lo: f32, hi: f32) -> Vec3 {
        Vec3::new(
            self.next_range(lo, hi),
            self.next_range(lo, hi),
            self.next_range(lo, hi),
        )
    }
}

fn gen_random_boxes(count: usize, world: f32, size: f32) -> Vec<Aabb> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let corner = rng.next_vec3(0.0, world);
            Aabb::new(corner, corner + Vec3::splat(size))
        })
        .collect()
}

fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: f32) -> Vec<Aabb> {
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let centers: Vec<Vec3> = (0..n_clusters).map(|_| rng.next_vec3(0.0, 500.0)).collect();
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    for c in centers {
        for _ in 0..per_cluster {
            let corner = c + rng.next_vec3(-0.5, 0.5) * spread;
            out.push(Aabb::new(corner, corner + Vec3::splat(2.0)));
        }
    }
    out
}

fn build_tree(boxes: &[Aabb]) -> AabbTree<u32> {
    let mut tree = AabbTree::new();
    for (i, b) in boxes.iter().enumerate() {
        tree.create_proxy(*b, i as u32);
    }
    tree
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[256usize, 1024, 4096] {
        let boxes = gen_random_boxes(n, 500.0, 4.0);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("insert_n{}", n), |b| {
            b.iter_batched(
                AabbTree::<u32>::new,
                |mut tree| {
                    for (i, bx) in boxes.iter().enumerate() {
                        tree.create_proxy(*bx, i as u32);
                    }
                    black_box(tree.height());
                },
                BatchSize::SmallInput,
            )
        });
    }
    let boxes = gen_clustered_boxes(16, 256, 64.0);
    group.bench_function("insert_clustered", |b| {
        b.iter_batched(
            AabbTree::<u32>::new,
            |mut tree| {
                for (i, bx) in boxes.iter().enumerate() {
                    tree.create_proxy(*bx, i as u32);
                }
                black_box(tree.height());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_update_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_churn");
    let boxes = gen_random_boxes(1024, 500.0, 4.0);
    group.throughput(Throughput::Elements(1024));
    group.bench_function("jitter_half_in_half_out", |b| {
        b.iter_batched(
            || {
                let mut tree = AabbTree::new();
                let proxies: Vec<_> = boxes
                    .iter()
                    .enumerate()
                    .map(|(i, bx)| tree.create_proxy(*bx, i as u32))
                    .collect();
                (tree, proxies, Rng::new(0xBADC_F00D_1234_5678))
            },
            |(mut tree, proxies, mut rng)| {
                let mut moved = 0usize;
                for (i, bx) in boxes.iter().enumerate() {
                    // Every other box jumps outside its fat margin.
                    let offset = if i % 2 == 0 {
                        Vec3::splat(rng.next_range(0.0, 0.3))
                    } else {
                        Vec3::splat(rng.next_range(2.0, 8.0))
                    };
                    let shifted = Aabb::new(bx.min + offset, bx.max + offset);
                    if tree.update_proxy(proxies[i], shifted) {
                        moved += 1;
                    }
                }
                black_box(moved);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let boxes = gen_random_boxes(4096, 500.0, 4.0);
    let tree = build_tree(&boxes);

    group.bench_function("tree_256_regions", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for q in 0..256 {
                let x = (q % 16) as f32 * 30.0;
                let y = (q / 16) as f32 * 30.0;
                let region = Aabb::new(Vec3::new(x, y, 0.0), Vec3::new(x + 50.0, y + 50.0, 500.0));
                tree.query(region, |_, _| {
                    total += 1;
                    true
                });
            }
            black_box(total);
        })
    });

    group.bench_function("brute_256_regions", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for q in 0..256 {
                let x = (q % 16) as f32 * 30.0;
                let y = (q / 16) as f32 * 30.0;
                let region = Aabb::new(Vec3::new(x, y, 0.0), Vec3::new(x + 50.0, y + 50.0, 500.0));
                total += boxes.iter().filter(|bx| bx.intersects(&region)).count();
            }
            black_box(total);
        })
    });
    group.finish();
}

fn bench_ray_cast(c: &mut Criterion) {
    let mut group = c.benchmark_group("ray_cast");
    let boxes = gen_random_boxes(4096, 500.0, 4.0);
    let tree = build_tree(&boxes);
    let mut rng = Rng::new(0x5EED_5EED_5EED_5EED);
    let rays: Vec<(Vec3, Vec3)> = (0..256)
        .map(|_| (rng.next_vec3(0.0, 500.0), rng.next_vec3(0.0, 500.0)))
        .collect();

    group.throughput(Throughput::Elements(rays.len() as u64));
    group.bench_function("any_hit", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for &(from, to) in &rays {
                if tree.ray_cast_any(from, to) {
                    hits += 1;
                }
            }
            black_box(hits);
        })
    });

    group.bench_function("enumerate_all", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for &(from, to) in &rays {
                tree.ray_cast(from, to, |_, _, _, _| {
                    hits += 1;
                    -1.0
                });
            }
            black_box(hits);
        })
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let boxes = gen_random_boxes(4096, 500.0, 4.0);
    let tree = build_tree(&boxes);
    group.bench_function("export_4096", |b| {
        b.iter(|| {
            let snap = tree.snapshot(0.25);
            black_box(snap.records.len());
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_update_churn,
    bench_query,
    bench_ray_cast,
    bench_snapshot,
);
criterion_main!(benches);
