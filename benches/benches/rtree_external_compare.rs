// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_rtree::{Aabb3D, Keyed, OverflowPolicy, SpatialIndex};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

type Item = Keyed<u32, f64>;

fn gen_grid_boxes(n: usize, cell: f64) -> Vec<Aabb3D<f64>> {
    let mut out = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                out.push(Aabb3D::<f64>::from_xyzwhd(
                    x as f64 * cell,
                    y as f64 * cell,
                    z as f64 * cell,
                    cell,
                    cell,
                    cell,
                ));
            }
        }
    }
    out
}

fn to_items(v: &[Aabb3D<f64>]) -> Vec<Item> {
    v.iter()
        .enumerate()
        .map(|(i, b)| Keyed::new(i as u32, *b))
        .collect()
}

fn to_rstar_rects(v: &[Aabb3D<f64>]) -> Vec<Rectangle<[f64; 3]>> {
    v.iter()
        .map(|b| Rectangle::from_corners([b.min_x, b.min_y, b.min_z], [b.max_x, b.max_y, b.max_z]))
        .collect()
}

fn bench_rtree_external_compare_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare_f64");
    for &n in &[16usize, 24] {
        let boxes = gen_grid_boxes(n, 10.0);
        let items = to_items(&boxes);
        let query = Aabb3D::<f64>::from_xyzwhd(40.0, 40.0, 40.0, 80.0, 80.0, 80.0);
        group.throughput(Throughput::Elements(boxes.len() as u64));

        for policy in [OverflowPolicy::Guttman, OverflowPolicy::RStar] {
            group.bench_function(format!("understory_{policy:?}_build_query_n{}", n), |b| {
                b.iter_batched(
                    || SpatialIndex::<f64, Item>::with_policy(policy),
                    |mut idx| {
                        idx.add_all(items.iter().copied());
                        let hits: usize = idx.find_overlap(&query).count();
                        black_box(hits);
                    },
                    BatchSize::SmallInput,
                )
            });
        }

        group.bench_function(format!("rstar_build_query_incremental_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&boxes),
                |rectangles| {
                    let mut tree = RTree::new();
                    for r in rectangles {
                        tree.insert(r);
                    }
                    let aabb = AABB::from_corners(
                        [query.min_x, query.min_y, query.min_z],
                        [query.max_x, query.max_y, query.max_z],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&boxes),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [query.min_x, query.min_y, query.min_z],
                        [query.max_x, query.max_y, query.max_z],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare_f64);
criterion_main!(benches);
