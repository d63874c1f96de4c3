// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_rtree::{Aabb3D, Config, Keyed, OverflowPolicy, SpatialIndex};

type Item = Keyed<u32, f64>;

const POLICIES: [OverflowPolicy; 2] = [OverflowPolicy::Guttman, OverflowPolicy::RStar];

fn gen_grid_boxes(n: usize, cell: f64) -> Vec<Item> {
    let mut out = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let key = out.len() as u32;
                out.push(Keyed::new(
                    key,
                    Aabb3D::<f64>::from_xyzwhd(
                        x as f64 * cell,
                        y as f64 * cell,
                        z as f64 * cell,
                        cell,
                        cell,
                        cell,
                    ),
                ));
            }
        }
    }
    out
}

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
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// `count` small boxes scattered around `clusters` centers inside a `span`-sized cube.
fn gen_clustered_boxes(count: usize, clusters: usize, span: f64, spread: f64) -> Vec<Item> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    let centers: Vec<[f64; 3]> = (0..clusters)
        .map(|_| [rng.next_f64() * span, rng.next_f64() * span, rng.next_f64() * span])
        .collect();
    (0..count)
        .map(|i| {
            let c = centers[i % clusters];
            let mut jitter = || (rng.next_f64() - 0.5) * spread;
            let (dx, dy, dz) = (jitter(), jitter(), jitter());
            Keyed::new(
                i as u32,
                Aabb3D::<f64>::from_xyzwhd(c[0] + dx, c[1] + dy, c[2] + dz, 1.0, 1.0, 1.0),
            )
        })
        .collect()
}

fn build(policy: OverflowPolicy, items: &[Item]) -> SpatialIndex<f64, Item> {
    let mut idx = SpatialIndex::with_policy(policy);
    idx.add_all(items.iter().copied());
    idx
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_insert");
    for &n in &[12usize, 20] {
        let boxes = gen_grid_boxes(n, 10.0);
        group.throughput(Throughput::Elements(boxes.len() as u64));
        for policy in POLICIES {
            group.bench_function(format!("{policy:?}_grid_n{}", n * n * n), |b| {
                b.iter_batched(
                    || SpatialIndex::<f64, Item>::with_policy(policy),
                    |mut idx| {
                        idx.add_all(boxes.iter().copied());
                        black_box(idx.height());
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }

    let clustered = gen_clustered_boxes(20_000, 8, 10_000.0, 200.0);
    group.throughput(Throughput::Elements(clustered.len() as u64));
    for policy in POLICIES {
        group.bench_function(format!("{policy:?}_clustered_n{}", clustered.len()), |b| {
            b.iter_batched(
                || SpatialIndex::<f64, Item>::with_policy(policy),
                |mut idx| {
                    idx.add_all(clustered.iter().copied());
                    black_box(idx.stats());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_query");
    let boxes = gen_clustered_boxes(20_000, 8, 10_000.0, 200.0);
    let mut rng = Rng::new(42);
    let windows: Vec<Aabb3D<f64>> = (0..256)
        .map(|_| {
            let (x, y, z) = (
                rng.next_f64() * 10_000.0,
                rng.next_f64() * 10_000.0,
                rng.next_f64() * 10_000.0,
            );
            Aabb3D::<f64>::from_xyzwhd(x, y, z, 300.0, 300.0, 300.0)
        })
        .collect();
    group.throughput(Throughput::Elements(windows.len() as u64));
    for policy in POLICIES {
        let idx = build(policy, &boxes);
        group.bench_function(format!("{policy:?}_overlap"), |b| {
            b.iter(|| {
                let mut hits = 0;
                for w in &windows {
                    hits += idx.find_overlap(w).count();
                }
                black_box(hits)
            })
        });
        group.bench_function(format!("{policy:?}_contain"), |b| {
            b.iter(|| {
                let mut hits = 0;
                for w in &windows {
                    hits += idx.find_contain(w).count();
                }
                black_box(hits)
            })
        });
    }
    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_remove");
    let boxes = gen_grid_boxes(16, 10.0);
    group.throughput(Throughput::Elements(boxes.len() as u64 / 2));
    for policy in POLICIES {
        group.bench_function(format!("{policy:?}_remove_half"), |b| {
            b.iter_batched(
                || build(policy, &boxes),
                |mut idx| {
                    for item in boxes.iter().step_by(2) {
                        idx.remove(item);
                    }
                    black_box(idx.len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    // Small fan-out: deeper trees, more condensation.
    let config = Config::default().with_max_entries(4);
    group.bench_function("RStar_m4_remove_half", |b| {
        b.iter_batched(
            || {
                let mut idx = SpatialIndex::new(config).unwrap();
                idx.add_all(boxes.iter().copied());
                idx
            },
            |mut idx: SpatialIndex<f64, Item>| {
                for item in boxes.iter().step_by(2) {
                    idx.remove(item);
                }
                black_box(idx.stats().condensed);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query, bench_remove);
criterion_main!(benches);
