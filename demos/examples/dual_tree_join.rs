// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dual-tree traversal.
//!
//! Walk two indexes in lock-step through the node access API (`root`, `node`, `children`,
//! `level`, `can_subdivide`) to answer two questions without per-item queries:
//!
//! - which boxes of one set overlap boxes of the other (an overlap join), and
//! - for each box of one set, how far away the nearest box of the other set is.
//!
//! The nearest-neighbor search keeps its per-node distance bounds in its own side table,
//! keyed by [`NodeId`]; the tree nodes themselves carry no scratch state.
//!
//! Run:
//! - `cargo run -p understory_rtree_demos --example dual_tree_join`

use std::collections::HashMap;

use understory_rtree::{Aabb3D, Keyed, NodeId, OverflowPolicy, RTreeF64, SpatialIndex, TreeItem};

type Item = Keyed<u32, f64>;

/// Euclidean gap between two boxes; zero when they touch or overlap.
fn gap(a: &Aabb3D<f64>, b: &Aabb3D<f64>) -> f64 {
    let axis = |amin: f64, amax: f64, bmin: f64, bmax: f64| (bmin - amax).max(amin - bmax).max(0.0);
    let dx = axis(a.min_x, a.max_x, b.min_x, b.max_x);
    let dy = axis(a.min_y, a.max_y, b.min_y, b.max_y);
    let dz = axis(a.min_z, a.max_z, b.min_z, b.max_z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Which side of a node pair to descend into, or `None` for a pair of leaves.
fn expand_left(a: &TreeItem<f64>, b: &TreeItem<f64>) -> Option<bool> {
    match (a.can_subdivide(), b.can_subdivide()) {
        (false, false) => None,
        (true, false) => Some(true),
        (false, true) => Some(false),
        (true, true) => Some(a.level() >= b.level()),
    }
}

fn overlap_join(
    left: &RTreeF64<Item>,
    right: &RTreeF64<Item>,
    a: &TreeItem<f64>,
    b: &TreeItem<f64>,
    out: &mut Vec<(u32, u32)>,
) {
    if !a.bounds().intersects(&b.bounds()) {
        return;
    }
    match expand_left(a, b) {
        None => {
            if let (Some(pa), Some(pb)) = (left.payload(a.id()), right.payload(b.id())) {
                out.push((pa.key, pb.key));
            }
        }
        Some(true) => {
            for child in a.children().iter().filter_map(|&c| left.node(c)) {
                overlap_join(left, right, child, b, out);
            }
        }
        Some(false) => {
            for child in b.children().iter().filter_map(|&c| right.node(c)) {
                overlap_join(left, right, a, child, out);
            }
        }
    }
}

/// Dual-tree all-nearest-neighbors from `queries` into `refs`.
struct AllNearest<'a> {
    queries: &'a RTreeF64<Item>,
    refs: &'a RTreeF64<Item>,
    /// Side table: for each query node, an upper bound on the nearest-neighbor distance of
    /// every query leaf below it. Missing means unbounded.
    bound: HashMap<NodeId, f64>,
    /// Best distance and reference key found so far for each query leaf.
    best: HashMap<NodeId, (f64, u32)>,
    pairs_visited: usize,
}

impl<'a> AllNearest<'a> {
    fn new(queries: &'a RTreeF64<Item>, refs: &'a RTreeF64<Item>) -> Self {
        Self {
            queries,
            refs,
            bound: HashMap::new(),
            best: HashMap::new(),
            pairs_visited: 0,
        }
    }

    fn bound(&self, id: NodeId) -> f64 {
        self.bound.get(&id).copied().unwrap_or(f64::INFINITY)
    }

    fn run(&mut self) {
        self.visit(self.queries.root(), self.refs.root());
    }

    fn visit(&mut self, q: &'a TreeItem<f64>, r: &'a TreeItem<f64>) {
        self.pairs_visited += 1;
        let d = gap(&q.bounds(), &r.bounds());
        if d > self.bound(q.id()) {
            return;
        }
        let (queries, refs) = (self.queries, self.refs);
        match expand_left(q, r) {
            None => {
                let Some(key) = refs.payload(r.id()).map(|p| p.key) else {
                    return;
                };
                let entry = self.best.entry(q.id()).or_insert((f64::INFINITY, key));
                if d < entry.0 {
                    *entry = (d, key);
                }
                let best = entry.0;
                self.bound.insert(q.id(), best);
            }
            Some(true) => {
                for &c in q.children() {
                    if let Some(child) = queries.node(c) {
                        self.visit(child, r);
                    }
                }
                let worst = q
                    .children()
                    .iter()
                    .map(|&c| self.bound(c))
                    .fold(0.0, f64::max);
                self.bound.insert(q.id(), worst);
            }
            Some(false) => {
                // Closest reference subtree first, so later siblings prune more.
                let mut kids: Vec<(f64, &TreeItem<f64>)> = r
                    .children()
                    .iter()
                    .filter_map(|&c| refs.node(c))
                    .map(|n| (gap(&q.bounds(), &n.bounds()), n))
                    .collect();
                kids.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (_, child) in kids {
                    self.visit(q, child);
                }
            }
        }
    }
}

/// Deterministic boxes along a noisy diagonal.
fn scatter(count: u32, seed: u32, size: f64) -> Vec<Item> {
    (0..count)
        .map(|i| {
            let h = i.wrapping_mul(2_654_435_761).wrapping_add(seed);
            let t = f64::from(i) * 2.0;
            let jitter = |shift: u32| f64::from((h >> shift) % 64) - 32.0;
            Keyed::new(
                i,
                Aabb3D::<f64>::from_xyzwhd(t + jitter(0), t + jitter(8), jitter(16), size, size, size),
            )
        })
        .collect()
}

fn main() {
    env_logger::init();

    let rooms = scatter(400, 17, 6.0);
    let sensors = scatter(250, 90_001, 1.5);
    let mut left: RTreeF64<Item> = SpatialIndex::with_policy(OverflowPolicy::RStar);
    let mut right: RTreeF64<Item> = SpatialIndex::with_policy(OverflowPolicy::Guttman);
    left.add_all(rooms.iter().copied());
    right.add_all(sensors.iter().copied());

    // Overlap join.
    let mut pairs = Vec::new();
    overlap_join(&left, &right, left.root(), right.root(), &mut pairs);
    pairs.sort_unstable();
    let brute = rooms
        .iter()
        .flat_map(|a| sensors.iter().map(move |b| (a, b)))
        .filter(|(a, b)| a.aabb.intersects(&b.aabb))
        .count();
    println!(
        "overlap join: {} pairs (brute force: {brute}), first few: {:?}",
        pairs.len(),
        &pairs[..pairs.len().min(5)]
    );

    // All nearest neighbors, sensors -> rooms.
    let mut nearest = AllNearest::new(&right, &left);
    nearest.run();
    let mut agree = 0;
    for sensor in &sensors {
        let Some(leaf) = right.id_of(sensor) else {
            continue;
        };
        let exact = rooms
            .iter()
            .map(|room| gap(&sensor.aabb, &room.aabb))
            .fold(f64::INFINITY, f64::min);
        if nearest.best.get(&leaf).is_some_and(|&(d, _)| d == exact) {
            agree += 1;
        }
    }
    println!(
        "nearest rooms: {agree}/{} match brute force, {} node pairs visited (brute force: {})",
        sensors.len(),
        nearest.pairs_visited,
        sensors.len() * rooms.len()
    );
}
