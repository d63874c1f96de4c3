// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_rtree --heading-base-level=0

//! Understory R-tree: a dynamic 3D AABB index.
//!
//! Understory R-tree maps caller payloads to axis-aligned boxes and answers window queries.
//!
//! - Add and remove payloads one at a time; the tree stays height-balanced.
//! - Query by intersecting box, containing box, or point.
//! - Walk the tree depth-first, look up a payload's root-to-leaf path, or drive your own
//!   traversal (e.g. a dual-tree join) through [`SpatialIndex::root`] and [`SpatialIndex::node`].
//!
//! Two overflow policies are available, see [`OverflowPolicy`]:
//! Guttman's quadratic split, and the R*-tree treatment (forced reinsertion, then a
//! margin/overlap-minimizing split). The R*-tree policy is the default.
//!
//! The index is generic over the scalar type `T` (`f32`, `f64`, `i64`) and computes volumes,
//! margins and distances in a widened accumulator (f32→f64, f64→f64, i64→i128).
//!
//! Payloads describe their own bounds through [`Bounded`]. The index snapshots those bounds
//! when a payload is added; changing a payload's geometry afterwards is not seen by queries
//! until it is removed and added again.
//!
//! # Example
//!
//! ```rust
//! use understory_rtree::{Aabb3D, Checks, Keyed, RTreeF64};
//!
//! let mut tree: RTreeF64<Keyed<u32, f64>> = RTreeF64::default();
//! tree.add(Keyed::new(1, Aabb3D::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0)));
//! tree.add(Keyed::new(2, Aabb3D::new(5.0, 5.0, 5.0, 6.0, 6.0, 6.0)));
//! tree.add_all((3..50_u32).map(|k| {
//!     let x = f64::from(k);
//!     Keyed::new(k, Aabb3D::<f64>::from_xyzwhd(x, 0.0, 0.0, 0.5, 0.5, 0.5))
//! }));
//!
//! // Window query.
//! let hits: Vec<u32> = tree
//!     .find_overlap(&Aabb3D::new(4.5, 4.5, 4.5, 5.5, 5.5, 5.5))
//!     .map(|p| p.key)
//!     .collect();
//! assert_eq!(hits, [2]);
//!
//! // Point query, then removal.
//! assert_eq!(tree.find_point(0.5, 0.5, 0.5).count(), 1);
//! assert!(tree.remove(&Keyed::new(1, Aabb3D::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0))));
//! assert_eq!(tree.find_point(0.5, 0.5, 0.5).count(), 0);
//!
//! assert_eq!(tree.check_invariants(Checks::ALL), Ok(()));
//! ```
//!
//! ## Choosing a policy
//!
//! - [`OverflowPolicy::RStar`] (default): better query performance on skewed or clustered
//!   data; inserts cost a little more because some entries are moved twice.
//! - [`OverflowPolicy::Guttman`]: cheaper, simpler inserts; nodes tend to overlap more.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//!
//! ### Logging
//!
//! Structural events (splits, forced reinsertions, root changes, dissolved nodes) are reported
//! through the [`log`](https://docs.rs/log) facade at `debug` and `trace` level.

#![no_std]

extern crate alloc;

pub mod config;
mod delete;
pub mod error;
mod insert;
pub mod node;
mod query;
mod split;
pub mod tree;
pub mod types;
mod validate;

pub use config::{Config, OverflowPolicy};
pub use error::Error;
pub use node::{NodeId, ParentSlot, TreeItem};
pub use query::DepthFirst;
pub use tree::{RTreeF32, RTreeF64, RTreeI64, SpatialIndex, Stats};
pub use types::{Aabb3D, Axis, Bounded, Keyed, Scalar, enlargement, margin, overlap_volume, volume};
pub use validate::Checks;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::{Hash, Hasher};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type Item = Keyed<u32, i64>;

    fn random_box(rng: &mut StdRng, extent: i64, max_size: i64) -> Aabb3D<i64> {
        Aabb3D::<i64>::from_xyzwhd(
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
            rng.random_range(-extent..extent),
            rng.random_range(0..max_size),
            rng.random_range(0..max_size),
            rng.random_range(0..max_size),
        )
    }

    fn sorted(mut keys: Vec<u32>) -> Vec<u32> {
        keys.sort_unstable();
        keys
    }

    #[test]
    fn random_queries_match_brute_force() {
        for policy in [OverflowPolicy::Guttman, OverflowPolicy::RStar] {
            let mut rng = StdRng::seed_from_u64(0x5eed);
            let items: Vec<Item> = (0..600)
                .map(|k| Keyed::new(k, random_box(&mut rng, 200, 30)))
                .collect();
            let mut idx: RTreeI64<Item> = SpatialIndex::new(
                Config::default().with_max_entries(8).with_policy(policy),
            )
            .unwrap();
            idx.add_all(items.iter().copied());
            assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));

            for _ in 0..100 {
                let q = random_box(&mut rng, 220, 120);
                let got = sorted(idx.find_overlap(&q).map(|p| p.key).collect());
                let want: Vec<u32> = items
                    .iter()
                    .filter(|p| p.aabb.intersects(&q))
                    .map(|p| p.key)
                    .collect();
                assert_eq!(got, want, "{policy:?} overlap {q:?}");

                let got = sorted(idx.find_contain(&q).map(|p| p.key).collect());
                let want: Vec<u32> = items
                    .iter()
                    .filter(|p| q.contains(&p.aabb))
                    .map(|p| p.key)
                    .collect();
                assert_eq!(got, want, "{policy:?} contain {q:?}");
            }
        }
    }

    #[test]
    fn random_inserts_and_removes_keep_invariants() {
        for policy in [OverflowPolicy::Guttman, OverflowPolicy::RStar] {
            let mut rng = StdRng::seed_from_u64(7);
            let mut idx: RTreeI64<Item> = SpatialIndex::new(
                Config::default()
                    .with_max_entries(6)
                    .with_min_entries(2)
                    .with_policy(policy),
            )
            .unwrap();
            let mut live: Vec<Item> = Vec::new();
            for step in 0..1500_u32 {
                if live.is_empty() || rng.random_range(0..3) > 0 {
                    let item = Keyed::new(step, random_box(&mut rng, 100, 10));
                    idx.add(item);
                    live.push(item);
                } else {
                    let victim = live.swap_remove(rng.random_range(0..live.len()));
                    assert!(idx.remove(&victim), "{policy:?} step {step}");
                    assert!(!idx.remove(&victim));
                }
                if step % 25 == 0 {
                    assert_eq!(idx.check_invariants(Checks::ALL), Ok(()), "{policy:?} {step}");
                }
            }
            assert_eq!(idx.len(), live.len());
            for item in &live {
                assert_eq!(idx.leaf_bounds(item), Some(item.aabb));
            }
            for item in live.drain(..) {
                assert!(idx.remove(&item));
            }
            assert_eq!(idx.len(), 0);
            assert_eq!(idx.height(), 1);
            assert!(idx.root().children().is_empty());
            assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));
        }
    }

    #[test]
    fn wide_integer_coordinates_stay_within_metric_range() {
        let reach = 1_i64 << 38;
        for policy in [OverflowPolicy::Guttman, OverflowPolicy::RStar] {
            let mut rng = StdRng::seed_from_u64(39);
            let items: Vec<Item> = (0..400)
                .map(|k| Keyed::new(k, random_box(&mut rng, reach, reach)))
                .collect();
            let mut idx: RTreeI64<Item> = SpatialIndex::with_policy(policy);
            idx.add_all(items.iter().copied());
            assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));

            let q = random_box(&mut rng, reach, reach);
            let got = sorted(idx.find_overlap(&q).map(|p| p.key).collect());
            let want: Vec<u32> = items
                .iter()
                .filter(|p| p.aabb.intersects(&q))
                .map(|p| p.key)
                .collect();
            assert_eq!(got, want, "{policy:?}");

            for item in items.iter().step_by(2) {
                assert!(idx.remove(item));
            }
            assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));
        }
    }

    #[test]
    fn reinsertion_needs_no_more_splits_on_clustered_data() {
        let mut rng = StdRng::seed_from_u64(2024);
        let centers: Vec<(f64, f64, f64)> = (0..5)
            .map(|_| {
                (
                    rng.random_range(-1000.0..1000.0),
                    rng.random_range(-1000.0..1000.0),
                    rng.random_range(-1000.0..1000.0),
                )
            })
            .collect();
        let items: Vec<Keyed<u32, f64>> = (0..500)
            .map(|k| {
                let (cx, cy, cz) = centers[k as usize % centers.len()];
                Keyed::new(
                    k,
                    Aabb3D::<f64>::from_xyzwhd(
                        cx + rng.random_range(-5.0..5.0),
                        cy + rng.random_range(-5.0..5.0),
                        cz + rng.random_range(-5.0..5.0),
                        0.5,
                        0.5,
                        0.5,
                    ),
                )
            })
            .collect();

        let mut guttman: RTreeF64<Keyed<u32, f64>> =
            SpatialIndex::with_policy(OverflowPolicy::Guttman);
        let mut rstar: RTreeF64<Keyed<u32, f64>> =
            SpatialIndex::with_policy(OverflowPolicy::RStar);
        guttman.add_all(items.iter().copied());
        rstar.add_all(items.iter().copied());

        assert!(rstar.stats().reinsertions > 0);
        assert!(
            rstar.stats().splits <= guttman.stats().splits,
            "R*: {:?}, Guttman: {:?}",
            rstar.stats(),
            guttman.stats()
        );
        assert_eq!(rstar.check_invariants(Checks::ALL), Ok(()));
        assert_eq!(guttman.check_invariants(Checks::ALL), Ok(()));
    }

    /// Payload whose geometry can change behind the index's back.
    #[derive(Clone, Debug)]
    struct Movable(Rc<Cell<Aabb3D<f64>>>);

    impl PartialEq for Movable {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.0, &other.0)
        }
    }

    impl Eq for Movable {}

    impl Hash for Movable {
        fn hash<H: Hasher>(&self, state: &mut H) {
            Rc::as_ptr(&self.0).hash(state);
        }
    }

    impl Bounded<f64> for Movable {
        fn bounds(&self) -> Aabb3D<f64> {
            self.0.get()
        }
    }

    #[test]
    fn moving_a_payload_does_not_move_its_leaf() {
        let mut idx: RTreeF64<Movable> = SpatialIndex::default();
        let others: Vec<Movable> = (0..40_u32)
            .map(|i| {
                let x = f64::from(i) * 3.0;
                let b = Aabb3D::<f64>::from_xyzwhd(x, 0.0, 0.0, 1.0, 1.0, 1.0);
                Movable(Rc::new(Cell::new(b)))
            })
            .collect();
        idx.add_all(others.iter().cloned());
        let moving = Movable(Rc::new(Cell::new(Aabb3D::new(
            500.0, 500.0, 500.0, 501.0, 501.0, 501.0,
        ))));
        idx.add(moving.clone());

        let window = Aabb3D::new(1000.0, 1000.0, 1000.0, 1001.0, 1001.0, 1001.0);
        moving.0.set(window);
        assert_eq!(idx.find_overlap(&window).count(), 0);
        assert_eq!(idx.find_point(500.5, 500.5, 500.5).count(), 1);
        assert_eq!(idx.leaf_bounds(&moving).map(|b| b.min_x), Some(500.0));

        // Removal goes by identity, not geometry.
        assert!(idx.remove(&moving));
        idx.add(moving.clone());
        assert_eq!(idx.find_overlap(&window).count(), 1);
        assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));
    }

    /// Overlapping pairs between two trees, found by descending both at once.
    fn join<'a>(
        a: &'a RTreeI64<Item>,
        b: &'a RTreeI64<Item>,
        na: &'a TreeItem<i64>,
        nb: &'a TreeItem<i64>,
        out: &mut Vec<(u32, u32)>,
    ) {
        if !na.bounds().intersects(&nb.bounds()) {
            return;
        }
        match (na.can_subdivide(), nb.can_subdivide()) {
            (false, false) => {
                if let (Some(pa), Some(pb)) = (a.payload(na.id()), b.payload(nb.id())) {
                    out.push((pa.key, pb.key));
                }
            }
            (true, false) => {
                for &c in na.children() {
                    join(a, b, a.node(c).unwrap(), nb, out);
                }
            }
            (false, true) => {
                for &c in nb.children() {
                    join(a, b, na, b.node(c).unwrap(), out);
                }
            }
            // Expand the higher node so both sides shrink at a similar rate.
            (true, true) if na.level() >= nb.level() => {
                for &c in na.children() {
                    join(a, b, a.node(c).unwrap(), nb, out);
                }
            }
            (true, true) => {
                for &c in nb.children() {
                    join(a, b, na, b.node(c).unwrap(), out);
                }
            }
        }
    }

    #[test]
    fn dual_tree_join_through_node_access() {
        let mut rng = StdRng::seed_from_u64(99);
        let left: Vec<Item> = (0..150)
            .map(|k| Keyed::new(k, random_box(&mut rng, 30, 10)))
            .collect();
        let right: Vec<Item> = (0..90)
            .map(|k| Keyed::new(k, random_box(&mut rng, 30, 10)))
            .collect();
        let mut a: RTreeI64<Item> = SpatialIndex::with_policy(OverflowPolicy::RStar);
        let mut b: RTreeI64<Item> = SpatialIndex::with_policy(OverflowPolicy::Guttman);
        a.add_all(left.iter().copied());
        b.add_all(right.iter().copied());

        let mut got = Vec::new();
        join(&a, &b, a.root(), b.root(), &mut got);
        got.sort_unstable();

        let mut want = Vec::new();
        for l in &left {
            for r in &right {
                if l.aabb.intersects(&r.aabb) {
                    want.push((l.key, r.key));
                }
            }
        }
        want.sort_unstable();
        assert!(!want.is_empty());
        assert_eq!(got, want);
    }

    #[test]
    fn f32_index_agrees_with_scan() {
        let mut rng = StdRng::seed_from_u64(31);
        let items: Vec<Keyed<u32, f32>> = (0..300)
            .map(|k| {
                Keyed::new(
                    k,
                    Aabb3D::<f32>::from_xyzwhd(
                        rng.random_range(0.0..50.0),
                        rng.random_range(0.0..50.0),
                        rng.random_range(0.0..50.0),
                        rng.random_range(0.1..4.0),
                        rng.random_range(0.1..4.0),
                        rng.random_range(0.1..4.0),
                    ),
                )
            })
            .collect();
        let mut idx: RTreeF32<Keyed<u32, f32>> = SpatialIndex::default();
        idx.add_all(items.iter().copied());
        for _ in 0..50 {
            let (x, y, z) = (
                rng.random_range(0.0..50.0),
                rng.random_range(0.0..50.0),
                rng.random_range(0.0..50.0),
            );
            let got = sorted(idx.find_point(x, y, z).map(|p| p.key).collect());
            let want: Vec<u32> = items
                .iter()
                .filter(|p| p.aabb.contains_point(x, y, z))
                .map(|p| p.key)
                .collect();
            assert_eq!(got, want);
        }
        for item in items.iter().step_by(2) {
            assert!(idx.remove(item));
        }
        assert_eq!(idx.len(), 150);
        assert_eq!(idx.check_invariants(Checks::ALL), Ok(()));
    }

    #[test]
    fn depth_first_visits_each_leaf_once() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut idx: RTreeI64<Item> = SpatialIndex::default();
        idx.add_all((0..400).map(|k| Keyed::new(k, random_box(&mut rng, 500, 20))));
        let leaves: Vec<NodeId> = idx
            .depth_first()
            .filter(|n| n.is_leaf())
            .map(TreeItem::id)
            .collect();
        let mut keys = sorted(leaves.iter().map(|&id| idx.payload(id).unwrap().key).collect());
        keys.dedup();
        assert_eq!(keys, (0..400).collect::<Vec<_>>());
    }
}
