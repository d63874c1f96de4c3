// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree basics.
//!
//! Build an index, run overlap/contain/point queries, walk the tree, and remove entries.
//!
//! Run:
//! - `cargo run -p understory_rtree_demos --example rtree_basics`
//! - `RUST_LOG=debug cargo run -p understory_rtree_demos --example rtree_basics` to see splits,
//!   reinsertions and root changes.

use log::info;
use understory_rtree::{Aabb3D, Checks, Config, Keyed, OverflowPolicy, SpatialIndex};

fn main() {
    env_logger::init();

    // Payload keys borrow from here, so it must outlive the index.
    let names: Vec<String> = (0..125).map(|i| format!("cube{i}")).collect();

    let config = Config::default()
        .with_max_entries(6)
        .with_policy(OverflowPolicy::RStar);
    let mut index: SpatialIndex<i64, Keyed<&str, i64>> =
        SpatialIndex::new(config).expect("valid fan-out");

    // A few named boxes, then a 5x5x5 block of unit cubes.
    index.add(Keyed::new("floor", Aabb3D::new(0, 0, 0, 100, 100, 1)));
    index.add(Keyed::new("pillar", Aabb3D::new(45, 45, 1, 55, 55, 80)));
    index.add(Keyed::new("lamp", Aabb3D::<i64>::from_xyzwhd(48, 48, 80, 4, 4, 4)));
    for (i, name) in names.iter().enumerate() {
        let i = i as i64;
        let (x, y, z) = (i % 5, (i / 5) % 5, i / 25);
        index.add(Keyed::new(
            name.as_str(),
            Aabb3D::<i64>::from_xyzwhd(10 + x * 2, 10 + y * 2, 2 + z * 2, 1, 1, 1),
        ));
    }
    info!("{index:?}");
    println!(
        "{} entries, height {}, bounds {:?}",
        index.len(),
        index.height(),
        index.bounds()
    );
    println!("stats: {:?}", index.stats());

    // Overlap: everything touching the column above the pillar.
    let column = Aabb3D::new(46, 46, 0, 54, 54, 200);
    let mut hits: Vec<&str> = index.find_overlap(&column).map(|p| p.key).collect();
    hits.sort_unstable();
    println!("overlap {column:?}: {hits:?}");

    // Contain: only cubes fully inside the window.
    let window = Aabb3D::new(9, 9, 1, 14, 14, 4);
    let mut inside: Vec<&str> = index.find_contain(&window).map(|p| p.key).collect();
    inside.sort_unstable();
    println!("contained in {window:?}: {inside:?}");

    // Point.
    let at: Vec<&str> = index.find_point(50, 50, 82).map(|p| p.key).collect();
    println!("at (50, 50, 82): {at:?}");

    // Path from the root to the lamp's leaf.
    let lamp = Keyed::new("lamp", Aabb3D::new(0, 0, 0, 0, 0, 0));
    if let Some(path) = index.path(&lamp) {
        for node in path {
            println!(
                "  level {} {:?} with {} children",
                node.level(),
                node.bounds(),
                node.children().len()
            );
        }
    }

    // Depth-first walk.
    let (mut branches, mut leaves) = (0, 0);
    for node in index.depth_first() {
        if node.is_leaf() {
            leaves += 1;
        } else {
            branches += 1;
        }
    }
    println!("depth-first: {branches} branches, {leaves} leaves");

    // Remove half of the cubes.
    for name in names.iter().step_by(2) {
        let removed = index.remove(&Keyed::new(name.as_str(), Aabb3D::new(0, 0, 0, 0, 0, 0)));
        assert!(removed, "{name} was indexed");
    }
    println!(
        "after removals: {} entries, height {}, stats {:?}",
        index.len(),
        index.height(),
        index.stats()
    );

    match index.check_invariants(Checks::ALL) {
        Ok(()) => println!("invariants hold"),
        Err(err) => println!("invariant violated: {err}"),
    }
}
