// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mesh triangles.
//!
//! Index the triangles of a small height-field mesh by their bounding boxes, use the index as
//! a broad phase for vertical probes, then move one triangle. The index only keeps the bounds
//! it saw when the triangle was added, so a moved triangle has to be removed and added again.
//!
//! Run:
//! - `cargo run -p understory_rtree_demos --example mesh_triangles`

use std::hash::{Hash, Hasher};

use understory_rtree::{Aabb3D, Bounded, Checks, RTreeF32, SpatialIndex};

/// A mesh triangle. Identity is the triangle id; the corners are geometry.
#[derive(Clone, Debug)]
struct Triangle {
    id: u32,
    corners: [[f32; 3]; 3],
}

impl PartialEq for Triangle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Triangle {}

impl Hash for Triangle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Bounded<f32> for Triangle {
    fn bounds(&self) -> Aabb3D<f32> {
        let [a, b, c] = self.corners;
        Aabb3D::new(
            a[0].min(b[0]).min(c[0]),
            a[1].min(b[1]).min(c[1]),
            a[2].min(b[2]).min(c[2]),
            a[0].max(b[0]).max(c[0]),
            a[1].max(b[1]).max(c[1]),
            a[2].max(b[2]).max(c[2]),
        )
    }
}

fn height(x: u32, y: u32) -> f32 {
    ((x * 7 + y * 3) % 5) as f32 * 0.25
}

/// Two triangles per grid cell.
fn height_field(n: u32) -> Vec<Triangle> {
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let p = |x: u32, y: u32| [x as f32, y as f32, height(x, y)];
            let id = out.len() as u32;
            out.push(Triangle {
                id,
                corners: [p(x, y), p(x + 1, y), p(x + 1, y + 1)],
            });
            out.push(Triangle {
                id: id + 1,
                corners: [p(x, y), p(x + 1, y + 1), p(x, y + 1)],
            });
        }
    }
    out
}

/// Triangles whose bounds a vertical line through `(x, y)` passes.
fn probe(index: &RTreeF32<Triangle>, x: f32, y: f32) -> Vec<u32> {
    let column = Aabb3D::new(x, y, f32::MIN, x, y, f32::MAX);
    let mut ids: Vec<u32> = index.find_overlap(&column).map(|t| t.id).collect();
    ids.sort_unstable();
    ids
}

fn main() {
    env_logger::init();

    let mesh = height_field(32);
    let mut index: RTreeF32<Triangle> = SpatialIndex::default();
    index.add_all(mesh.iter().cloned());
    println!(
        "{} triangles, height {}, stats {:?}",
        index.len(),
        index.height(),
        index.stats()
    );

    // Broad phase: a handful of candidates instead of the whole mesh.
    for (x, y) in [(0.5, 0.5), (10.25, 3.75), (31.9, 31.9), (40.0, 40.0)] {
        println!("probe ({x}, {y}): {:?}", probe(&index, x, y));
    }

    // Lift triangle 100 far above the mesh.
    let old = mesh[100].clone();
    let mut lifted = old.clone();
    for corner in &mut lifted.corners {
        corner[2] += 50.0;
    }
    let above = lifted.bounds();
    println!(
        "lifted triangle visible before re-adding: {}",
        index.find_overlap(&above).count() > 0
    );

    // Same identity, so `add` alone would keep the old bounds.
    index.remove(&old);
    index.add(lifted);
    println!(
        "lifted triangle visible after re-adding: {}",
        index.find_overlap(&above).count() > 0
    );
    println!("recorded bounds: {:?}", index.leaf_bounds(&old));

    if let Err(err) = index.check_invariants(Checks::ALL) {
        println!("invariant violated: {err}");
    }
}
