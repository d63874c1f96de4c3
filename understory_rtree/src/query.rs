// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Window queries, depth-first traversal and root-to-leaf paths.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use smallvec::SmallVec;

use crate::node::{NodeId, TreeItem};
use crate::tree::SpatialIndex;
use crate::types::{Aabb3D, Bounded, Scalar};

impl<T: Scalar, P> SpatialIndex<T, P> {
    /// Payloads whose recorded bounds intersect `query` (touching counts).
    pub fn find_overlap(&self, query: &Aabb3D<T>) -> impl Iterator<Item = &P> + '_ {
        self.search(|b| b.intersects(query), |b| b.intersects(query))
            .into_iter()
    }

    /// Payloads whose recorded bounds lie entirely inside `query`.
    pub fn find_contain(&self, query: &Aabb3D<T>) -> impl Iterator<Item = &P> + '_ {
        // A branch only partially inside the window can still hold contained leaves.
        self.search(|b| b.intersects(query), |b| query.contains(b))
            .into_iter()
    }

    /// Payloads whose recorded bounds contain the point (boundary inclusive).
    pub fn find_point(&self, x: T, y: T, z: T) -> impl Iterator<Item = &P> + '_ {
        let point = Aabb3D::from_point(x, y, z);
        self.search(|b| b.intersects(&point), |b| b.intersects(&point))
            .into_iter()
    }

    /// Every node, branches and leaves, in pre-order starting at the root.
    ///
    /// Children are visited in the order of their parent's child array. An empty index yields
    /// only its (childless) root.
    pub fn depth_first(&self) -> DepthFirst<'_, T, P> {
        let mut stack = SmallVec::new();
        stack.push(self.root);
        DepthFirst { index: self, stack }
    }

    /// Explicit-stack descent: enter branches passing `descend`, keep leaves passing `accept`.
    fn search(
        &self,
        descend: impl Fn(&Aabb3D<T>) -> bool,
        accept: impl Fn(&Aabb3D<T>) -> bool,
    ) -> Vec<&P> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let mut stack: SmallVec<[NodeId; 32]> = SmallVec::new();
        stack.push(self.root);
        while let Some(id) = stack.pop() {
            let item = self.item(id);
            let bounds = item.bounds();
            match item {
                TreeItem::Leaf { .. } => {
                    if accept(&bounds) {
                        out.extend(self.id_to_payload.get(&id));
                    }
                }
                TreeItem::Branch { children, .. } => {
                    if descend(&bounds) {
                        stack.extend(children.iter().copied());
                    }
                }
            }
        }
        out
    }
}

impl<T: Scalar, P: Bounded<T> + Clone + Eq + Hash> SpatialIndex<T, P> {
    /// Branches from the root down to the parent of `payload`'s leaf.
    ///
    /// Returns `None` if `payload` is not indexed.
    pub fn path(&self, payload: &P) -> Option<Vec<&TreeItem<T>>> {
        let leaf = self.id_of(payload)?;
        let mut path = Vec::with_capacity(self.height);
        let mut node = leaf;
        while let Some(slot) = self.parent(node) {
            self.check_slot(slot.parent, slot.slot, node);
            path.push(self.item(slot.parent));
            node = slot.parent;
        }
        path.reverse();
        Some(path)
    }
}

/// Pre-order iterator over the nodes of a [`SpatialIndex`], see
/// [`SpatialIndex::depth_first`].
pub struct DepthFirst<'a, T: Scalar, P> {
    index: &'a SpatialIndex<T, P>,
    stack: SmallVec<[NodeId; 32]>,
}

impl<'a, T: Scalar, P> Iterator for DepthFirst<'a, T, P> {
    type Item = &'a TreeItem<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let item = self.index.item(id);
        self.stack.extend(item.children().iter().rev().copied());
        Some(item)
    }
}

impl<T: Scalar, P> Debug for DepthFirst<'_, T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DepthFirst")
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}
