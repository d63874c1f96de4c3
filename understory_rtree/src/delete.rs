// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Removal: detach a leaf, dissolve underfull branches, shrink the root.

use core::hash::Hash;

use log::debug;
use smallvec::SmallVec;

use crate::insert::InsertContext;
use crate::node::{NodeId, ParentSlot};
use crate::tree::SpatialIndex;
use crate::types::{Bounded, Scalar};

impl<T: Scalar, P: Bounded<T> + Clone + Eq + Hash> SpatialIndex<T, P> {
    /// Remove `payload`. Returns `false` if it was not indexed.
    pub fn remove(&mut self, payload: &P) -> bool {
        let Some(id) = self.payload_to_id.remove(payload) else {
            return false;
        };
        self.id_to_payload.remove(&id);
        let Some(ParentSlot { parent, slot }) = self.parent(id) else {
            panic!("leaf {id:?} has no parent");
        };
        self.check_slot(parent, slot, id);
        self.detach(parent, slot);
        self.retire_id(id);
        self.condense_tree(parent);
        true
    }
}

impl<T: Scalar, P> SpatialIndex<T, P> {
    /// Repair the path from `start` to the root after `start` lost a child.
    ///
    /// Underfull non-root branches are detached; their entries go back in from the root at
    /// the branch's own level once the path has been fixed.
    fn condense_tree(&mut self, start: NodeId) {
        let mut orphans: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut node = start;
        while let Some(ParentSlot { parent, slot }) = self.parent(node) {
            self.check_slot(parent, slot, node);
            if self.item(node).children().len() < self.min_entries {
                debug!(
                    "dissolving underfull {node:?} at level {} ({} entries)",
                    self.item(node).level(),
                    self.item(node).children().len()
                );
                self.detach(parent, slot);
                orphans.push(node);
                self.stats.condensed += 1;
            } else {
                self.refresh_bounds(node);
            }
            node = parent;
        }
        self.refresh_bounds(node);

        for orphan in orphans {
            let level = self.item(orphan).level();
            let entries: SmallVec<[NodeId; 16]> =
                self.item(orphan).children().iter().copied().collect();
            for entry in entries {
                self.clear_parent(entry);
                let mut ctx = InsertContext::default();
                self.insert_item(&mut ctx, entry, level);
            }
            self.retire_id(orphan);
        }

        self.shrink_root();
    }

    /// Replace a root that has a single branch child by that child, repeatedly.
    fn shrink_root(&mut self) {
        while self.height > 1 {
            let root = self.item(self.root);
            if root.children().len() != 1 {
                break;
            }
            let child = root.children()[0];
            let old = self.root;
            self.clear_parent(child);
            self.retire_id(old);
            self.root = child;
            self.height -= 1;
            self.stats.root_shrinks += 1;
            debug!("root shrank to {child:?}, height {}", self.height);
        }
    }
}
