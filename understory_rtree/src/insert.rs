// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Insertion: subtree choice, overflow treatment, forced reinsertion and bound adjustment.

use core::cmp::Ordering;
use core::hash::Hash;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::config::{Config, OverflowPolicy};
use crate::node::{NodeId, ParentSlot, union_all};
use crate::split::{Group, quadratic_split, rstar_split};
use crate::tree::SpatialIndex;
use crate::types::{
    Aabb3D, Bounded, Scalar, center_distance_sq4, cmp_acc, enlargement, overlap_volume,
    union_aabb, volume,
};

/// Bookkeeping scoped to one top-level insertion.
///
/// The R*-tree policy reinserts on the first overflow at each level and splits afterwards.
/// Entries moved by a forced reinsertion go back in through the same context, so the flag also
/// bounds the recursion: a level can trigger at most one reinsertion per call.
#[derive(Debug, Default)]
pub(crate) struct InsertContext {
    overflowed: SmallVec<[bool; 16]>,
}

impl InsertContext {
    /// Mark `level` as overflowed and report whether this is its first overflow.
    fn first_overflow(&mut self, level: usize) -> bool {
        if self.overflowed.len() <= level {
            self.overflowed.resize(level + 1, false);
        }
        !core::mem::replace(&mut self.overflowed[level], true)
    }
}

/// Result of treating an overflowing node.
enum Overflow {
    /// The node was split; the new sibling still has to be placed in the parent.
    Split(NodeId),
    /// Entries were moved out and reinserted; the tree is settled.
    Reinserted,
}

impl<T: Scalar, P: Bounded<T> + Clone + Eq + Hash> SpatialIndex<T, P> {
    /// Index `payload`, snapshotting its bounds. Returns the id of its leaf.
    ///
    /// A payload that is already indexed is left untouched and its existing leaf id is returned.
    pub fn add(&mut self, payload: P) -> NodeId {
        if let Some(&id) = self.payload_to_id.get(&payload) {
            debug!("payload already indexed as {id:?}");
            return id;
        }
        let id = self.alloc_leaf(payload.bounds());
        self.id_to_payload.insert(id, payload.clone());
        self.payload_to_id.insert(payload, id);
        let mut ctx = InsertContext::default();
        self.insert_item(&mut ctx, id, 1);
        id
    }

    /// Index every payload from `payloads`, one at a time.
    pub fn add_all(&mut self, payloads: impl IntoIterator<Item = P>) {
        for p in payloads {
            self.add(p);
        }
    }
}

impl<T: Scalar, P> SpatialIndex<T, P> {
    /// Place a detached node under a branch of level `target` and settle the tree.
    ///
    /// Leaves go to level 1; an entry taken from a branch of level `L` goes back to level `L`.
    pub(crate) fn insert_item(&mut self, ctx: &mut InsertContext, item: NodeId, target: usize) {
        let bounds = self.item(item).bounds();
        let node = self.choose_subtree(&bounds, target);
        trace!("inserting {item:?} under {node:?} at level {target}");
        self.attach(node, item);
        let branch = self.item_mut(node);
        let grown = if branch.children().len() == 1 {
            bounds
        } else {
            union_aabb(branch.bounds(), bounds)
        };
        branch.set_bounds(grown);
        self.settle(ctx, node);
    }

    /// Descend from the root to the branch of level `target` best suited to hold `bounds`.
    fn choose_subtree(&self, bounds: &Aabb3D<T>, target: usize) -> NodeId {
        assert!(
            (1..=self.height).contains(&target),
            "cannot insert at level {target} into a tree of height {}",
            self.height
        );
        let mut node = self.root;
        loop {
            let item = self.item(node);
            let level = item.level();
            if level == target {
                return node;
            }
            let candidates: SmallVec<[(NodeId, Aabb3D<T>); 16]> = item
                .children()
                .iter()
                .map(|&c| (c, self.item(c).bounds()))
                .collect();
            assert!(
                !candidates.is_empty(),
                "branch {node:?} at level {level} has no children"
            );
            // Children of a level-2 branch hold the leaves themselves.
            node = if self.policy == OverflowPolicy::RStar && level == 2 {
                least_overlap_enlargement(&candidates, bounds)
            } else {
                least_enlargement(&candidates, bounds)
            };
        }
    }

    /// Resolve overflows starting at `node`, then propagate bounds to the root.
    fn settle(&mut self, ctx: &mut InsertContext, mut node: NodeId) {
        loop {
            if self.item(node).children().len() <= self.max_entries {
                self.adjust_tree(node);
                return;
            }
            match self.overflow_treatment(ctx, node) {
                Overflow::Reinserted => return,
                Overflow::Split(sibling) => match self.parent(node) {
                    None => {
                        self.grow_root(node, sibling);
                        return;
                    }
                    Some(ParentSlot { parent, slot }) => {
                        self.check_slot(parent, slot, node);
                        self.attach(parent, sibling);
                        self.refresh_bounds(parent);
                        node = parent;
                    }
                },
            }
        }
    }

    /// Walk from `node` to the root, re-unioning each ancestor with the child below it.
    ///
    /// Stops early once an ancestor already covers its child.
    fn adjust_tree(&mut self, node: NodeId) {
        let mut child = node;
        while let Some(ParentSlot { parent, slot }) = self.parent(child) {
            self.check_slot(parent, slot, child);
            let child_bounds = self.item(child).bounds();
            let parent_bounds = self.item(parent).bounds();
            let grown = union_aabb(parent_bounds, child_bounds);
            if grown == parent_bounds {
                break;
            }
            self.item_mut(parent).set_bounds(grown);
            child = parent;
        }
    }

    fn overflow_treatment(&mut self, ctx: &mut InsertContext, node: NodeId) -> Overflow {
        self.stats.overflows += 1;
        let level = self.item(node).level();
        match self.policy {
            OverflowPolicy::Guttman => Overflow::Split(self.split_node(node)),
            OverflowPolicy::RStar => {
                let count = Config::reinsert_count(self.max_entries);
                if node != self.root && count > 0 && ctx.first_overflow(level) {
                    self.forced_reinsert(ctx, node, count);
                    Overflow::Reinserted
                } else {
                    Overflow::Split(self.split_node(node))
                }
            }
        }
    }

    /// Split an overflowing node in two. Returns the new sibling, which is not yet attached.
    fn split_node(&mut self, node: NodeId) -> NodeId {
        let item = self.item(node);
        let level = item.level();
        let entries: SmallVec<[NodeId; 16]> = item.children().iter().copied().collect();
        let boxes: SmallVec<[Aabb3D<T>; 16]> =
            entries.iter().map(|&c| self.item(c).bounds()).collect();
        let (keep, moved): (Group, Group) = match self.policy {
            OverflowPolicy::Guttman => quadratic_split(&boxes, self.min_entries),
            OverflowPolicy::RStar => rstar_split(&boxes, self.min_entries),
        };
        debug!(
            "splitting {node:?} at level {level}: {} + {} entries",
            keep.len(),
            moved.len()
        );
        self.stats.splits += 1;

        self.item_mut(node).children_mut().clear();
        for &i in &keep {
            self.attach(node, entries[i]);
        }
        let sibling = self.alloc_branch(level);
        for &i in &moved {
            self.attach(sibling, entries[i]);
        }
        self.refresh_bounds(node);
        self.refresh_bounds(sibling);
        sibling
    }

    /// The `count` children of `node` farthest from its center, in the order they go back in:
    /// nearest to the center first.
    fn reinsert_order(&self, node: NodeId, count: usize) -> SmallVec<[NodeId; 8]> {
        let item = self.item(node);
        let center = union_all(item.children().iter().map(|&c| self.item(c).bounds()))
            .unwrap_or_else(|| item.bounds());
        let mut by_distance: SmallVec<[(NodeId, T::Acc); 16]> = item
            .children()
            .iter()
            .map(|&c| (c, center_distance_sq4(&self.item(c).bounds(), &center)))
            .collect();
        // Farthest first; the sort is stable so equal distances keep child order.
        by_distance.sort_by(|a, b| cmp_acc(&b.1, &a.1));
        by_distance[..count].iter().rev().map(|e| e.0).collect()
    }

    /// Move the `count` entries farthest from the node's center out of `node` and insert them
    /// again from the root, closest first.
    fn forced_reinsert(&mut self, ctx: &mut InsertContext, node: NodeId, count: usize) {
        let level = self.item(node).level();
        let removed = self.reinsert_order(node, count);
        debug!(
            "reinserting {} of {} entries of {node:?} at level {level}",
            removed.len(),
            self.item(node).children().len()
        );
        self.stats.reinsertions += 1;

        let kept: SmallVec<[NodeId; 16]> = self
            .item(node)
            .children()
            .iter()
            .copied()
            .filter(|c| !removed.contains(c))
            .collect();
        self.item_mut(node).children_mut().clear();
        for c in kept {
            self.attach(node, c);
        }
        for &r in &removed {
            self.clear_parent(r);
        }
        self.refresh_upward(node);

        for &r in &removed {
            trace!("reinserting {r:?}");
            self.insert_item(ctx, r, level);
        }
    }

    /// Put a new root above the old root and its freshly split sibling.
    fn grow_root(&mut self, old_root: NodeId, sibling: NodeId) {
        let level = self.item(old_root).level() + 1;
        let root = self.alloc_branch(level);
        self.attach(root, old_root);
        self.attach(root, sibling);
        self.refresh_bounds(root);
        self.root = root;
        self.height = level;
        self.stats.root_growths += 1;
        debug!("root grew to {root:?}, height {level}");
    }
}

/// Guttman's ChooseLeaf step: least volume enlargement, then least resulting volume.
fn least_enlargement<T: Scalar>(candidates: &[(NodeId, Aabb3D<T>)], bounds: &Aabb3D<T>) -> NodeId {
    let mut best: Option<(NodeId, T::Acc, T::Acc)> = None;
    for &(id, cb) in candidates {
        let cost = enlargement(&cb, bounds);
        let area = volume(&union_aabb(cb, *bounds));
        let better = match &best {
            None => true,
            Some((_, best_cost, best_area)) => match cmp_acc(&cost, best_cost) {
                Ordering::Less => true,
                Ordering::Equal => cmp_acc(&area, best_area) == Ordering::Less,
                Ordering::Greater => false,
            },
        };
        if better {
            best = Some((id, cost, area));
        }
    }
    match best {
        Some((id, ..)) => id,
        None => panic!("subtree choice needs at least one candidate"),
    }
}

/// R*-tree subtree choice above the leaves: least overlap enlargement with the siblings, then
/// least volume enlargement, then least volume.
fn least_overlap_enlargement<T: Scalar>(
    candidates: &[(NodeId, Aabb3D<T>)],
    bounds: &Aabb3D<T>,
) -> NodeId {
    let mut best: Option<(NodeId, [T::Acc; 3])> = None;
    for (i, &(id, cb)) in candidates.iter().enumerate() {
        let grown = union_aabb(cb, *bounds);
        let mut before = T::acc_zero();
        let mut after = T::acc_zero();
        for (j, (_, other)) in candidates.iter().enumerate() {
            if i != j {
                before = before + overlap_volume(&cb, other);
                after = after + overlap_volume(&grown, other);
            }
        }
        let key = [after - before, enlargement(&cb, bounds), volume(&cb)];
        let better = match &best {
            None => true,
            Some((_, best_key)) => lexicographic_lt(&key, best_key),
        };
        if better {
            best = Some((id, key));
        }
    }
    match best {
        Some((id, _)) => id,
        None => panic!("subtree choice needs at least one candidate"),
    }
}

fn lexicographic_lt<A: PartialOrd>(a: &[A], b: &[A]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match cmp_acc(x, y) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
    }
    false
}
