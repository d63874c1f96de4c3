// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`SpatialIndex`] container: node arena, id allocation, payload maps and accessors.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::config::{Config, OverflowPolicy};
use crate::error::Error;
use crate::node::{NodeId, ParentSlot, TreeItem, empty_bounds, union_all};
use crate::types::{Aabb3D, Bounded, Scalar};

/// Cumulative structural events, counted since construction or the last [`SpatialIndex::clear`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Times a node exceeded `M` children during an insertion.
    pub overflows: usize,
    /// Node splits (each creates one new sibling).
    pub splits: usize,
    /// Forced reinsertions performed instead of a split.
    pub reinsertions: usize,
    /// Times the tree grew a new root.
    pub root_growths: usize,
    /// Times a single-child root was replaced by its child.
    pub root_shrinks: usize,
    /// Underfull branches dissolved after a removal.
    pub condensed: usize,
}

/// A dynamic R-tree over 3D boxes.
///
/// Payloads are registered with [`add`](Self::add), which snapshots their
/// [`Bounded::bounds`], and unregistered with [`remove`](Self::remove). Each payload becomes a
/// [`TreeItem::Leaf`]; leaves hang off [`TreeItem::Branch`] nodes whose bounds always equal the
/// union of their children once an operation returns.
///
/// Nodes live in an arena addressed by [`NodeId`]. Parents are not stored in the nodes; a
/// separate table maps every non-root node to its [`ParentSlot`].
pub struct SpatialIndex<T: Scalar, P> {
    pub(crate) min_entries: usize,
    pub(crate) max_entries: usize,
    pub(crate) policy: OverflowPolicy,
    pub(crate) root: NodeId,
    pub(crate) height: usize,
    nodes: Vec<Option<TreeItem<T>>>,
    parents: Vec<Option<ParentSlot>>,
    free_ids: Vec<NodeId>,
    pub(crate) id_to_payload: HashMap<NodeId, P>,
    pub(crate) payload_to_id: HashMap<P, NodeId>,
    pub(crate) stats: Stats,
}

/// R-tree with i64 coordinates and i128 metrics.
///
/// Coordinates must stay within `±2^39`. Volumes are products of three extents and overlap
/// costs add up several of them, so larger boxes overflow `i128`.
pub type RTreeI64<P> = SpatialIndex<i64, P>;

/// R-tree with f32 coordinates and f64 metrics.
pub type RTreeF32<P> = SpatialIndex<f32, P>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64<P> = SpatialIndex<f64, P>;

impl<T: Scalar, P> SpatialIndex<T, P> {
    /// Create an empty index.
    ///
    /// Fails if `config.max_entries < 2`; an out-of-range `min_entries` is clamped to `M / 2`.
    pub fn new(config: Config) -> Result<Self, Error> {
        let (min_entries, max_entries) = config.resolve()?;
        let mut index = Self {
            min_entries,
            max_entries,
            policy: config.policy,
            root: NodeId::from_index(0),
            height: 1,
            nodes: Vec::new(),
            parents: Vec::new(),
            free_ids: Vec::new(),
            id_to_payload: HashMap::new(),
            payload_to_id: HashMap::new(),
            stats: Stats::default(),
        };
        index.root = index.alloc_branch(1);
        Ok(index)
    }

    /// Create an empty index with explicit fan-out bounds `m` and `M` and the default policy.
    pub fn with_fanout(min_entries: usize, max_entries: usize) -> Result<Self, Error> {
        Self::new(
            Config::default()
                .with_max_entries(max_entries)
                .with_min_entries(min_entries),
        )
    }

    /// Create an empty index with default fan-out and the given overflow policy.
    pub fn with_policy(policy: OverflowPolicy) -> Self {
        Self::new(Config::default().with_policy(policy))
            .expect("default fan-out is always valid")
    }

    /// Number of indexed payloads.
    pub fn len(&self) -> usize {
        self.id_to_payload.len()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.id_to_payload.is_empty()
    }

    /// Number of branch levels; 1 for a tree whose root holds the leaves directly.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Minimum children per non-root node (`m`).
    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    /// Maximum children per node (`M`).
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// The overflow policy in use.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Structural event counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Bounds of everything indexed, or `None` when empty.
    pub fn bounds(&self) -> Option<Aabb3D<T>> {
        if self.is_empty() {
            None
        } else {
            Some(self.item(self.root).bounds())
        }
    }

    /// The root branch.
    pub fn root(&self) -> &TreeItem<T> {
        self.item(self.root)
    }

    /// Id of the root branch.
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Look up a live node.
    pub fn node(&self, id: NodeId) -> Option<&TreeItem<T>> {
        self.nodes.get(id.index())?.as_ref()
    }

    /// Where `id` sits in its parent; `None` for the root and for dead ids.
    pub fn parent(&self, id: NodeId) -> Option<ParentSlot> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// The payload wrapped by leaf `id`.
    pub fn payload(&self, id: NodeId) -> Option<&P> {
        self.id_to_payload.get(&id)
    }

    /// Iterate over all indexed payloads with their leaf ids, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &P)> + '_ {
        self.id_to_payload.iter().map(|(id, p)| (*id, p))
    }

    /// Remove everything, keeping the configuration.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.parents.clear();
        self.free_ids.clear();
        self.id_to_payload.clear();
        self.payload_to_id.clear();
        self.stats = Stats::default();
        self.height = 1;
        self.root = self.alloc_branch(1);
    }

    pub(crate) fn item(&self, id: NodeId) -> &TreeItem<T> {
        match self.nodes.get(id.index()) {
            Some(Some(item)) => item,
            _ => panic!("node {id:?} is not live"),
        }
    }

    pub(crate) fn item_mut(&mut self, id: NodeId) -> &mut TreeItem<T> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(item)) => item,
            _ => panic!("node {id:?} is not live"),
        }
    }

    /// Reuse a retired id if there is one, otherwise extend the arena.
    pub(crate) fn allocate_id(&mut self) -> NodeId {
        if let Some(id) = self.free_ids.pop() {
            id
        } else {
            self.nodes.push(None);
            self.parents.push(None);
            NodeId::from_index(self.nodes.len() - 1)
        }
    }

    /// Drop the node stored under `id` and make the id available again.
    pub(crate) fn retire_id(&mut self, id: NodeId) {
        self.nodes[id.index()] = None;
        self.parents[id.index()] = None;
        self.free_ids.push(id);
    }

    pub(crate) fn alloc_leaf(&mut self, bounds: Aabb3D<T>) -> NodeId {
        let id = self.allocate_id();
        self.nodes[id.index()] = Some(TreeItem::leaf(id, bounds));
        id
    }

    pub(crate) fn alloc_branch(&mut self, level: usize) -> NodeId {
        let id = self.allocate_id();
        // One extra slot holds the entry that triggers an overflow.
        self.nodes[id.index()] = Some(TreeItem::branch(id, level, self.max_entries + 1));
        id
    }

    pub(crate) fn clear_parent(&mut self, id: NodeId) {
        self.parents[id.index()] = None;
    }

    /// Append `child` to `parent`'s children and record the parent slot. Bounds are untouched.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        let children = self.item_mut(parent).children_mut();
        children.push(child);
        let slot = children.len() - 1;
        self.parents[child.index()] = Some(ParentSlot { parent, slot });
    }

    /// Remove the child at `slot` by moving the last child into the hole.
    ///
    /// Fixes the moved child's parent slot and clears the removed child's. Bounds are untouched.
    pub(crate) fn detach(&mut self, parent: NodeId, slot: usize) -> NodeId {
        let children = self.item_mut(parent).children_mut();
        let removed = children.swap_remove(slot);
        let moved = children.get(slot).copied();
        if let Some(moved) = moved {
            self.parents[moved.index()] = Some(ParentSlot { parent, slot });
        }
        self.parents[removed.index()] = None;
        removed
    }

    /// Fail fast if the parent table and the parent's child array disagree.
    pub(crate) fn check_slot(&self, parent: NodeId, slot: usize, child: NodeId) {
        let actual = self.item(parent).children().get(slot).copied();
        assert_eq!(
            actual,
            Some(child),
            "parent {parent:?} slot {slot} does not point back to child {child:?}"
        );
    }

    /// Recompute `id`'s bounds as the exact union of its children.
    pub(crate) fn refresh_bounds(&mut self, id: NodeId) {
        let item = self.item(id);
        let bounds = union_all(item.children().iter().map(|c| self.item(*c).bounds()))
            .unwrap_or_else(empty_bounds);
        self.item_mut(id).set_bounds(bounds);
    }

    /// Recompute the bounds of `id` and of every ancestor up to the root.
    ///
    /// Needed after entries left a node, when bounds may shrink.
    pub(crate) fn refresh_upward(&mut self, id: NodeId) {
        self.refresh_bounds(id);
        let mut child = id;
        while let Some(ParentSlot { parent, slot }) = self.parent(child) {
            self.check_slot(parent, slot, child);
            self.refresh_bounds(parent);
            child = parent;
        }
    }
}

impl<T: Scalar, P: Bounded<T> + Clone + Eq + Hash> SpatialIndex<T, P> {
    /// Id of the leaf holding `payload`.
    pub fn id_of(&self, payload: &P) -> Option<NodeId> {
        self.payload_to_id.get(payload).copied()
    }

    /// True if `payload` is indexed.
    pub fn contains(&self, payload: &P) -> bool {
        self.payload_to_id.contains_key(payload)
    }

    /// The bounds recorded for `payload` when it was added.
    pub fn leaf_bounds(&self, payload: &P) -> Option<Aabb3D<T>> {
        self.id_of(payload).map(|id| self.item(id).bounds())
    }
}

impl<T: Scalar, P> Default for SpatialIndex<T, P> {
    fn default() -> Self {
        Self::with_policy(OverflowPolicy::default())
    }
}

impl<T: Scalar, P> Debug for SpatialIndex<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("SpatialIndex")
            .field("min_entries", &self.min_entries)
            .field("max_entries", &self.max_entries)
            .field("policy", &self.policy)
            .field("height", &self.height)
            .field("payloads", &self.id_to_payload.len())
            .field("live_nodes", &alive)
            .field("free_ids", &self.free_ids.len())
            .finish_non_exhaustive()
    }
}
