// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree nodes: leaves wrapping one payload, and branches holding child ids.

use alloc::vec::Vec;

use crate::types::{Aabb3D, Scalar, union_aabb};

/// Handle of a live node (leaf or branch).
///
/// Ids are positive and unique among the nodes currently in the tree. Ids of removed nodes
/// are recycled, so an id must not be kept across a mutation of the index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Node ids are intentionally 32-bit; an index never holds 2^32 nodes."
    )]
    pub(crate) const fn from_index(idx: usize) -> Self {
        Self(idx as u32 + 1)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// The raw id value (always positive).
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A node of the tree.
#[derive(Clone, Debug)]
pub enum TreeItem<T> {
    /// Wraps one indexed payload. Level 0.
    Leaf {
        /// Node id; also the key of the payload.
        id: NodeId,
        /// Snapshot of the payload's bounds taken when it was added.
        bounds: Aabb3D<T>,
    },
    /// Internal node.
    Branch {
        /// Node id.
        id: NodeId,
        /// 1 for branches directly above leaves; the root's level is the tree height.
        level: usize,
        /// Union of the children's bounds.
        bounds: Aabb3D<T>,
        /// Child ids, at most `M` once an operation has settled.
        children: Vec<NodeId>,
    },
}

impl<T: Copy> TreeItem<T> {
    /// Node id.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Leaf { id, .. } | Self::Branch { id, .. } => *id,
        }
    }

    /// Bounds of the node. For an empty root this is a zero-sized box at the origin.
    pub fn bounds(&self) -> Aabb3D<T> {
        match self {
            Self::Leaf { bounds, .. } | Self::Branch { bounds, .. } => *bounds,
        }
    }

    /// Height above the leaves: 0 for leaves.
    pub fn level(&self) -> usize {
        match self {
            Self::Leaf { .. } => 0,
            Self::Branch { level, .. } => *level,
        }
    }

    /// True for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Ids of the immediate children; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Branch { children, .. } => children,
        }
    }

    /// True if the node has children to descend into.
    ///
    /// Dual-tree traversals use this to decide which side of a node pair to expand.
    pub fn can_subdivide(&self) -> bool {
        !self.children().is_empty()
    }

    pub(crate) fn set_bounds(&mut self, b: Aabb3D<T>) {
        match self {
            Self::Leaf { bounds, .. } | Self::Branch { bounds, .. } => *bounds = b,
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        match self {
            Self::Branch { children, .. } => children,
            Self::Leaf { id, .. } => panic!("leaf {id:?} has no children"),
        }
    }
}

impl<T: Scalar> TreeItem<T> {
    pub(crate) fn leaf(id: NodeId, bounds: Aabb3D<T>) -> Self {
        Self::Leaf { id, bounds }
    }

    /// An empty branch whose child array never needs to grow past `capacity`.
    pub(crate) fn branch(id: NodeId, level: usize, capacity: usize) -> Self {
        Self::Branch {
            id,
            level,
            bounds: empty_bounds(),
            children: Vec::with_capacity(capacity),
        }
    }
}

/// Where a node sits inside its parent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParentSlot {
    /// The parent branch.
    pub parent: NodeId,
    /// Position in the parent's child array.
    pub slot: usize,
}

/// Placeholder bounds for a branch without children.
pub(crate) fn empty_bounds<T: Scalar>() -> Aabb3D<T> {
    let z = T::zero();
    Aabb3D::new(z, z, z, z, z, z)
}

/// Union of a non-empty sequence of boxes, or `None`.
pub(crate) fn union_all<T: Scalar>(mut it: impl Iterator<Item = Aabb3D<T>>) -> Option<Aabb3D<T>> {
    let first = it.next()?;
    Some(it.fold(first, union_aabb))
}
