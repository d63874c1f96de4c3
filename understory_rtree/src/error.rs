// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for configuration and structural validation.

use crate::node::NodeId;

/// Errors reported by [`SpatialIndex`](crate::SpatialIndex).
///
/// Only construction can fail during normal use. The remaining variants are produced by
/// [`SpatialIndex::check_invariants`](crate::SpatialIndex::check_invariants).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The maximum fan-out is below two.
    #[error("max_entries must be at least 2, got {max_entries}")]
    InvalidConfig {
        /// The rejected maximum fan-out.
        max_entries: usize,
    },
    /// A non-root branch holds fewer than `m` or more than `M` children.
    #[error("node {node:?} has {count} children, expected {min}..={max}")]
    FanOut {
        /// Offending branch.
        node: NodeId,
        /// Its child count.
        count: usize,
        /// Lower bound that applies to it.
        min: usize,
        /// Upper bound that applies to it.
        max: usize,
    },
    /// A branch's bounds differ from the union of its children.
    #[error("bounds of node {node:?} are not the union of its children")]
    LooseBounds {
        /// Offending branch.
        node: NodeId,
    },
    /// A leaf sits at a different depth than the others.
    #[error("leaf {leaf:?} is at depth {depth}, expected {expected}")]
    Unbalanced {
        /// Offending leaf.
        leaf: NodeId,
        /// Its depth below the root.
        depth: usize,
        /// Depth of every other leaf.
        expected: usize,
    },
    /// A child's level is not exactly one below its parent's.
    #[error("node {node:?} has level {level}, parent expects {expected}")]
    LevelMismatch {
        /// Offending node.
        node: NodeId,
        /// Its level.
        level: usize,
        /// One less than the parent's level.
        expected: usize,
    },
    /// The parent table disagrees with a branch's child array.
    #[error("parent entry of node {node:?} does not point back to it")]
    BrokenParentLink {
        /// Offending node.
        node: NodeId,
    },
    /// The number of reachable leaves differs from the number of registered payloads.
    #[error("found {leaves} leaves for {payloads} payloads")]
    CountMismatch {
        /// Leaves reachable from the root.
        leaves: usize,
        /// Registered payloads.
        payloads: usize,
    },
}
