// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fan-out and overflow policy settings.

use crate::error::Error;

/// What to do when a node would exceed `M` children.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverflowPolicy {
    /// Always split, distributing entries with Guttman's quadratic-cost heuristic.
    Guttman,
    /// R*-tree overflow treatment: on the first overflow at a non-root level during an insert,
    /// reinsert the entries farthest from the node's center; otherwise split with the
    /// margin/overlap-minimizing R*-tree heuristic. Subtree choice also minimizes overlap
    /// enlargement just above the leaves.
    #[default]
    RStar,
}

/// Construction parameters for [`SpatialIndex`](crate::SpatialIndex).
///
/// ```
/// use understory_rtree::{Config, OverflowPolicy};
///
/// let (m, max) = Config::default()
///     .with_max_entries(8)
///     .with_min_entries(7) // out of range, clamped to 8 / 2
///     .with_policy(OverflowPolicy::Guttman)
///     .resolve()
///     .unwrap();
/// assert_eq!((m, max), (4, 8));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum children per node (`M`). Must be at least 2.
    pub max_entries: usize,
    /// Minimum children per non-root node (`m`). `None` means `M / 2`.
    pub min_entries: Option<usize>,
    /// Overflow treatment.
    pub policy: OverflowPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 10,
            min_entries: None,
            policy: OverflowPolicy::RStar,
        }
    }
}

impl Config {
    /// Set `M`.
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set `m`. Values outside `1..=M/2` are replaced by `M / 2` when resolved.
    pub const fn with_min_entries(mut self, min_entries: usize) -> Self {
        self.min_entries = Some(min_entries);
        self
    }

    /// Set the overflow policy.
    pub const fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate and return the effective `(m, M)`.
    pub fn resolve(&self) -> Result<(usize, usize), Error> {
        let max = self.max_entries;
        if max < 2 {
            return Err(Error::InvalidConfig { max_entries: max });
        }
        let half = max / 2;
        let min = match self.min_entries {
            Some(m) if (1..=half).contains(&m) => m,
            _ => half,
        };
        Ok((min, max))
    }

    /// Number of entries moved out of an overflowing node by forced reinsertion: `⌊0.3·M⌋`.
    pub(crate) const fn reinsert_count(max_entries: usize) -> usize {
        max_entries * 3 / 10
    }
}
