// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural self-checks.

use bitflags::bitflags;
use smallvec::{SmallVec, smallvec};

use crate::error::Error;
use crate::node::{NodeId, ParentSlot, TreeItem, union_all};
use crate::tree::SpatialIndex;
use crate::types::Scalar;

bitflags! {
    /// Properties verified by [`SpatialIndex::check_invariants`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Checks: u8 {
        /// Non-root branches hold `m..=M` children; the root holds at most `M`.
        const FAN_OUT = 0b0000_0001;
        /// Every branch's bounds equal the union of its children's.
        const BOUNDS  = 0b0000_0010;
        /// All leaves sit at depth `height`, and branch levels step down by one.
        const BALANCE = 0b0000_0100;
        /// The parent table agrees with every child array.
        const PARENTS = 0b0000_1000;
        /// One reachable leaf per registered payload.
        const COUNT   = 0b0001_0000;
        /// Everything above.
        const ALL = Self::FAN_OUT.bits()
            | Self::BOUNDS.bits()
            | Self::BALANCE.bits()
            | Self::PARENTS.bits()
            | Self::COUNT.bits();
    }
}

impl Default for Checks {
    fn default() -> Self {
        Self::ALL
    }
}

impl<T: Scalar, P> SpatialIndex<T, P> {
    /// Walk the whole tree and report the first violated property among `checks`.
    ///
    /// Every public operation leaves the tree in a state that passes [`Checks::ALL`]; this is
    /// meant for tests and debugging, and costs a full traversal.
    pub fn check_invariants(&self, checks: Checks) -> Result<(), Error> {
        let root = self.root;
        if checks.contains(Checks::PARENTS) && self.parent(root).is_some() {
            return Err(Error::BrokenParentLink { node: root });
        }
        if checks.contains(Checks::BALANCE) && self.item(root).level() != self.height {
            return Err(Error::LevelMismatch {
                node: root,
                level: self.item(root).level(),
                expected: self.height,
            });
        }

        let mut leaves = 0;
        let mut stack: SmallVec<[(NodeId, usize); 32]> = smallvec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(item) = self.node(id) else {
                return Err(Error::BrokenParentLink { node: id });
            };
            let (level, bounds, children) = match item {
                TreeItem::Leaf { .. } => {
                    leaves += 1;
                    if checks.contains(Checks::BALANCE) && depth != self.height {
                        return Err(Error::Unbalanced {
                            leaf: id,
                            depth,
                            expected: self.height,
                        });
                    }
                    continue;
                }
                TreeItem::Branch {
                    level,
                    bounds,
                    children,
                    ..
                } => (*level, *bounds, children),
            };

            if checks.contains(Checks::FAN_OUT) {
                let min = if id != root {
                    self.min_entries
                } else if self.height > 1 {
                    2
                } else {
                    usize::from(!self.is_empty())
                };
                let count = children.len();
                if count < min || count > self.max_entries {
                    return Err(Error::FanOut {
                        node: id,
                        count,
                        min,
                        max: self.max_entries,
                    });
                }
            }

            for (slot, &child) in children.iter().enumerate() {
                let Some(child_item) = self.node(child) else {
                    return Err(Error::BrokenParentLink { node: child });
                };
                if checks.contains(Checks::PARENTS)
                    && self.parent(child) != Some(ParentSlot { parent: id, slot })
                {
                    return Err(Error::BrokenParentLink { node: child });
                }
                // Misplaced leaves are reported as `Unbalanced` when they are visited.
                if checks.contains(Checks::BALANCE)
                    && !child_item.is_leaf()
                    && child_item.level() + 1 != level
                {
                    return Err(Error::LevelMismatch {
                        node: child,
                        level: child_item.level(),
                        expected: level - 1,
                    });
                }
                stack.push((child, depth + 1));
            }

            if checks.contains(Checks::BOUNDS) {
                let union = union_all(
                    children
                        .iter()
                        .filter_map(|&c| self.node(c))
                        .map(TreeItem::bounds),
                );
                if union.is_some_and(|u| u != bounds) {
                    return Err(Error::LooseBounds { node: id });
                }
            }
        }

        if checks.contains(Checks::COUNT) && leaves != self.len() {
            return Err(Error::CountMismatch {
                leaves,
                payloads: self.len(),
            });
        }
        Ok(())
    }
}
