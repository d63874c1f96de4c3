// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node split heuristics.
//!
//! Both functions take the `M + 1` boxes of an overflowing node and return two groups of
//! positions into that slice, each with at least `min_entries` members.
//!
//! - [`quadratic_split`]: Guttman's split. Seeds are the pair with the greatest separation
//!   normalized by the extent along its axis; the rest are assigned one at a time, most
//!   constrained entry first.
//! - [`rstar_split`]: the R*-tree split. Entries are sorted along each axis by (low, high); the
//!   axis whose candidate distributions have the smallest total margin wins, and along it the
//!   distribution with the least overlap (then least total volume) is taken.

use core::cmp::Ordering;

use smallvec::{SmallVec, smallvec};

use crate::types::{
    Aabb3D, Axis, Scalar, ScalarAcc, cmp_acc, enlargement, lt, margin, overlap_volume,
    union_aabb, volume,
};

/// Positions into the split input.
pub(crate) type Group = SmallVec<[usize; 16]>;

/// Separation of a seed pair relative to the extent of the whole set along one axis.
///
/// `extent == None` marks an axis where every box has the same coordinates; its normalized
/// separation is zero.
#[derive(Copy, Clone, Debug)]
struct Separation<A> {
    sep: A,
    extent: Option<A>,
}

impl<A: PartialOrd + Copy + core::ops::Mul<Output = A>> Separation<A> {
    /// `self.sep / self.extent > other.sep / other.extent`, without dividing.
    fn greater_than(&self, other: &Self, zero: A) -> bool {
        match (self.extent, other.extent) {
            (Some(ea), Some(eb)) => self.sep * eb > other.sep * ea,
            (None, Some(_)) => other.sep < zero,
            (Some(_), None) => self.sep > zero,
            (None, None) => false,
        }
    }
}

/// Guttman's seed choice: on each axis, the entry with the highest low side and a different
/// entry with the lowest high side; keep the pair with the greatest normalized separation.
fn pick_seeds<T: Scalar>(boxes: &[Aabb3D<T>]) -> (usize, usize) {
    let n = boxes.len();
    assert!(n >= 2, "split requires at least two entries, got {n}");
    let zero = T::acc_zero();
    let mut best: Option<(Separation<ScalarAcc<T>>, usize, usize)> = None;
    for axis in Axis::ALL {
        let mut highest_low = 0;
        let mut lo = boxes[0].min_on(axis);
        let mut hi = boxes[0].max_on(axis);
        for (i, b) in boxes.iter().enumerate().skip(1) {
            if lt(boxes[highest_low].min_on(axis), b.min_on(axis)) {
                highest_low = i;
            }
            if lt(b.min_on(axis), lo) {
                lo = b.min_on(axis);
            }
            if lt(hi, b.max_on(axis)) {
                hi = b.max_on(axis);
            }
        }
        let mut lowest_high: Option<usize> = None;
        for (i, b) in boxes.iter().enumerate() {
            if i == highest_low {
                continue;
            }
            if lowest_high.is_none_or(|j| lt(b.max_on(axis), boxes[j].max_on(axis))) {
                lowest_high = Some(i);
            }
        }
        let Some(lowest_high) = lowest_high else {
            continue;
        };

        let extent = T::widen(hi) - T::widen(lo);
        let sep =
            T::widen(boxes[highest_low].min_on(axis)) - T::widen(boxes[lowest_high].max_on(axis));
        assert!(
            sep <= extent,
            "normalized seed separation exceeds 1 on {axis:?}: {sep:?} > {extent:?}"
        );
        let candidate = if extent > zero {
            Separation {
                sep,
                extent: Some(extent),
            }
        } else {
            Separation {
                sep: zero,
                extent: None,
            }
        };
        let better = match &best {
            None => true,
            Some((b, ..)) => candidate.greater_than(b, zero),
        };
        if better {
            best = Some((candidate, highest_low, lowest_high));
        }
    }
    match best {
        Some((_, a, b)) => (a, b),
        None => panic!("no seed pair found among {n} entries"),
    }
}

/// Guttman split: seed two groups, then repeatedly place the entry with the strongest
/// preference for one group.
///
/// Once a group needs every remaining entry to reach `min_entries`, it receives all of them.
pub(crate) fn quadratic_split<T: Scalar>(
    boxes: &[Aabb3D<T>],
    min_entries: usize,
) -> (Group, Group) {
    let (s1, s2) = pick_seeds(boxes);
    let mut g1: Group = smallvec![s1];
    let mut g2: Group = smallvec![s2];
    let mut b1 = boxes[s1];
    let mut b2 = boxes[s2];
    let mut remaining: Group = (0..boxes.len()).filter(|&i| i != s1 && i != s2).collect();

    while !remaining.is_empty() {
        if g1.len() + remaining.len() <= min_entries {
            g1.extend(remaining.drain(..));
            break;
        }
        if g2.len() + remaining.len() <= min_entries {
            g2.extend(remaining.drain(..));
            break;
        }

        // PickNext: the entry whose enlargement costs differ the most.
        let mut pick = 0;
        let mut best_diff: Option<ScalarAcc<T>> = None;
        for (k, &i) in remaining.iter().enumerate() {
            let d1 = enlargement(&b1, &boxes[i]);
            let d2 = enlargement(&b2, &boxes[i]);
            let diff = if d1 > d2 { d1 - d2 } else { d2 - d1 };
            if best_diff.is_none_or(|b| diff > b) {
                best_diff = Some(diff);
                pick = k;
            }
        }
        let i = remaining.remove(pick);
        let d1 = enlargement(&b1, &boxes[i]);
        let d2 = enlargement(&b2, &boxes[i]);
        let to_first = match cmp_acc(&d1, &d2) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                let v1 = volume(&union_aabb(b1, boxes[i]));
                let v2 = volume(&union_aabb(b2, boxes[i]));
                match cmp_acc(&v1, &v2) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => g1.len() <= g2.len(),
                }
            }
        };
        if to_first {
            g1.push(i);
            b1 = union_aabb(b1, boxes[i]);
        } else {
            g2.push(i);
            b2 = union_aabb(b2, boxes[i]);
        }
    }
    (g1, g2)
}

/// Positions sorted by the low side along `axis`, then by the high side. Stable.
fn sorted_along<T: Scalar>(boxes: &[Aabb3D<T>], axis: Axis) -> Group {
    let mut order: Group = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (&boxes[a], &boxes[b]);
        x.min_on(axis)
            .partial_cmp(&y.min_on(axis))
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                x.max_on(axis)
                    .partial_cmp(&y.max_on(axis))
                    .unwrap_or(Ordering::Equal)
            })
    });
    order
}

/// Prefix and suffix unions over `order`: `prefix[k]` covers `order[..=k]`, `suffix[k]` covers
/// `order[k..]`.
fn prefix_suffix<T: Scalar>(
    boxes: &[Aabb3D<T>],
    order: &[usize],
) -> (SmallVec<[Aabb3D<T>; 16]>, SmallVec<[Aabb3D<T>; 16]>) {
    let mut prefix: SmallVec<[Aabb3D<T>; 16]> = SmallVec::with_capacity(order.len());
    for &i in order {
        let bb = match prefix.last() {
            Some(prev) => union_aabb(*prev, boxes[i]),
            None => boxes[i],
        };
        prefix.push(bb);
    }
    let mut suffix: SmallVec<[Aabb3D<T>; 16]> = SmallVec::with_capacity(order.len());
    for &i in order.iter().rev() {
        let bb = match suffix.last() {
            Some(prev) => union_aabb(boxes[i], *prev),
            None => boxes[i],
        };
        suffix.push(bb);
    }
    suffix.reverse();
    (prefix, suffix)
}

/// R*-tree split: ChooseSplitAxis by total margin, then ChooseSplitIndex by overlap and volume.
///
/// Candidate distributions put the first `k` sorted entries in one group for
/// `k` in `min_entries..=n - min_entries`, which is `M - 2m + 2` candidates for `n = M + 1`.
pub(crate) fn rstar_split<T: Scalar>(boxes: &[Aabb3D<T>], min_entries: usize) -> (Group, Group) {
    let n = boxes.len();
    assert!(n >= 2, "split requires at least two entries, got {n}");
    let min = min_entries.clamp(1, n / 2);

    let mut best_axis: Option<(ScalarAcc<T>, Group)> = None;
    for axis in Axis::ALL {
        let order = sorted_along(boxes, axis);
        let (prefix, suffix) = prefix_suffix(boxes, &order);
        let mut total = T::acc_zero();
        for k in min..=(n - min) {
            total = total + margin(&prefix[k - 1]) + margin(&suffix[k]);
        }
        if best_axis.as_ref().is_none_or(|(m, _)| total < *m) {
            best_axis = Some((total, order));
        }
    }
    let Some((_, order)) = best_axis else {
        unreachable!("there are always three axes");
    };

    let (prefix, suffix) = prefix_suffix(boxes, &order);
    let mut best: Option<(usize, ScalarAcc<T>, ScalarAcc<T>)> = None;
    for k in min..=(n - min) {
        let overlap = overlap_volume(&prefix[k - 1], &suffix[k]);
        let vol = volume(&prefix[k - 1]) + volume(&suffix[k]);
        let better = match &best {
            None => true,
            Some((_, bo, bv)) => match cmp_acc(&overlap, bo) {
                Ordering::Less => true,
                Ordering::Equal => vol < *bv,
                Ordering::Greater => false,
            },
        };
        if better {
            best = Some((k, overlap, vol));
        }
    }
    let Some((k, ..)) = best else {
        unreachable!("at least one distribution exists when min <= n / 2");
    };
    (order[..k].iter().copied().collect(), order[k..].iter().copied().collect())
}
