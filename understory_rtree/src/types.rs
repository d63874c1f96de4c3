// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::{Hash, Hasher};

/// One of the three coordinate axes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    /// All axes, in `x`, `y`, `z` order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];
}

/// Axis-aligned bounding box in 3D.
///
/// Boxes are closed: two boxes that share only a face, edge, or corner intersect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Aabb3D<T> {
    /// Minimum x
    pub min_x: T,
    /// Minimum y
    pub min_y: T,
    /// Minimum z
    pub min_z: T,
    /// Maximum x
    pub max_x: T,
    /// Maximum y
    pub max_y: T,
    /// Maximum z
    pub max_z: T,
}

impl<T> Aabb3D<T> {
    /// Create a new AABB from min/max corners.
    pub const fn new(min_x: T, min_y: T, min_z: T, max_x: T, max_y: T, max_z: T) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }
}

impl<T: Copy> Aabb3D<T> {
    /// The lower bound along `axis`.
    #[inline]
    pub fn min_on(&self, axis: Axis) -> T {
        match axis {
            Axis::X => self.min_x,
            Axis::Y => self.min_y,
            Axis::Z => self.min_z,
        }
    }

    /// The upper bound along `axis`.
    #[inline]
    pub fn max_on(&self, axis: Axis) -> T {
        match axis {
            Axis::X => self.max_x,
            Axis::Y => self.max_y,
            Axis::Z => self.max_z,
        }
    }
}

impl<T: Copy + PartialOrd> Aabb3D<T> {
    /// A degenerate box covering a single point.
    pub fn from_point(x: T, y: T, z: T) -> Self {
        Self::new(x, y, z, x, y, z)
    }

    /// Whether this AABB contains the point (inclusive).
    pub fn contains_point(&self, x: T, y: T, z: T) -> bool {
        le(self.min_x, x)
            && le(self.min_y, y)
            && le(self.min_z, z)
            && le(x, self.max_x)
            && le(y, self.max_y)
            && le(z, self.max_z)
    }

    /// The intersection of two AABBs. May be empty (inverted); see [`Aabb3D::is_empty`].
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            min_x: max_t(self.min_x, other.min_x),
            min_y: max_t(self.min_y, other.min_y),
            min_z: max_t(self.min_z, other.min_z),
            max_x: min_t(self.max_x, other.max_x),
            max_y: min_t(self.max_y, other.max_y),
            max_z: min_t(self.max_z, other.max_z),
        }
    }

    /// The smallest AABB containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        union_aabb(*self, *other)
    }

    /// True iff the projections of both boxes overlap (inclusive) on all three axes.
    pub fn intersects(&self, other: &Self) -> bool {
        le(self.min_x, other.max_x)
            && le(other.min_x, self.max_x)
            && le(self.min_y, other.max_y)
            && le(other.min_y, self.max_y)
            && le(self.min_z, other.max_z)
            && le(other.min_z, self.max_z)
    }

    /// True iff `other` lies entirely inside this box (inclusive).
    pub fn contains(&self, other: &Self) -> bool {
        le(self.min_x, other.min_x)
            && le(self.min_y, other.min_y)
            && le(self.min_z, other.min_z)
            && le(other.max_x, self.max_x)
            && le(other.max_y, self.max_y)
            && le(other.max_z, self.max_z)
    }

    /// Return true if the AABB is inverted on any axis. Assumes no NaN.
    ///
    /// Zero-extent boxes (points, flat triangles) are not empty.
    pub fn is_empty(&self) -> bool {
        lt(self.max_x, self.min_x) || lt(self.max_y, self.min_y) || lt(self.max_z, self.min_z)
    }
}

impl<T: Scalar> Aabb3D<T> {
    /// Center of the box.
    pub fn center(&self) -> [T; 3] {
        [
            T::mid(self.min_x, self.max_x),
            T::mid(self.min_y, self.max_y),
            T::mid(self.min_z, self.max_z),
        ]
    }
}

impl Aabb3D<f32> {
    /// Create an AABB from origin and size in f32.
    pub const fn from_xyzwhd(x: f32, y: f32, z: f32, w: f32, h: f32, d: f32) -> Self {
        Self::new(x, y, z, x + w, y + h, z + d)
    }
}

impl Aabb3D<f64> {
    /// Create an AABB from origin and size in f64.
    pub const fn from_xyzwhd(x: f64, y: f64, z: f64, w: f64, h: f64, d: f64) -> Self {
        Self::new(x, y, z, x + w, y + h, z + d)
    }
}

/// Integer boxes. Every coordinate must lie within `±2^39` for [`volume`] and the index's
/// cost metrics to stay inside `i128`.
impl Aabb3D<i64> {
    /// Create an AABB from origin and size in i64.
    pub const fn from_xyzwhd(x: i64, y: i64, z: i64, w: i64, h: i64, d: i64) -> Self {
        Self::new(x, y, z, x + w, y + h, z + d)
    }
}

/// Anything that can be placed in the index.
///
/// The index calls [`Bounded::bounds`] once, when the payload is added, and keeps a copy of the
/// box. Later changes to whatever the payload describes are not seen by the index.
pub trait Bounded<T> {
    /// The axis-aligned bounds of this payload.
    fn bounds(&self) -> Aabb3D<T>;
}

impl<T, B: Bounded<T> + ?Sized> Bounded<T> for &B {
    fn bounds(&self) -> Aabb3D<T> {
        (**self).bounds()
    }
}

/// A payload made of a caller key and a box.
///
/// Equality and hashing only look at `key`, so floating-point boxes can be indexed under an
/// integer (or any other hashable) identity.
#[derive(Copy, Clone, Debug)]
pub struct Keyed<K, T> {
    /// Caller identity for this entry.
    pub key: K,
    /// Bounds reported to the index.
    pub aabb: Aabb3D<T>,
}

impl<K, T> Keyed<K, T> {
    /// Pair a key with a box.
    pub const fn new(key: K, aabb: Aabb3D<T>) -> Self {
        Self { key, aabb }
    }
}

impl<K: PartialEq, T> PartialEq for Keyed<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, T> Eq for Keyed<K, T> {}

impl<K: Hash, T> Hash for Keyed<K, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K, T: Copy> Bounded<T> for Keyed<K, T> {
    fn bounds(&self) -> Aabb3D<T> {
        self.aabb
    }
}

/// Numeric scalar abstraction for 3D AABBs.
///
/// This trait provides the minimal set of operations required for volume, margin and
/// center-distance metrics, and an associated widened accumulator type for them
/// (e.g., f32→f64, i64→i128).
///
/// Integer volumes are products of three extents, so `i64` coordinates must stay within
/// `±2^39` for the `i128` accumulator not to overflow.
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Widened accumulator type suitable for volume/cost computations.
    type Acc: Copy
        + PartialOrd
        + core::ops::Add<Output = Self::Acc>
        + core::ops::Sub<Output = Self::Acc>
        + core::ops::Mul<Output = Self::Acc>
        + Debug;

    /// Subtract two scalar values: a - b.
    fn sub(a: Self, b: Self) -> Self;

    /// Zero value for the scalar type.
    fn zero() -> Self;

    /// Max of the scalar value and zero.
    fn max_zero(v: Self) -> Self;

    /// Midpoint between a and b.
    fn mid(a: Self, b: Self) -> Self;

    /// Convert a scalar to the accumulator type.
    fn widen(v: Self) -> Self::Acc;

    /// Zero value for the accumulator type.
    fn acc_zero() -> Self::Acc;
}

impl Scalar for f32 {
    type Acc = f64;

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn max_zero(v: Self) -> Self {
        v.max(0.0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v as f64
    }

    #[inline]
    fn acc_zero() -> Self::Acc {
        0.0
    }
}

impl Scalar for f64 {
    type Acc = Self;

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn max_zero(v: Self) -> Self {
        v.max(0.0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v
    }

    #[inline]
    fn acc_zero() -> Self::Acc {
        0.0
    }
}

impl Scalar for i64 {
    type Acc = i128;

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a.saturating_sub(b)
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn max_zero(v: Self) -> Self {
        v.max(0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        // Average without overflow: (a & b) + ((a ^ b) >> 1)
        (a & b) + ((a ^ b) >> 1)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v as i128
    }

    #[inline]
    fn acc_zero() -> Self::Acc {
        0
    }
}

/// Helper alias for the widened accumulator type associated with a scalar `T`.
pub type ScalarAcc<T> = <T as Scalar>::Acc;

#[inline]
fn extent<T: Scalar>(a: &Aabb3D<T>, axis: Axis) -> T::Acc {
    T::widen(T::max_zero(T::sub(a.max_on(axis), a.min_on(axis))))
}

/// Volume of an AABB in the widened accumulator type. Inverted boxes have zero volume.
///
/// For `i64` boxes this overflows once extents pass `2^42` per axis.
#[inline]
pub fn volume<T: Scalar>(a: &Aabb3D<T>) -> T::Acc {
    extent(a, Axis::X) * extent(a, Axis::Y) * extent(a, Axis::Z)
}

/// Sum of the lengths of all twelve edges: `4 * (dx + dy + dz)`.
#[inline]
pub fn margin<T: Scalar>(a: &Aabb3D<T>) -> T::Acc {
    let half = extent(a, Axis::X) + extent(a, Axis::Y) + extent(a, Axis::Z);
    let double = half + half;
    double + double
}

/// Volume shared by two boxes; zero when they are disjoint or only touch.
#[inline]
pub fn overlap_volume<T: Scalar>(a: &Aabb3D<T>, b: &Aabb3D<T>) -> T::Acc {
    volume(&a.intersect(b))
}

/// `volume(union(a, b)) - volume(a)`: how much `a` must grow to cover `b`. Never negative.
#[inline]
pub fn enlargement<T: Scalar>(a: &Aabb3D<T>, b: &Aabb3D<T>) -> T::Acc {
    volume(&union_aabb(*a, *b)) - volume(a)
}

/// Squared distance between the centers of two boxes, scaled by 4.
///
/// Uses doubled centers (`min + max`) so integer coordinates keep full precision.
pub(crate) fn center_distance_sq4<T: Scalar>(a: &Aabb3D<T>, b: &Aabb3D<T>) -> T::Acc {
    let mut sum = T::acc_zero();
    for axis in Axis::ALL {
        let ca = T::widen(a.min_on(axis)) + T::widen(a.max_on(axis));
        let cb = T::widen(b.min_on(axis)) + T::widen(b.max_on(axis));
        let d = ca - cb;
        sum = sum + d * d;
    }
    sum
}

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

pub(crate) fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

pub(crate) fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}

/// Total order for accumulator values; incomparable values (NaN) compare equal.
pub(crate) fn cmp_acc<A: PartialOrd>(a: &A, b: &A) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

pub(crate) fn union_aabb<T: PartialOrd + Copy>(a: Aabb3D<T>, b: Aabb3D<T>) -> Aabb3D<T> {
    Aabb3D {
        min_x: min_t(a.min_x, b.min_x),
        min_y: min_t(a.min_y, b.min_y),
        min_z: min_t(a.min_z, b.min_z),
        max_x: max_t(a.max_x, b.max_x),
        max_y: max_t(a.max_y, b.max_y),
        max_z: max_t(a.max_z, b.max_z),
    }
}
