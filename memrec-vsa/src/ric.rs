//! Reduced interval congruences.

use std::fmt;

use num_integer::{gcd, lcm};

use crate::bounded::BoundedInt;
use crate::error::VsaError;

/// A reduced interval congruence: the set of integers
/// `{ stride · k + offset : start ≤ k ≤ end }`.
///
/// `Ric::new(2, 0.into(), 4.into(), 1)` denotes `2 · [0, 4] + 1 =
/// {1, 3, 5, 7, 9}`. The bounds may be infinite; `stride` and `offset` are
/// always finite and `stride ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ric {
    stride: i64,
    start: BoundedInt,
    end: BoundedInt,
    offset: i64,
}

impl Ric {
    /// Build a RIC, rejecting non-positive strides.
    pub fn new(
        stride: i64,
        start: BoundedInt,
        end: BoundedInt,
        offset: i64,
    ) -> Result<Self, VsaError> {
        if stride <= 0 {
            return Err(VsaError::RicStrideNonPositive(stride));
        }

        Ok(Self {
            stride,
            start,
            end,
            offset,
        })
    }

    /// The empty set, encoded as a range no index can satisfy.
    pub const fn bottom() -> Self {
        Self {
            stride: 1,
            start: BoundedInt::PlusInfinity,
            end: BoundedInt::MinusInfinity,
            offset: 0,
        }
    }

    /// The set of every integer.
    pub const fn top() -> Self {
        Self {
            stride: 1,
            start: BoundedInt::MinusInfinity,
            end: BoundedInt::PlusInfinity,
            offset: 0,
        }
    }

    /// The singleton set `{value}`.
    pub const fn constant(value: i64) -> Self {
        Self {
            stride: 1,
            start: BoundedInt::Finite(0),
            end: BoundedInt::Finite(0),
            offset: value,
        }
    }

    pub const fn stride(&self) -> i64 {
        self.stride
    }

    pub const fn start(&self) -> BoundedInt {
        self.start
    }

    pub const fn end(&self) -> BoundedInt {
        self.end
    }

    pub const fn offset(&self) -> i64 {
        self.offset
    }

    pub fn is_bottom(&self) -> bool {
        self.start.is_plus_infinity() && self.end.is_minus_infinity()
    }

    pub fn is_top(&self) -> bool {
        self.start.is_minus_infinity() && self.end.is_plus_infinity() && self.stride == 1
    }

    /// Whether the set holds exactly one value.
    pub fn is_constant(&self) -> bool {
        self.start == self.end && self.start.is_finite()
    }

    /// The single held value, when there is one.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            self.lower().as_finite()
        } else {
            None
        }
    }

    /// Smallest denoted value: `offset + stride · start`.
    pub fn lower(&self) -> BoundedInt {
        self.project(self.start)
    }

    /// Largest denoted value: `offset + stride · end`.
    pub fn upper(&self) -> BoundedInt {
        self.project(self.end)
    }

    fn project(&self, index: BoundedInt) -> BoundedInt {
        match index {
            BoundedInt::Finite(k) => {
                BoundedInt::Finite(self.offset.saturating_add(self.stride.saturating_mul(k)))
            }
            infinite => infinite,
        }
    }

    /// Shift every denoted value by `amount`. Infinite bounds are invariant
    /// under translation.
    pub fn translate(&mut self, amount: i64) {
        self.offset = self.offset.saturating_add(amount);
    }

    /// Drop the lower bound, extending the set down to `−∞`.
    pub fn remove_lower_bound(&mut self) {
        self.start = BoundedInt::MinusInfinity;
    }

    /// Drop the upper bound, extending the set up to `+∞`.
    pub fn remove_upper_bound(&mut self) {
        self.end = BoundedInt::PlusInfinity;
    }

    /// Whether every value denoted by `self` is denoted by `rhs`.
    pub fn is_subset(&self, rhs: &Ric) -> bool {
        if self.is_bottom() {
            return true;
        }

        if rhs.is_bottom() {
            return false;
        }

        if rhs.is_top() {
            return true;
        }

        if self.is_top() {
            return false;
        }

        // A singleton only needs to land on the rhs grid within bounds.
        if let Some(value) = self.as_constant() {
            let delta = value - rhs.offset;
            if delta.rem_euclid(rhs.stride) != 0 {
                return false;
            }

            let index = BoundedInt::finite(delta.div_euclid(rhs.stride));
            return rhs.start <= index && index <= rhs.end;
        }

        // Every element of self lies on the rhs grid only if the rhs stride
        // divides ours and the offsets agree modulo the rhs stride.
        if self.stride % rhs.stride != 0 {
            return false;
        }

        if (self.offset - rhs.offset).rem_euclid(rhs.stride) != 0 {
            return false;
        }

        let lower_index = (self.lower() - rhs.offset).div_trunc(rhs.stride);
        let upper_index = (self.upper() - rhs.offset).div_trunc(rhs.stride);

        rhs.start <= lower_index && upper_index <= rhs.end
    }

    /// Overwrite `self` with the intersection of `self` and `rhs`.
    pub fn meet_with(&mut self, rhs: &Ric) {
        if self.is_bottom() || rhs.is_top() {
            return;
        }

        if rhs.is_bottom() {
            *self = Self::bottom();
            return;
        }

        if self.is_top() {
            *self = *rhs;
            return;
        }

        let lo = self.lower().max(rhs.lower());
        let hi = self.upper().min(rhs.upper());

        if lo > hi {
            *self = Self::bottom();
            return;
        }

        let stride = lcm(self.stride, rhs.stride);

        // One stride-wide window holds exactly one representative of every
        // residue class, so scanning it finds the common value if any exists.
        let base = match (lo, hi) {
            (BoundedInt::Finite(l), _) => l,
            (_, BoundedInt::Finite(h)) => h - (stride - 1),
            _ => 0,
        };

        for i in 0..stride {
            let candidate = base + i;

            if let BoundedInt::Finite(h) = hi {
                if candidate > h {
                    break;
                }
            }

            if (candidate - self.offset).rem_euclid(self.stride) != 0 {
                continue;
            }

            if (candidate - rhs.offset).rem_euclid(rhs.stride) != 0 {
                continue;
            }

            let start = if lo.is_minus_infinity() {
                BoundedInt::MinusInfinity
            } else {
                BoundedInt::finite(0)
            };

            let end = match hi {
                BoundedInt::Finite(h) => BoundedInt::finite((h - candidate) / stride),
                _ => BoundedInt::PlusInfinity,
            };

            *self = Self {
                stride,
                start,
                end,
                offset: candidate,
            };
            return;
        }

        // No residue class satisfies both congruences.
        *self = Self::bottom();
    }

    /// Overwrite `self` with a single RIC over-approximating the union of
    /// `self` and `rhs`.
    pub fn join_with(&mut self, rhs: &Ric) {
        if self.is_top() || rhs.is_bottom() {
            return;
        }

        if self.is_bottom() {
            *self = *rhs;
            return;
        }

        if rhs.is_top() {
            *self = Self::top();
            return;
        }

        let lo = self.lower().min(rhs.lower());
        let hi = self.upper().max(rhs.upper());

        let mut stride = gcd(self.stride, rhs.stride);

        // Misaligned offsets force a finer stride.
        let misalign = (self.offset - rhs.offset).abs() % stride;
        if misalign != 0 {
            stride = gcd(stride, misalign);
        }

        // Anchor a lower-unbounded result at its upper end, and an entirely
        // unbounded one on our own residue, so no input element is lost.
        let (start, end, offset) = match (lo, hi) {
            (BoundedInt::Finite(l), BoundedInt::Finite(h)) => (
                BoundedInt::finite(0),
                BoundedInt::finite((h - l) / stride),
                l,
            ),
            (BoundedInt::Finite(l), _) => (BoundedInt::finite(0), BoundedInt::PlusInfinity, l),
            (_, BoundedInt::Finite(h)) => (BoundedInt::MinusInfinity, BoundedInt::finite(0), h),
            _ => (
                BoundedInt::MinusInfinity,
                BoundedInt::PlusInfinity,
                self.offset.rem_euclid(stride),
            ),
        };

        *self = Self {
            stride,
            start,
            end,
            offset,
        };
    }

    /// Widen `self` against `rhs`: a bound that grew escapes to its
    /// infinity. No-op when the strides differ or the offsets are not
    /// aligned on the shared grid.
    pub fn widen_with(&mut self, rhs: &Ric) {
        if self.stride != rhs.stride {
            return;
        }

        let delta = rhs.offset - self.offset;
        if delta % self.stride != 0 {
            return;
        }

        // Express the rhs bounds as indexes on our own grid.
        let steps = delta / self.stride;
        let start = rhs.start + steps;
        let end = rhs.end + steps;

        if start < self.start {
            self.start = BoundedInt::MinusInfinity;
        }

        if end > self.end {
            self.end = BoundedInt::PlusInfinity;
        }
    }

    /// Narrow `self` against `rhs`: an infinite bound left behind by
    /// widening adopts the rhs's finite bound. Same preconditions as
    /// [`Ric::widen_with`].
    pub fn narrow_with(&mut self, rhs: &Ric) {
        if self.stride != rhs.stride {
            return;
        }

        let delta = rhs.offset - self.offset;
        if delta % self.stride != 0 {
            return;
        }

        let steps = delta / self.stride;

        if self.start.is_minus_infinity() {
            self.start = rhs.start + steps;
        }

        if self.end.is_plus_infinity() {
            self.end = rhs.end + steps;
        }
    }
}

impl fmt::Display for Ric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "bottom")
        } else if self.is_top() {
            write!(f, "top")
        } else {
            write!(
                f,
                "{} * [{}, {}] + {}",
                self.stride, self.start, self.end, self.offset
            )
        }
    }
}
