//! Integers extended with explicit infinities.

use std::fmt;
use std::ops;

use crate::error::VsaError;

/// An integer extended with `−∞` and `+∞`.
///
/// The variant order gives the total order for free: `−∞` below every finite
/// value, `+∞` above, finite values compared by magnitude. Finite arithmetic
/// saturates at the representable extremes rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoundedInt {
    MinusInfinity,
    Finite(i64),
    PlusInfinity,
}

impl BoundedInt {
    /// Construct a finite value.
    pub const fn finite(value: i64) -> Self {
        Self::Finite(value)
    }

    pub const fn is_plus_infinity(&self) -> bool {
        matches!(self, Self::PlusInfinity)
    }

    pub const fn is_minus_infinity(&self) -> bool {
        matches!(self, Self::MinusInfinity)
    }

    pub const fn is_finite(&self) -> bool {
        matches!(self, Self::Finite(_))
    }

    /// The finite value, if there is one.
    pub const fn as_finite(&self) -> Option<i64> {
        match self {
            Self::Finite(value) => Some(*value),
            _ => None,
        }
    }

    /// Add two bounded values, returning an error on the indeterminate form
    /// `∞ + (−∞)`.
    pub fn checked_add(self, rhs: Self) -> Result<Self, VsaError> {
        use BoundedInt::*;

        match (self, rhs) {
            (PlusInfinity, MinusInfinity) | (MinusInfinity, PlusInfinity) => {
                Err(VsaError::IndeterminateArithmetic)
            }
            (PlusInfinity, _) | (_, PlusInfinity) => Ok(PlusInfinity),
            (MinusInfinity, _) | (_, MinusInfinity) => Ok(MinusInfinity),
            (Finite(a), Finite(b)) => Ok(Finite(a.saturating_add(b))),
        }
    }

    /// Subtract two bounded values, returning an error on the indeterminate
    /// form `∞ − ∞`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, VsaError> {
        use BoundedInt::*;

        let negated = match rhs {
            PlusInfinity => MinusInfinity,
            MinusInfinity => PlusInfinity,
            Finite(b) => Finite(b.saturating_neg()),
        };

        self.checked_add(negated)
    }

    /// Multiply by a finite integer; the sign of `k` flips infinities.
    /// `±∞ · 0` has no defined result.
    pub fn scale(self, k: i64) -> Result<Self, VsaError> {
        use BoundedInt::*;

        match self {
            Finite(value) => Ok(Finite(value.saturating_mul(k))),
            _ if k == 0 => Err(VsaError::IndeterminateArithmetic),
            PlusInfinity if k > 0 => Ok(PlusInfinity),
            PlusInfinity => Ok(MinusInfinity),
            MinusInfinity if k > 0 => Ok(MinusInfinity),
            MinusInfinity => Ok(PlusInfinity),
        }
    }

    /// Divide by a finite positive integer, truncating toward zero.
    /// Infinities absorb.
    pub fn div_trunc(self, k: i64) -> Self {
        debug_assert!(k > 0);

        match self {
            Self::Finite(value) => Self::Finite(value / k),
            infinite => infinite,
        }
    }
}

impl From<i64> for BoundedInt {
    fn from(value: i64) -> Self {
        Self::Finite(value)
    }
}

// Translation by a finite amount never hits an indeterminate form, so the
// standard operators stay infallible.
impl ops::Add<i64> for BoundedInt {
    type Output = BoundedInt;

    fn add(self, rhs: i64) -> BoundedInt {
        match self {
            Self::Finite(value) => Self::Finite(value.saturating_add(rhs)),
            infinite => infinite,
        }
    }
}

impl ops::Sub<i64> for BoundedInt {
    type Output = BoundedInt;

    fn sub(self, rhs: i64) -> BoundedInt {
        self + rhs.saturating_neg()
    }
}

impl fmt::Display for BoundedInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinusInfinity => write!(f, "-inf"),
            Self::Finite(value) => write!(f, "{value}"),
            Self::PlusInfinity => write!(f, "+inf"),
        }
    }
}
