//! Domain error variants.

use thiserror::Error;

/// Errors raised by the abstract-domain primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VsaError {
    /// An arithmetic form with no defined result, such as `∞ − ∞`.
    #[error("indeterminate arithmetic on opposite infinities")]
    IndeterminateArithmetic,
    /// A reduced interval congruence was constructed with a non-positive
    /// stride.
    #[error("RIC stride must be positive, got {0}")]
    RicStrideNonPositive(i64),
}
