//! Engine error variants.

use thiserror::Error;

use memrec_vsa::{ALoc, RegionId, VsaError};

/// Errors raised while recovering aggregate structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AsiError {
    /// An access whose address ranges over infinitely many array elements.
    #[error("access ranges over infinitely many array elements")]
    InfiniteArrayAccess,
    /// Two input a-locs name intersecting byte ranges of one region.
    #[error("a-locs {first} and {second} overlap")]
    OverlappingALocs { first: ALoc, second: ALoc },
    /// Two aggregates that must cover the same number of bytes do not.
    #[error("aggregate size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: i64, actual: i64 },
    /// A type cannot be cut at the requested byte boundary.
    #[error("cannot split a {size}-byte type at byte {at}")]
    InvalidSplit { size: i64, at: i64 },
    /// The address value-set holds no offsets for the region under
    /// inference.
    #[error("address holds no offsets for region {region}")]
    MissingAddressRegion { region: RegionId },
    /// A failure inside the abstract domain.
    #[error(transparent)]
    Vsa(#[from] VsaError),
}
