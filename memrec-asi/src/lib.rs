//! Aggregate structure identification for memory-layout recovery.
//!
//! Given a set of a-locs (the quasi-variables of a value-set analysis) and
//! the memory accesses a program performs, annotated with address
//! value-sets and access sizes, the engine reconstructs a plausible
//! aggregate shape (arrays, records, scalars) for each a-loc, and the
//! refined partitioning of the a-loc space those shapes imply. The
//! algorithm follows Ramalingam, Field and Tip's aggregate structure
//! identification, driven by the access geometry recovered by the
//! surrounding analysis.
//!
//! The one entry point is [`analyse`]; the abstract domains it consumes
//! live in `memrec-vsa`.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{analyse, Access, AccessId, Asi};
pub use error::AsiError;
pub use types::{AsiType, TypeKind};

pub mod prelude {
    pub use memrec_vsa::{
        ALoc, AbstractStore, BoundedInt, RegionId, RegisterId, Ric, ValueSet, VsaError,
    };

    pub use crate::engine::{analyse, Access, AccessId, Asi};
    pub use crate::error::AsiError;
    pub use crate::types::{AsiType, TypeKind};
}
