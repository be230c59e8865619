//! Value-set abstract domain for static memory-layout recovery.
//!
//! The domain follows the one described by Balakrishnan and Reps in
//! "Analyzing Memory Accesses in x86 Executables" (CC 2004): addresses are
//! abstracted as *value-sets*, maps from memory regions to strided integer
//! ranges (reduced interval congruences). The crate provides the lattice
//! elements and their meet / join / widen / narrow operators, the a-loc
//! quasi-variables that name byte ranges inside regions, and the abstract
//! store that a surrounding analysis threads through a control-flow graph.

pub mod aloc;
pub mod bounded;
pub mod error;
pub mod ric;
pub mod store;
pub mod value_set;

pub use aloc::ALoc;
pub use bounded::BoundedInt;
pub use error::VsaError;
pub use ric::Ric;
pub use store::AbstractStore;
pub use value_set::ValueSet;

/// Identifier of an abstract memory region (a stack frame, the global data
/// section, a heap allocation site).
pub type RegionId = u64;

/// Identifier of a register slot in the abstract store, numbered by the
/// front-end that extracts the accesses.
pub type RegisterId = usize;
