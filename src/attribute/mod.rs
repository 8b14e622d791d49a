//! Attribute subsystem: in-memory columns keyed by document id
//!
//! One writer thread owns an `AttributeVector`; any number of reader threads
//! hold `AttributeReader` handles and read without locking.
//!
//! # Invariants
//!
//! - Readers observe only committed state, never a partial change
//! - Document ids below the committed limit a reader captured stay readable
//!   for the life of its `ReadGuard`
//! - Retired storage and dead dictionary entries are reclaimed only after
//!   every reader that could see them has released its generation
//! - Changes are applied in the order they were queued

mod change;
pub(crate) mod column;
mod config;
mod enum_store;
mod errors;
mod modifier;
mod reader;
mod status;
mod types;
mod vector;

pub use change::{apply_arithmetic, apply_change, Applied, ArithOp, Change, ChangeVector, WeightOp};
pub use config::AttributeConfig;
pub use enum_store::EnumStore;
pub use errors::{AttributeError, AttributeResult};
pub use modifier::{EnumModifier, MutationMarkers, ValueModifier};
pub use reader::{AttributeReader, EnumReadGuard, ReadGuard, ReadValue};
pub use status::Status;
pub use types::{BasicType, CollectionType, DocId, EnumHandle, Value, Weighted};
pub use vector::AttributeVector;
