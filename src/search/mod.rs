//! Search entry points over an attribute
//!
//! Query evaluation lives elsewhere. This module exposes what it consumes:
//! a `SearchContext` per term, postings fetch, and iterators over matching
//! document ids.

mod context;
mod iterator;
mod predicate;

pub use context::{Hit, SearchContext};
pub use iterator::{collect_hits, SearchIterator, TermFieldMatchData};
pub use predicate::Predicate;
