//! aerocolumn - A generation-guarded columnar attribute store
//!
//! Per-field value columns with lock-free reads concurrent with a single
//! writer, batched commits, and a self-describing on-disk format.

pub mod attribute;
pub mod cli;
pub mod generation;
pub mod observability;
pub mod persistence;
pub mod reference;
pub mod search;
