//! Generation-based reclamation
//!
//! A small epoch-reclamation library with no knowledge of what it protects:
//! - `GenerationHandler` - monotonic generation counter plus live reader pins
//! - `GenerationGuard` - a reader's pin on one generation
//! - `GenerationHolder` - writer-side queue of retired resources
//!
//! # Protocol
//!
//! Readers call `take_guard()` before touching shared storage and drop the
//! guard when done. They never lock and never wait.
//!
//! The single writer publishes new storage, hands the storage it replaced to
//! the holder tagged with the *current* generation, then calls
//! `inc_generation()`. Periodically it calls `update_first_used_generation()`
//! followed by `GenerationHolder::remove_all_old_generations(first_used)`.
//! Anything tagged below the first used generation can no longer be observed
//! by a reader, because a pin on that generation would have kept the floor
//! from advancing.

mod handler;
mod holder;

pub use handler::{Generation, GenerationGuard, GenerationHandler};
pub use holder::GenerationHolder;
