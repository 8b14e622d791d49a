//! GenerationHolder - deferred reclamation queue
//!
//! Storage the writer replaces is not dropped on the spot. It is handed to
//! the holder together with the generation that was current when it was
//! retired, and dropped once `remove_all_old_generations` is called with a
//! first used generation above that tag.

use std::any::Any;
use std::collections::VecDeque;

use super::Generation;

struct HeldEntry {
    generation: Generation,
    bytes: usize,
    _resource: Box<dyn Any + Send>,
}

/// Writer-owned queue of retired resources, oldest first.
#[derive(Default)]
pub struct GenerationHolder {
    entries: VecDeque<HeldEntry>,
    held_bytes: usize,
}

impl GenerationHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retire `resource`, tagged with the generation current at retirement.
    ///
    /// `bytes` is only used for accounting.
    pub fn hold<T: Send + 'static>(&mut self, generation: Generation, resource: T, bytes: usize) {
        debug_assert!(
            self.entries.back().map_or(true, |e| e.generation <= generation),
            "retirement generations must not go backwards"
        );
        self.held_bytes += bytes;
        self.entries.push_back(HeldEntry {
            generation,
            bytes,
            _resource: Box::new(resource),
        });
    }

    /// Drop every entry tagged below `first_used`. Returns how many were dropped.
    pub fn remove_all_old_generations(&mut self, first_used: Generation) -> usize {
        let mut removed = 0;
        while self
            .entries
            .front()
            .map_or(false, |entry| entry.generation < first_used)
        {
            if let Some(entry) = self.entries.pop_front() {
                self.held_bytes -= entry.bytes;
                removed += 1;
            }
        }
        removed
    }

    /// Drop everything regardless of generation. Only safe without readers.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.held_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently retained.
    pub fn held_bytes(&self) -> usize {
        self.held_bytes
    }
}

impl std::fmt::Debug for GenerationHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationHolder")
            .field("entries", &self.entries.len())
            .field("held_bytes", &self.held_bytes)
            .finish()
    }
}
