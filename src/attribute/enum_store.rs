//! Enum dictionary: deduplicated values addressed by stable handles.
//!
//! Entries are reference counted by the cells that point at them. An entry
//! whose count drops to zero is not reused immediately, since a reader on an
//! older snapshot may still resolve its handle. The writer queues it with the
//! generation it died in and releases it through `reclaim` once that
//! generation is below the first used one.

use std::collections::{HashMap, VecDeque};

use super::types::{EnumHandle, Value};
use crate::generation::Generation;

#[derive(Debug, Clone)]
struct EnumEntry {
    value: Value,
    ref_count: u32,
    died_at: Generation,
}

#[derive(Debug, Default)]
pub struct EnumStore {
    entries: Vec<Option<EnumEntry>>,
    lookup: HashMap<Value, u32>,
    free: Vec<u32>,
    dead: VecDeque<(Generation, u32)>,
}

impl EnumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference to `value`, interning it if new.
    pub fn intern(&mut self, value: &Value) -> EnumHandle {
        if let Some(&index) = self.lookup.get(value) {
            if let Some(entry) = self.entries[index as usize].as_mut() {
                entry.ref_count += 1;
            }
            return EnumHandle::new(index);
        }
        let entry = EnumEntry {
            value: value.clone(),
            ref_count: 1,
            died_at: 0,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(entry);
                index
            }
            None => {
                self.entries.push(Some(entry));
                (self.entries.len() - 1) as u32
            }
        };
        self.lookup.insert(value.clone(), index);
        EnumHandle::new(index)
    }

    /// Drop one reference. A dead entry stays resolvable until reclaimed.
    pub fn release(&mut self, handle: EnumHandle, generation: Generation) {
        let Some(Some(entry)) = self.entries.get_mut(handle.index() as usize) else {
            return;
        };
        if entry.ref_count == 0 {
            return;
        }
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            entry.died_at = generation;
            self.dead.push_back((generation, handle.index()));
        }
    }

    /// True when `reclaim(first_used)` has queued entries to look at.
    pub fn has_reclaimable(&self, first_used: Generation) -> bool {
        self.dead.front().map_or(false, |(g, _)| *g < first_used)
    }

    /// Free dead entries that died before `first_used`. Returns how many.
    pub fn reclaim(&mut self, first_used: Generation) -> usize {
        let mut freed = 0;
        while self.dead.front().map_or(false, |(g, _)| *g < first_used) {
            let Some((_, index)) = self.dead.pop_front() else {
                break;
            };
            let slot = &mut self.entries[index as usize];
            // Re-interned, or died again later
            if slot
                .as_ref()
                .map_or(true, |e| e.ref_count > 0 || e.died_at >= first_used)
            {
                continue;
            }
            if let Some(entry) = slot.take() {
                self.lookup.remove(&entry.value);
                self.free.push(index);
                freed += 1;
            }
        }
        freed
    }

    pub fn find(&self, value: &Value) -> Option<EnumHandle> {
        self.lookup.get(value).map(|&i| EnumHandle::new(i))
    }

    pub fn value(&self, handle: EnumHandle) -> Option<&Value> {
        self.entries
            .get(handle.index() as usize)
            .and_then(|e| e.as_ref())
            .map(|e| &e.value)
    }

    pub fn ref_count(&self, handle: EnumHandle) -> u32 {
        self.entries
            .get(handle.index() as usize)
            .and_then(|e| e.as_ref())
            .map_or(0, |e| e.ref_count)
    }

    /// Entries with at least one reference.
    pub fn num_unique_values(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.ref_count > 0)
            .count()
    }

    /// Slots ever allocated, live or not.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.entries.len() * std::mem::size_of::<Option<EnumEntry>>()
            + self
                .entries
                .iter()
                .flatten()
                .map(|e| e.value.as_str().map_or(0, str::len))
                .sum::<usize>()
    }
}
