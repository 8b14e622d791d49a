//! Chunked copy-on-write column storage.
//!
//! `ColumnData` is the unit the writer publishes to readers. Cloning it only
//! clones chunk pointers; the writer copies a chunk the first time it touches
//! it after a publish, so readers keep the chunk contents they loaded.

use std::sync::Arc;

use parking_lot::RwLock;

use super::enum_store::EnumStore;
use super::types::{BasicType, CollectionType, DocId, EnumHandle, Value, Weighted};

pub(crate) const DOCS_PER_CHUNK: usize = 1024;

/// One stored value. `handle` is `UNDEFINED` for columns without a dictionary.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slot {
    pub value: Value,
    pub weight: i32,
    pub handle: EnumHandle,
}

impl Slot {
    pub fn new(value: Value, weight: i32, handle: EnumHandle) -> Self {
        Self {
            value,
            weight,
            handle,
        }
    }

    pub fn to_weighted(&self) -> Weighted<Value> {
        Weighted::new(self.value.clone(), self.weight)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Chunk {
    Single(Vec<Slot>),
    Multi(Vec<Vec<Slot>>),
}

impl Chunk {
    fn doc(&self, offset: usize) -> &[Slot] {
        match self {
            Chunk::Single(v) => std::slice::from_ref(&v[offset]),
            Chunk::Multi(v) => &v[offset],
        }
    }

    fn estimated_bytes(&self) -> usize {
        let slot = std::mem::size_of::<Slot>();
        let strings = |slots: &[Slot]| -> usize {
            slots
                .iter()
                .map(|s| s.value.as_str().map_or(0, str::len))
                .sum()
        };
        match self {
            Chunk::Single(v) => v.len() * slot + strings(v),
            Chunk::Multi(v) => v
                .iter()
                .map(|d| std::mem::size_of::<Vec<Slot>>() + d.len() * slot + strings(d))
                .sum(),
        }
    }
}

/// Column contents for every document slot, plus the dictionary if any.
#[derive(Debug, Clone)]
pub(crate) struct ColumnData {
    basic_type: BasicType,
    collection: CollectionType,
    chunks: Vec<Arc<Chunk>>,
    num_docs: usize,
    dictionary: Option<Arc<RwLock<EnumStore>>>,
}

impl ColumnData {
    pub fn new(
        basic_type: BasicType,
        collection: CollectionType,
        dictionary: Option<Arc<RwLock<EnumStore>>>,
    ) -> Self {
        Self {
            basic_type,
            collection,
            chunks: Vec::new(),
            num_docs: 0,
            dictionary,
        }
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn basic_type(&self) -> BasicType {
        self.basic_type
    }

    pub fn collection(&self) -> CollectionType {
        self.collection
    }

    pub fn dictionary(&self) -> Option<&Arc<RwLock<EnumStore>>> {
        self.dictionary.as_ref()
    }

    pub fn doc(&self, doc: DocId) -> Option<&[Slot]> {
        let doc = doc as usize;
        if doc >= self.num_docs {
            return None;
        }
        Some(self.chunks[doc / DOCS_PER_CHUNK].doc(doc % DOCS_PER_CHUNK))
    }

    /// Append one empty document.
    ///
    /// `undefined` is the slot a single-value document starts with.
    pub fn push_doc(&mut self, undefined: &Slot) {
        if self.num_docs % DOCS_PER_CHUNK == 0 {
            let chunk = match self.collection {
                CollectionType::Single => Chunk::Single(Vec::with_capacity(DOCS_PER_CHUNK)),
                _ => Chunk::Multi(Vec::with_capacity(DOCS_PER_CHUNK)),
            };
            self.chunks.push(Arc::new(chunk));
        }
        if let Some(last) = self.chunks.last_mut() {
            match Arc::make_mut(last) {
                Chunk::Single(v) => v.push(undefined.clone()),
                Chunk::Multi(v) => v.push(Vec::new()),
            }
        }
        self.num_docs += 1;
    }

    /// Replace the slots of `doc`. Single-value documents keep the first slot.
    pub fn set_doc(&mut self, doc: DocId, mut slots: Vec<Slot>) {
        let doc = doc as usize;
        if doc >= self.num_docs {
            return;
        }
        match Arc::make_mut(&mut self.chunks[doc / DOCS_PER_CHUNK]) {
            Chunk::Single(v) => {
                if !slots.is_empty() {
                    v[doc % DOCS_PER_CHUNK] = slots.swap_remove(0);
                }
            }
            Chunk::Multi(v) => v[doc % DOCS_PER_CHUNK] = slots,
        }
    }

    /// Drop every document at or above `num_docs`.
    pub fn truncate(&mut self, num_docs: usize) {
        if num_docs >= self.num_docs {
            return;
        }
        let chunks = (num_docs + DOCS_PER_CHUNK - 1) / DOCS_PER_CHUNK;
        self.chunks.truncate(chunks);
        let tail = num_docs % DOCS_PER_CHUNK;
        if tail != 0 {
            if let Some(last) = self.chunks.last_mut() {
                match Arc::make_mut(last) {
                    Chunk::Single(v) => v.truncate(tail),
                    Chunk::Multi(v) => v.truncate(tail),
                }
            }
        }
        self.num_docs = num_docs;
    }

    /// Iterate `(doc, slots)` for documents below `limit`.
    pub fn docs(&self, limit: usize) -> impl Iterator<Item = (DocId, &[Slot])> + '_ {
        let limit = limit.min(self.num_docs);
        (0..limit).map(move |doc| {
            (
                doc as DocId,
                self.chunks[doc / DOCS_PER_CHUNK].doc(doc % DOCS_PER_CHUNK),
            )
        })
    }

    pub fn estimated_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.estimated_bytes()).sum()
    }

    /// Bytes held by chunks of `self` that `newer` no longer shares.
    pub fn bytes_not_shared_with(&self, newer: &ColumnData) -> usize {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(i, chunk)| {
                newer
                    .chunks
                    .get(*i)
                    .map_or(true, |other| !Arc::ptr_eq(chunk, other))
            })
            .map(|(_, chunk)| chunk.estimated_bytes())
            .sum()
    }

    #[cfg(test)]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
