//! Read side of a column.
//!
//! `AttributeReader` is a cheap clonable handle for reader threads. Each
//! traversal starts with `read()`, which pins the current generation and then
//! captures the committed doc id limit and the published snapshot. Reads
//! through the returned `ReadGuard` never lock and never fail: an
//! out-of-range document or a value kind the column does not store yields the
//! undefined sentinel.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLockReadGuard;

use super::column::{ColumnData, Slot};
use super::config::AttributeConfig;
use super::enum_store::EnumStore;
use super::types::{BasicType, DocId, EnumHandle, Value, Weighted};
use super::vector::Shared;
use crate::generation::{Generation, GenerationGuard};

mod sealed {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for String {}
    impl Sealed for super::EnumHandle {}
    impl Sealed for super::Value {}
}

/// A value kind a column can be read as.
pub trait ReadValue: sealed::Sealed + Sized {
    /// Sentinel returned when no value of this kind is available.
    fn undefined(basic_type: BasicType) -> Self;

    #[doc(hidden)]
    fn from_stored(value: &Value, handle: EnumHandle) -> Option<Self>;
}

impl ReadValue for i64 {
    fn undefined(basic_type: BasicType) -> Self {
        basic_type.undefined().as_int().unwrap_or(i64::MIN)
    }

    fn from_stored(value: &Value, _: EnumHandle) -> Option<Self> {
        value.as_int()
    }
}

impl ReadValue for f64 {
    fn undefined(_: BasicType) -> Self {
        f64::NAN
    }

    fn from_stored(value: &Value, _: EnumHandle) -> Option<Self> {
        value.as_float()
    }
}

impl ReadValue for String {
    fn undefined(_: BasicType) -> Self {
        String::new()
    }

    fn from_stored(value: &Value, _: EnumHandle) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ReadValue for EnumHandle {
    fn undefined(_: BasicType) -> Self {
        EnumHandle::UNDEFINED
    }

    fn from_stored(_: &Value, handle: EnumHandle) -> Option<Self> {
        (!handle.is_undefined()).then_some(handle)
    }
}

impl ReadValue for Value {
    fn undefined(basic_type: BasicType) -> Self {
        basic_type.undefined()
    }

    fn from_stored(value: &Value, _: EnumHandle) -> Option<Self> {
        Some(value.clone())
    }
}

fn read_slot<T: ReadValue>(slot: &Slot) -> Option<T> {
    T::from_stored(&slot.value, slot.handle)
}

/// Clonable read handle, shareable across threads.
#[derive(Clone)]
pub struct AttributeReader {
    shared: Arc<Shared>,
}

impl AttributeReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &AttributeConfig {
        &self.shared.config
    }

    /// Pin the current generation and capture the committed state.
    pub fn read(&self) -> ReadGuard {
        let generation = self.shared.generations.take_guard();
        let limit = self.shared.committed_doc_id_limit.load(Ordering::Acquire);
        let data = self.shared.snapshot.load_full();
        ReadGuard {
            generation,
            limit: limit.min(data.num_docs() as u32),
            data,
        }
    }

    pub fn committed_doc_id_limit(&self) -> u32 {
        self.shared.committed_doc_id_limit.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AttributeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeReader")
            .field("name", &self.shared.name)
            .finish()
    }
}

/// A reader's consistent view of the column.
///
/// Everything read through the guard comes from one published snapshot, and
/// storage retired after the pinned generation stays alive until it drops.
pub struct ReadGuard {
    generation: GenerationGuard,
    limit: u32,
    data: Arc<ColumnData>,
}

impl ReadGuard {
    pub fn generation(&self) -> Generation {
        self.generation.generation()
    }

    /// Documents below this id are visible.
    pub fn committed_doc_id_limit(&self) -> u32 {
        self.limit
    }

    pub fn basic_type(&self) -> BasicType {
        self.data.basic_type()
    }

    fn slots(&self, doc: DocId) -> Option<&[Slot]> {
        if doc >= self.limit {
            return None;
        }
        self.data.doc(doc)
    }

    pub fn value_count(&self, doc: DocId) -> u32 {
        self.slots(doc).map_or(0, |s| s.len() as u32)
    }

    /// First value of `doc`, or the sentinel.
    pub fn get<T: ReadValue>(&self, doc: DocId) -> T {
        self.slots(doc)
            .and_then(|s| s.first())
            .and_then(read_slot::<T>)
            .unwrap_or_else(|| T::undefined(self.basic_type()))
    }

    /// Every value of `doc`. Empty when out of range or of another kind.
    pub fn get_all<T: ReadValue>(&self, doc: DocId) -> Vec<T> {
        self.slots(doc)
            .map(|slots| slots.iter().filter_map(read_slot::<T>).collect())
            .unwrap_or_default()
    }

    /// Copy values of `doc` into `buf` and return the full value count.
    ///
    /// When the count exceeds `buf.len()` only the prefix is written; the
    /// caller retries with a larger buffer.
    pub fn get_into<T: ReadValue>(&self, doc: DocId, buf: &mut [T]) -> u32 {
        let Some(slots) = self.slots(doc) else {
            return 0;
        };
        for (out, slot) in buf.iter_mut().zip(slots) {
            *out = read_slot::<T>(slot).unwrap_or_else(|| T::undefined(self.basic_type()));
        }
        slots.len() as u32
    }

    pub fn get_weighted<T: ReadValue>(&self, doc: DocId) -> Vec<Weighted<T>> {
        self.slots(doc)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(|s| read_slot::<T>(s).map(|v| Weighted::new(v, s.weight)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_enum(&self) -> bool {
        self.data.dictionary().is_some()
    }

    /// Handle of `value` in the dictionary, if the column has one and the
    /// value is present.
    pub fn find_enum(&self, value: &Value) -> Option<EnumHandle> {
        let store = self.data.dictionary()?.read();
        let normalized = self.basic_type().normalize(value.clone())?;
        store.find(&normalized)
    }

    /// Value behind `handle`.
    pub fn enum_value(&self, handle: EnumHandle) -> Option<Value> {
        let store = self.data.dictionary()?.read();
        store.value(handle).cloned()
    }

    /// Hold the dictionary shared so handles stay resolvable in bulk.
    pub fn enum_guard(&self) -> EnumReadGuard<'_> {
        EnumReadGuard {
            read: self,
            store: self.data.dictionary().map(|d| d.read()),
        }
    }
}

impl std::fmt::Debug for ReadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("generation", &self.generation())
            .field("limit", &self.limit)
            .finish()
    }
}

/// A read guard that also holds the dictionary lock shared.
///
/// While it lives the writer cannot change the dictionary layout, so a handle
/// read from a document and the value it resolves to are consistent.
pub struct EnumReadGuard<'a> {
    read: &'a ReadGuard,
    store: Option<RwLockReadGuard<'a, EnumStore>>,
}

impl EnumReadGuard<'_> {
    pub fn get_enum(&self, doc: DocId) -> EnumHandle {
        self.read.get(doc)
    }

    pub fn find_enum(&self, value: &Value) -> Option<EnumHandle> {
        let normalized = self.read.basic_type().normalize(value.clone())?;
        self.store.as_ref()?.find(&normalized)
    }

    pub fn enum_value(&self, handle: EnumHandle) -> Option<&Value> {
        self.store.as_ref()?.value(handle)
    }

    /// Stored values referencing `handle` across all documents, including
    /// documents above the reader's limit.
    pub fn ref_count(&self, handle: EnumHandle) -> u32 {
        self.store.as_ref().map_or(0, |s| s.ref_count(handle))
    }
}
