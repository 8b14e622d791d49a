//! AttributeVector - the single writer of a column
//!
//! # Commit protocol
//!
//! Typed update calls validate and queue a `Change`. `commit` replays the
//! queue in order against the writer's working copy, then publishes:
//!
//! 1. store the new snapshot
//! 2. raise the committed doc id limit behind a release fence
//! 3. retire the replaced snapshot into the holder at the current generation
//! 4. advance the generation
//!
//! A reader loads the committed limit with acquire ordering before loading
//! the snapshot, so every document below the limit it sees is present in the
//! snapshot it gets.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use super::change::{apply_change, Applied, ArithOp, Change, ChangeVector, WeightOp};
use super::column::{ColumnData, Slot};
use super::config::AttributeConfig;
use super::enum_store::EnumStore;
use super::errors::AttributeResult;
use super::modifier::MutationMarkers;
use super::reader::AttributeReader;
use super::status::{StatThrottle, Status};
use super::types::{BasicType, DocId, EnumHandle, Value, Weighted};
use crate::generation::{Generation, GenerationHandler, GenerationHolder};
use crate::observability::{log_event, Event, MetricsRegistry, MetricsSnapshot, ObservationScope};
use crate::persistence::{
    self, family_path, FileKind, FileLoadSource, FileSaveTarget, LoadSource, SaveRequest,
    SaveSummary, SaveTarget,
};

/// State shared between the writer and its readers.
pub(crate) struct Shared {
    pub name: String,
    pub config: Arc<AttributeConfig>,
    pub generations: GenerationHandler,
    pub snapshot: ArcSwap<ColumnData>,
    pub committed_doc_id_limit: AtomicU32,
    pub markers: MutationMarkers,
    pub metrics: MetricsRegistry,
}

pub struct AttributeVector {
    shared: Arc<Shared>,
    base_file_name: PathBuf,
    working: ColumnData,
    changes: ChangeVector,
    holder: GenerationHolder,
    status: Status,
    throttle: StatThrottle,
    uncommitted_doc_id_limit: u32,
    create_serial_num: u64,
    compact_lid_space_generation: Generation,
    enumerated_save: bool,
    loaded: bool,
    dirty: bool,
}

impl AttributeVector {
    /// Create an empty column. Document 0 is reserved and committed.
    pub fn new(name: &str, config: AttributeConfig) -> AttributeResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let working = Self::empty_column(&config);
        let shared = Arc::new(Shared {
            name: name.to_string(),
            config: Arc::clone(&config),
            generations: GenerationHandler::new(),
            snapshot: ArcSwap::from_pointee(working.clone()),
            committed_doc_id_limit: AtomicU32::new(0),
            markers: MutationMarkers::new(),
            metrics: MetricsRegistry::new(),
        });
        let mut vector = Self {
            shared,
            base_file_name: PathBuf::from(name),
            working,
            changes: ChangeVector::new(),
            holder: GenerationHolder::new(),
            status: Status::default(),
            throttle: StatThrottle::new(
                config.stat_update_interval_ms,
                config.stat_update_change_threshold,
            ),
            uncommitted_doc_id_limit: 0,
            create_serial_num: 0,
            compact_lid_space_generation: 0,
            enumerated_save: config.enumerated_save,
            loaded: false,
            dirty: false,
        };
        vector.add_doc();
        vector.publish();
        vector.update_stat(true);
        Ok(vector)
    }

    fn empty_column(config: &AttributeConfig) -> ColumnData {
        let dictionary = config
            .fast_search
            .then(|| Arc::new(RwLock::new(EnumStore::new())));
        ColumnData::new(config.basic_type, config.collection_type, dictionary)
    }

    // === Identity and accessors ===

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &AttributeConfig {
        &self.shared.config
    }

    /// Handle for reader threads.
    pub fn reader(&self) -> AttributeReader {
        AttributeReader::new(Arc::clone(&self.shared))
    }

    pub fn base_file_name(&self) -> &Path {
        &self.base_file_name
    }

    pub fn set_base_file_name(&mut self, base: impl Into<PathBuf>) {
        self.base_file_name = base.into();
    }

    pub fn num_docs(&self) -> u32 {
        self.working.num_docs() as u32
    }

    pub fn committed_doc_id_limit(&self) -> u32 {
        self.shared.committed_doc_id_limit.load(Ordering::Acquire)
    }

    pub fn uncommitted_doc_id_limit(&self) -> u32 {
        self.uncommitted_doc_id_limit
    }

    pub fn create_serial_num(&self) -> u64 {
        self.create_serial_num
    }

    pub fn set_create_serial_num(&mut self, serial: u64) {
        self.create_serial_num = serial;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn has_enum(&self) -> bool {
        self.working.dictionary().is_some()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn current_generation(&self) -> Generation {
        self.shared.generations.current_generation()
    }

    pub fn first_used_generation(&self) -> Generation {
        self.shared.generations.first_used_generation()
    }

    pub fn generation_ref_count(&self, generation: Generation) -> u64 {
        self.shared.generations.generation_ref_count(generation)
    }

    pub fn has_readers(&self) -> bool {
        self.shared.generations.has_readers()
    }

    /// Retired snapshots not yet reclaimed.
    pub fn held_generations(&self) -> usize {
        self.holder.len()
    }

    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    pub fn value_modification_in_flight(&self) -> bool {
        self.shared.markers.value_in_flight()
    }

    // === Growth ===

    fn undefined_slot(&self) -> Slot {
        let value = self.shared.config.basic_type.undefined();
        let handle = match self.working.dictionary() {
            Some(dict) if !self.shared.config.is_multi_value() => {
                let _enum = self.shared.markers.enum_modifier();
                dict.write().intern(&value)
            }
            _ => EnumHandle::UNDEFINED,
        };
        Slot::new(value, 1, handle)
    }

    /// Append a document. It becomes visible at the next commit.
    pub fn add_doc(&mut self) -> DocId {
        let doc = self.working.num_docs() as DocId;
        let slot = self.undefined_slot();
        self.working.push_doc(&slot);
        self.uncommitted_doc_id_limit = self.working.num_docs() as u32;
        self.dirty = true;
        doc
    }

    /// Append `count` documents and return their ids.
    pub fn add_docs(&mut self, count: u32) -> Range<DocId> {
        let first = self.num_docs();
        for _ in 0..count {
            self.add_doc();
        }
        first..first + count
    }

    // === Updates ===

    fn accepts_doc(&self, doc: DocId) -> bool {
        doc < self.num_docs()
    }

    fn normalize(&self, value: Value) -> Option<Value> {
        self.shared.config.basic_type.normalize(value)
    }

    /// Assign the value of a single-value document.
    pub fn update(&mut self, doc: DocId, value: impl Into<Value>) -> bool {
        if self.shared.config.is_multi_value() || !self.accepts_doc(doc) {
            return false;
        }
        let Some(value) = self.normalize(value.into()) else {
            return false;
        };
        self.changes.push(Change::Update { doc, value });
        true
    }

    /// Add a value to a multi-value document.
    ///
    /// On a weighted set an existing equal value gets the new weight; on an
    /// array the weight is ignored. `do_count` counts the change as a
    /// non-idempotent update.
    pub fn append(
        &mut self,
        doc: DocId,
        value: impl Into<Value>,
        weight: i32,
        do_count: bool,
    ) -> bool {
        if !self.shared.config.is_multi_value() || !self.accepts_doc(doc) {
            return false;
        }
        let Some(value) = self.normalize(value.into()) else {
            return false;
        };
        self.changes.push(Change::Append {
            doc,
            value,
            weight,
            do_count,
        });
        true
    }

    /// Remove every occurrence of `value` from a multi-value document.
    pub fn remove(&mut self, doc: DocId, value: impl Into<Value>, weight: i32) -> bool {
        if !self.shared.config.is_multi_value() || !self.accepts_doc(doc) {
            return false;
        }
        let Some(value) = self.normalize(value.into()) else {
            return false;
        };
        self.changes.push(Change::Remove { doc, value, weight });
        true
    }

    /// Adjust the weight of `value` in a weighted-set document.
    pub fn adjust_weight(&mut self, doc: DocId, value: impl Into<Value>, op: WeightOp) -> bool {
        if !self.shared.config.is_weighted_set() || !self.accepts_doc(doc) {
            return false;
        }
        let Some(value) = self.normalize(value.into()) else {
            return false;
        };
        self.changes.push(Change::AdjustWeight { doc, value, op });
        true
    }

    /// Apply arithmetic to a numeric single-value document.
    pub fn apply_arithmetic(&mut self, doc: DocId, op: ArithOp) -> bool {
        let config = &self.shared.config;
        if config.is_multi_value() || config.basic_type == BasicType::String {
            return false;
        }
        if !self.accepts_doc(doc) {
            return false;
        }
        if !op.is_noop() {
            self.changes.push(Change::Arithmetic { doc, op });
        }
        true
    }

    pub fn clear_doc(&mut self, doc: DocId) -> bool {
        if !self.accepts_doc(doc) {
            return false;
        }
        self.changes.push(Change::ClearDoc { doc });
        true
    }

    /// Queue a clear of every document in `low..limit`.
    pub fn clear_docs(&mut self, low: DocId, limit: DocId) {
        let limit = limit.min(self.num_docs());
        for doc in low..limit {
            self.changes.push(Change::ClearDoc { doc });
        }
    }

    // === Commit ===

    /// Apply every queued change and publish the result.
    ///
    /// Idempotent when nothing is queued and no document was added.
    /// `force_stat_update` bypasses the statistics throttle.
    pub fn commit(&mut self, force_stat_update: bool) {
        let changes = self.changes.drain();
        let applied = self.apply_changes(&changes);
        if self.dirty || applied > 0 {
            self.publish();
            log_event(
                Event::Commit,
                &[
                    ("attribute", &self.shared.name),
                    ("changes", &applied.to_string()),
                    ("generation", &self.current_generation().to_string()),
                ],
            );
        }
        self.remove_all_old_generations();
        self.throttle.record_changes(applied as u64);
        self.update_stat(force_stat_update);
        self.loaded = true;
    }

    /// Commit, recording the serial number range the changes cover.
    pub fn commit_with_serial(&mut self, first_serial: u64, last_serial: u64) {
        if first_serial < self.status.last_sync_token {
            log_event(
                Event::SerialRegression,
                &[
                    ("attribute", &self.shared.name),
                    ("first_serial", &first_serial.to_string()),
                    ("last_sync_token", &self.status.last_sync_token.to_string()),
                ],
            );
        }
        self.commit(false);
        self.status.last_sync_token = last_serial;
    }

    /// Replay `changes` in order. Returns how many took effect.
    fn apply_changes(&mut self, changes: &[Change]) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let shared = Arc::clone(&self.shared);
        let basic_type = shared.config.basic_type;
        let collection = shared.config.collection_type;
        let generation = shared.generations.current_generation();

        let _value = shared.markers.value_modifier();
        let dictionary = self.working.dictionary().cloned();

        let mut applied = 0;
        for change in changes {
            let doc = change.doc();
            let Some(slots) = self.working.doc(doc) else {
                shared.metrics.increment_changes_skipped();
                continue;
            };
            let mut values: Vec<Weighted<Value>> = slots.iter().map(Slot::to_weighted).collect();
            let mut old_entries: Vec<(Value, EnumHandle)> =
                slots.iter().map(|s| (s.value.clone(), s.handle)).collect();

            if apply_change(&mut values, change, basic_type, collection) == Applied::DivideByZero {
                shared.metrics.increment_divide_by_zero();
                shared.metrics.increment_changes_skipped();
                log_event(
                    Event::DivideByZero,
                    &[("attribute", &shared.name), ("doc", &doc.to_string())],
                );
                continue;
            }

            let mut new_slots: Vec<Slot> = values
                .into_iter()
                .map(|w| {
                    // A value the document already held keeps its reference
                    let handle = match old_entries.iter().position(|(v, _)| *v == w.value) {
                        Some(i) => old_entries.swap_remove(i).1,
                        None => EnumHandle::UNDEFINED,
                    };
                    Slot::new(w.value, w.weight, handle)
                })
                .collect();
            if let Some(dict) = &dictionary {
                self.update_dictionary(dict, &mut new_slots, &old_entries, generation);
            }
            self.status.highest_value_count =
                self.status.highest_value_count.max(new_slots.len() as u32);
            self.working.set_doc(doc, new_slots);

            self.status.inc_updates(1);
            if change.is_non_idempotent() {
                self.status.inc_non_idempotent_updates(1);
            }
            applied += 1;
        }
        shared.metrics.add_changes_applied(applied as u64);
        applied
    }

    /// Intern the values of `slots` that have no handle yet and release
    /// `dropped`. The write lock is held only when the dictionary changes.
    fn update_dictionary(
        &self,
        dict: &RwLock<EnumStore>,
        slots: &mut [Slot],
        dropped: &[(Value, EnumHandle)],
        generation: Generation,
    ) {
        if dropped.is_empty() && slots.iter().all(|s| !s.handle.is_undefined()) {
            return;
        }
        let _enum = self.shared.markers.enum_modifier();
        let mut store = dict.write();
        for slot in slots.iter_mut().filter(|s| s.handle.is_undefined()) {
            slot.handle = store.intern(&slot.value);
        }
        for (_, handle) in dropped {
            store.release(*handle, generation);
        }
    }

    /// Make the working copy visible to readers.
    fn publish(&mut self) {
        let next = Arc::new(self.working.clone());
        let retired = self.shared.snapshot.swap(next);
        let limit = self.uncommitted_doc_id_limit;
        if limit > self.committed_doc_id_limit() {
            fence(Ordering::Release);
            self.shared
                .committed_doc_id_limit
                .store(limit, Ordering::Release);
        }
        self.uncommitted_doc_id_limit = self.committed_doc_id_limit().max(limit);
        let bytes = retired.bytes_not_shared_with(&self.working);
        self.holder
            .hold(self.shared.generations.current_generation(), retired, bytes);
        self.shared.generations.inc_generation();
        self.shared.metrics.increment_commits();
        self.dirty = false;
    }

    /// Reclaim everything no reader can still observe.
    pub fn remove_all_old_generations(&mut self) {
        let generations = &self.shared.generations;
        generations.update_first_used_generation();
        let first_used = generations.first_used_generation();
        let mut reclaimed = self.holder.remove_all_old_generations(first_used);
        if let Some(dict) = self.working.dictionary() {
            if dict.read().has_reclaimable(first_used) {
                let _enum = self.shared.markers.enum_modifier();
                reclaimed += dict.write().reclaim(first_used);
            }
        }
        if reclaimed > 0 {
            self.shared
                .metrics
                .add_generations_reclaimed(reclaimed as u64);
            log_event(
                Event::GenerationsReclaimed,
                &[
                    ("attribute", &self.shared.name),
                    ("first_used", &first_used.to_string()),
                    ("reclaimed", &reclaimed.to_string()),
                ],
            );
        }
        self.status.on_hold_bytes = self.holder.held_bytes() as u64;
    }

    /// Recompute statistics if forced or the throttle allows it.
    pub fn update_stat(&mut self, force: bool) {
        let now = Instant::now();
        if !self.throttle.is_due(force, now) {
            return;
        }
        let mut num_values = 0u64;
        let mut highest = 0u32;
        for (_, slots) in self.working.docs(self.working.num_docs()) {
            num_values += slots.len() as u64;
            highest = highest.max(slots.len() as u32);
        }
        let (unique, dict_bytes) = match self.working.dictionary() {
            Some(dict) => {
                let store = dict.read();
                (store.num_unique_values() as u64, store.estimated_bytes())
            }
            None => (0, 0),
        };
        self.status.num_docs = self.working.num_docs() as u64;
        self.status.num_values = num_values;
        self.status.num_unique_values = unique;
        self.status.highest_value_count = highest;
        self.status.allocated_bytes = (self.working.estimated_bytes() + dict_bytes) as u64;
        self.status.on_hold_bytes = self.holder.held_bytes() as u64;
        self.throttle.mark_updated(now);
    }

    // === Lid space ===

    pub fn want_shrink_lid_space(&self) -> bool {
        self.committed_doc_id_limit() < self.num_docs()
    }

    /// True once no reader can still see documents above the committed limit.
    pub fn can_shrink_lid_space(&self) -> bool {
        self.want_shrink_lid_space()
            && self.compact_lid_space_generation < self.first_used_generation()
    }

    /// Lower the committed limit to `wanted_limit`, clearing the documents
    /// above it. Never raises the limit; the limit never drops below 1.
    pub fn compact_lid_space(&mut self, wanted_limit: DocId) {
        self.commit(false);
        let committed = self.committed_doc_id_limit();
        let wanted = wanted_limit.max(1);
        if wanted >= committed {
            return;
        }
        self.clear_docs(wanted, committed);
        self.commit(false);
        self.shared
            .committed_doc_id_limit
            .store(wanted, Ordering::Release);
        self.uncommitted_doc_id_limit = wanted;
        self.compact_lid_space_generation = self.current_generation();
        self.shared.generations.inc_generation();
        self.remove_all_old_generations();
        log_event(
            Event::LidSpaceCompacted,
            &[
                ("attribute", &self.shared.name),
                ("from", &committed.to_string()),
                ("to", &wanted.to_string()),
            ],
        );
    }

    /// Drop storage above the committed limit once no reader can see it.
    ///
    /// Returns false when there is nothing to shrink or a reader still holds
    /// a generation from before the compaction.
    pub fn shrink_lid_space(&mut self) -> bool {
        self.commit(false);
        self.remove_all_old_generations();
        if !self.can_shrink_lid_space() {
            return false;
        }
        let limit = self.committed_doc_id_limit();
        let old_docs = self.num_docs();
        if let Some(dict) = self.working.dictionary().cloned() {
            let generation = self.current_generation();
            let _enum = self.shared.markers.enum_modifier();
            let mut store = dict.write();
            for (_, slots) in self.working.docs(old_docs as usize).skip(limit as usize) {
                for slot in slots {
                    store.release(slot.handle, generation);
                }
            }
        }
        self.working.truncate(limit as usize);
        self.uncommitted_doc_id_limit = limit;
        self.dirty = true;
        self.publish();
        self.remove_all_old_generations();
        self.update_stat(true);
        log_event(
            Event::LidSpaceShrunk,
            &[
                ("attribute", &self.shared.name),
                ("from", &old_docs.to_string()),
                ("to", &limit.to_string()),
            ],
        );
        true
    }

    // === Persistence ===

    pub fn enable_enumerated_save(&mut self, enable: bool) {
        self.enumerated_save = enable;
    }

    /// Whether the next save uses the enumerated layout.
    pub fn enumerated_save(&self) -> bool {
        self.has_enum() && self.enumerated_save
    }

    pub fn has_load_data(&self) -> bool {
        family_path(&self.base_file_name, FileKind::Dat).exists()
    }

    pub fn estimated_save_byte_size(&self) -> u64 {
        let data = self.shared.snapshot.load();
        persistence::estimated_save_bytes(
            &data,
            self.committed_doc_id_limit() as usize,
            self.enumerated_save(),
        )
    }

    /// Save committed state through `target`.
    pub fn save_to(&mut self, target: &mut dyn SaveTarget) -> AttributeResult<SaveSummary> {
        let data = self.shared.snapshot.load_full();
        persistence::save_column(
            SaveRequest {
                data: &data,
                doc_id_limit: self.committed_doc_id_limit().min(data.num_docs() as u32),
                create_serial_num: self.create_serial_num,
                enumerated: self.enumerated_save(),
            },
            target,
        )
    }

    /// Save to the base file name, returning the failure.
    pub fn try_save(&mut self) -> AttributeResult<SaveSummary> {
        let scope = ObservationScope::save(&self.shared.name);
        let mut target = FileSaveTarget::new(&self.base_file_name);
        match self.save_to(&mut target) {
            Ok(summary) => {
                self.shared.metrics.increment_saves();
                scope.complete_with_fields(&[
                    ("bytes", &summary.bytes.to_string()),
                    ("doc_id_limit", &summary.doc_id_limit.to_string()),
                    ("save_id", &summary.save_id.to_string()),
                ]);
                Ok(summary)
            }
            Err(e) => {
                self.shared.metrics.increment_save_failures();
                scope.fail(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    /// Save to the base file name. Previous files survive a failure.
    pub fn save(&mut self) -> bool {
        self.try_save().is_ok()
    }

    pub fn save_as(&mut self, base: impl Into<PathBuf>) -> bool {
        self.set_base_file_name(base);
        self.save()
    }

    /// Replace all state with the family read from `source`.
    ///
    /// Nothing changes unless the whole family validates.
    pub fn load_from(&mut self, source: &dyn LoadSource) -> AttributeResult<()> {
        let decoded = persistence::load_column(&self.shared.config, source)?;
        let doc_id_limit = decoded.header.doc_id_limit;

        let mut column = Self::empty_column(&self.shared.config);
        if let Some(dict) = column.dictionary().cloned() {
            let mut store = dict.write();
            // Seed in file order so handles match the on-disk indices
            let seeded: Vec<EnumHandle> = decoded
                .dictionary
                .iter()
                .flatten()
                .map(|v| store.intern(v))
                .collect();
            let placeholder = Slot::new(Value::Int(0), 1, EnumHandle::UNDEFINED);
            for doc_values in &decoded.docs {
                column.push_doc(&placeholder);
                let slots = doc_values
                    .iter()
                    .map(|w| Slot::new(w.value.clone(), w.weight, store.intern(&w.value)))
                    .collect();
                column.set_doc((column.num_docs() - 1) as DocId, slots);
            }
            let generation = self.current_generation();
            for handle in seeded {
                store.release(handle, generation);
            }
        } else {
            let placeholder = Slot::new(Value::Int(0), 1, EnumHandle::UNDEFINED);
            for doc_values in &decoded.docs {
                column.push_doc(&placeholder);
                let slots = doc_values
                    .iter()
                    .map(|w| Slot::new(w.value.clone(), w.weight, EnumHandle::UNDEFINED))
                    .collect();
                column.set_doc((column.num_docs() - 1) as DocId, slots);
            }
        }

        self.changes.clear();
        self.working = column;
        self.create_serial_num = decoded.header.create_serial_num;
        // A load may shrink the column, so the limit is set outright
        fence(Ordering::Release);
        self.shared
            .committed_doc_id_limit
            .store(doc_id_limit.min(self.committed_doc_id_limit()), Ordering::Release);
        self.uncommitted_doc_id_limit = doc_id_limit;
        self.dirty = true;
        self.publish();
        self.remove_all_old_generations();
        self.update_stat(true);
        self.loaded = true;
        Ok(())
    }

    /// Load from the base file name, returning the failure.
    pub fn try_load(&mut self) -> AttributeResult<()> {
        let scope = ObservationScope::load(&self.shared.name);
        let source = FileLoadSource::new(&self.base_file_name);
        match self.load_from(&source) {
            Ok(()) => {
                self.shared.metrics.increment_loads();
                scope.complete_with_fields(&[
                    ("doc_id_limit", &self.committed_doc_id_limit().to_string()),
                    ("num_values", &self.status.num_values.to_string()),
                ]);
                Ok(())
            }
            Err(e) => {
                self.shared.metrics.increment_load_failures();
                scope.fail(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    /// Load from the base file name. State is untouched on failure.
    pub fn load(&mut self) -> bool {
        self.try_load().is_ok()
    }
}

impl std::fmt::Debug for AttributeVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeVector")
            .field("name", &self.shared.name)
            .field("num_docs", &self.num_docs())
            .field("committed_doc_id_limit", &self.committed_doc_id_limit())
            .field("generation", &self.current_generation())
            .field("pending_changes", &self.changes.len())
            .finish()
    }
}
