//! Iterator capability handed to query evaluation.

use crate::attribute::DocId;

/// Per-term match details filled by `SearchIterator::unpack`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFieldMatchData {
    doc_id: Option<DocId>,
    weight: i32,
    num_occs: u32,
}

impl TermFieldMatchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn set(&mut self, doc: DocId, weight: i32, num_occs: u32) {
        self.doc_id = Some(doc);
        self.weight = weight;
        self.num_occs = num_occs;
    }

    /// Document the data was last unpacked for.
    pub fn doc_id(&self) -> Option<DocId> {
        self.doc_id
    }

    /// Weight of the first matching element.
    pub fn weight(&self) -> i32 {
        self.weight
    }

    /// Number of matching elements.
    pub fn num_occs(&self) -> u32 {
        self.num_occs
    }
}

/// Advances over matching document ids in ascending order.
///
/// A strict iterator's `seek` returns the first hit at or after `target`. A
/// non-strict one only answers whether `target` itself is a hit.
pub trait SearchIterator {
    fn seek(&mut self, target: DocId) -> Option<DocId>;

    /// Fill `match_data` for `doc`, which the last `seek` returned.
    fn unpack(&mut self, doc: DocId, match_data: &mut TermFieldMatchData);

    fn is_strict(&self) -> bool;

    /// Exclusive upper bound on ids this iterator can return.
    fn doc_id_limit(&self) -> DocId;
}

/// Drain every hit from `iterator`, skipping the reserved document 0.
pub fn collect_hits(iterator: &mut dyn SearchIterator) -> Vec<DocId> {
    let limit = iterator.doc_id_limit();
    let mut hits = Vec::new();
    let mut doc = 1;
    while doc < limit {
        match iterator.seek(doc) {
            Some(hit) => {
                hits.push(hit);
                doc = hit + 1;
            }
            None if iterator.is_strict() => break,
            None => doc += 1,
        }
    }
    hits
}
