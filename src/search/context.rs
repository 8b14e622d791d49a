//! SearchContext: one term evaluated against one attribute.
//!
//! The context pins a reader generation for its whole life, so iterators
//! created from it see one consistent snapshot. Matching is a scan over
//! stored values; on an enumerated column an exact term is resolved to its
//! dictionary handle once and compared by handle.

use crate::attribute::{AttributeReader, DocId, EnumHandle, ReadGuard, Value};

use super::iterator::{SearchIterator, TermFieldMatchData};
use super::predicate::Predicate;

/// One matching document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub doc: DocId,
    /// Weight of the first matching element
    pub weight: i32,
    /// Matching elements in the document
    pub num_occs: u32,
}

pub struct SearchContext {
    read: ReadGuard,
    /// `None` when no stored value can satisfy the term
    predicate: Option<Predicate>,
    term_handle: Option<EnumHandle>,
    is_filter: bool,
    postings: Option<Vec<Hit>>,
}

impl SearchContext {
    pub fn new(reader: &AttributeReader, predicate: Predicate) -> Self {
        let read = reader.read();
        let mut predicate = predicate.normalize(read.basic_type());
        let mut term_handle = None;
        if read.has_enum() {
            if let Some(term) = predicate.as_ref().and_then(Predicate::exact_term) {
                term_handle = read.find_enum(term);
                if term_handle.is_none() {
                    predicate = None;
                }
            }
        }
        Self {
            read,
            predicate,
            term_handle,
            is_filter: reader.config().is_filter,
            postings: None,
        }
    }

    pub fn is_filter(&self) -> bool {
        self.is_filter
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Documents below this id are searched.
    pub fn doc_id_limit(&self) -> DocId {
        self.read.committed_doc_id_limit()
    }

    /// Evaluate the term against one document.
    pub fn matches(&self, doc: DocId) -> Option<Hit> {
        let predicate = self.predicate.as_ref()?;
        if doc == 0 {
            return None;
        }
        let (weight, num_occs) = match self.term_handle {
            Some(handle) => first_and_count(
                self.read
                    .get_weighted::<EnumHandle>(doc)
                    .into_iter()
                    .filter(|w| w.value == handle)
                    .map(|w| w.weight),
            ),
            None => {
                let basic_type = self.read.basic_type();
                first_and_count(
                    self.read
                        .get_weighted::<Value>(doc)
                        .into_iter()
                        .filter(|w| predicate.matches(basic_type, &w.value))
                        .map(|w| w.weight),
                )
            }
        };
        weight.map(|weight| Hit {
            doc,
            weight,
            num_occs,
        })
    }

    /// Upper bound on the number of hits.
    pub fn approximate_hits(&self) -> u32 {
        if self.predicate.is_none() {
            return 0;
        }
        if let Some(postings) = &self.postings {
            return postings.len() as u32;
        }
        let docs = self.doc_id_limit().saturating_sub(1);
        match self.term_handle {
            Some(handle) => self.read.enum_guard().ref_count(handle).min(docs),
            None => docs,
        }
    }

    /// Materialize the hit list when the caller will iterate strictly.
    ///
    /// Non-strict evaluation checks single documents and gains nothing from
    /// a materialized list, so it is left to scan.
    pub fn fetch_postings(&mut self, strict: bool) {
        if !strict || self.postings.is_some() {
            return;
        }
        let postings = (1..self.doc_id_limit())
            .filter_map(|doc| self.matches(doc))
            .collect();
        self.postings = Some(postings);
    }

    pub fn has_postings(&self) -> bool {
        self.postings.is_some()
    }

    /// Ranking iterator, or a filter iterator when the attribute is a filter.
    pub fn create_iterator(&self, strict: bool) -> Box<dyn SearchIterator + '_> {
        self.iterator(strict, self.is_filter)
    }

    /// Iterator whose `unpack` leaves match data untouched.
    pub fn create_filter_iterator(&self, strict: bool) -> Box<dyn SearchIterator + '_> {
        self.iterator(strict, true)
    }

    fn iterator(&self, strict: bool, filter: bool) -> Box<dyn SearchIterator + '_> {
        match &self.postings {
            Some(postings) => Box::new(PostingIterator {
                postings,
                limit: self.doc_id_limit(),
                strict,
                filter,
            }),
            None => Box::new(ScanIterator {
                ctx: self,
                current: None,
                strict,
                filter,
            }),
        }
    }
}

fn first_and_count(weights: impl Iterator<Item = i32>) -> (Option<i32>, u32) {
    let mut first = None;
    let mut count = 0;
    for weight in weights {
        first.get_or_insert(weight);
        count += 1;
    }
    (first, count)
}

struct ScanIterator<'a> {
    ctx: &'a SearchContext,
    current: Option<Hit>,
    strict: bool,
    filter: bool,
}

impl SearchIterator for ScanIterator<'_> {
    fn seek(&mut self, target: DocId) -> Option<DocId> {
        self.current = if self.strict {
            (target..self.ctx.doc_id_limit()).find_map(|doc| self.ctx.matches(doc))
        } else {
            self.ctx.matches(target)
        };
        self.current.map(|hit| hit.doc)
    }

    fn unpack(&mut self, doc: DocId, match_data: &mut TermFieldMatchData) {
        if self.filter {
            return;
        }
        let hit = match self.current {
            Some(hit) if hit.doc == doc => Some(hit),
            _ => self.ctx.matches(doc),
        };
        if let Some(hit) = hit {
            match_data.set(doc, hit.weight, hit.num_occs);
        }
    }

    fn is_strict(&self) -> bool {
        self.strict
    }

    fn doc_id_limit(&self) -> DocId {
        self.ctx.doc_id_limit()
    }
}

struct PostingIterator<'a> {
    postings: &'a [Hit],
    limit: DocId,
    strict: bool,
    filter: bool,
}

impl PostingIterator<'_> {
    fn find(&self, doc: DocId) -> Option<&Hit> {
        self.postings
            .binary_search_by_key(&doc, |h| h.doc)
            .ok()
            .map(|i| &self.postings[i])
    }
}

impl SearchIterator for PostingIterator<'_> {
    fn seek(&mut self, target: DocId) -> Option<DocId> {
        if self.strict {
            let pos = self.postings.partition_point(|h| h.doc < target);
            self.postings.get(pos).map(|h| h.doc)
        } else {
            self.find(target).map(|h| h.doc)
        }
    }

    fn unpack(&mut self, doc: DocId, match_data: &mut TermFieldMatchData) {
        if self.filter {
            return;
        }
        if let Some(hit) = self.find(doc) {
            match_data.set(doc, hit.weight, hit.num_occs);
        }
    }

    fn is_strict(&self) -> bool {
        self.strict
    }

    fn doc_id_limit(&self) -> DocId {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeConfig, AttributeVector, BasicType, CollectionType};
    use crate::search::collect_hits;

    fn weighted_set(fast_search: bool) -> AttributeVector {
        let config = AttributeConfig::new(BasicType::String, CollectionType::WeightedSet)
            .with_fast_search(fast_search);
        let mut attr = AttributeVector::new("tags", config).unwrap();
        attr.add_docs(4);
        attr.append(1, "red", 10, false);
        attr.append(2, "blue", 20, false);
        attr.append(3, "red", 30, false);
        attr.append(3, "green", 5, false);
        attr.commit(false);
        attr
    }

    // === Matching ===

    #[test]
    fn test_exact_term_scan() {
        for fast_search in [false, true] {
            let attr = weighted_set(fast_search);
            let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("red")));
            let mut it = ctx.create_iterator(true);
            assert_eq!(collect_hits(it.as_mut()), vec![1, 3]);
        }
    }

    #[test]
    fn test_unknown_term_has_no_hits() {
        let attr = weighted_set(true);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("pink")));
        assert_eq!(ctx.approximate_hits(), 0);
        assert!(ctx.matches(1).is_none());
    }

    #[test]
    fn test_kind_mismatch_has_no_hits() {
        let attr = weighted_set(false);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::Int(1)));
        assert!(ctx.predicate().is_none());
        assert_eq!(ctx.approximate_hits(), 0);
    }

    #[test]
    fn test_unpack_fills_weight() {
        let attr = weighted_set(false);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("red")));
        let mut it = ctx.create_iterator(true);
        let mut md = TermFieldMatchData::new();
        let doc = it.seek(2).unwrap();
        assert_eq!(doc, 3);
        it.unpack(doc, &mut md);
        assert_eq!(md.doc_id(), Some(3));
        assert_eq!(md.weight(), 30);
        assert_eq!(md.num_occs(), 1);
    }

    #[test]
    fn test_filter_iterator_skips_unpack() {
        let attr = weighted_set(false);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("blue")));
        let mut it = ctx.create_filter_iterator(true);
        let mut md = TermFieldMatchData::new();
        let doc = it.seek(1).unwrap();
        it.unpack(doc, &mut md);
        assert_eq!(md.doc_id(), None);
    }

    #[test]
    fn test_non_strict_single_document() {
        let attr = weighted_set(false);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("red")));
        let mut it = ctx.create_iterator(false);
        assert_eq!(it.seek(2), None);
        assert_eq!(it.seek(3), Some(3));
    }

    // === Postings ===

    #[test]
    fn test_fetch_postings_strict_only() {
        let attr = weighted_set(false);
        let mut ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("red")));
        ctx.fetch_postings(false);
        assert!(!ctx.has_postings());
        ctx.fetch_postings(true);
        assert!(ctx.has_postings());
        assert_eq!(ctx.approximate_hits(), 2);

        let mut it = ctx.create_iterator(true);
        assert_eq!(collect_hits(it.as_mut()), vec![1, 3]);
        let mut md = TermFieldMatchData::new();
        it.unpack(1, &mut md);
        assert_eq!(md.weight(), 10);
    }

    #[test]
    fn test_context_keeps_snapshot() {
        let mut attr = weighted_set(false);
        let ctx = SearchContext::new(&attr.reader(), Predicate::Eq(Value::from("blue")));
        attr.remove(2, "blue", 1);
        attr.append(4, "blue", 1, false);
        attr.commit(false);

        let mut it = ctx.create_iterator(true);
        assert_eq!(collect_hits(it.as_mut()), vec![2]);
    }

    #[test]
    fn test_range_on_integers() {
        let config = AttributeConfig::new(BasicType::Int32, CollectionType::Single);
        let mut attr = AttributeVector::new("n", config).unwrap();
        attr.add_docs(5);
        for (doc, v) in [(1, 5), (2, 50), (3, 15), (4, 10)] {
            attr.update(doc, v as i64);
        }
        attr.commit(false);
        let ctx = SearchContext::new(
            &attr.reader(),
            Predicate::Range(Value::Int(10), Value::Int(20)),
        );
        let mut it = ctx.create_iterator(true);
        // doc 5 holds the undefined sentinel
        assert_eq!(collect_hits(it.as_mut()), vec![3, 4]);
    }
}
