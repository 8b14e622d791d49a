//! Generation Safety Tests
//!
//! Tests for lock-free reads concurrent with a single writer:
//! - Guards pin generations and block reclamation
//! - Readers never observe a document whose data is not yet published
//! - A guard's snapshot stays stable while the writer moves on

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use aerocolumn::attribute::{
    AttributeConfig, AttributeVector, BasicType, CollectionType, WeightOp, Weighted,
};
use aerocolumn::generation::{GenerationHandler, GenerationHolder};

// =============================================================================
// Handler / Holder Tests
// =============================================================================

/// Nothing retired at or after a pinned generation is freed.
#[test]
fn test_holder_respects_pins() {
    let handler = GenerationHandler::new();
    let mut holder = GenerationHolder::new();
    let dropped = Arc::new(AtomicBool::new(false));

    struct Flag(Arc<AtomicBool>);
    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let guard = handler.take_guard();
    assert_eq!(guard.generation(), 0);
    holder.hold(handler.current_generation(), Flag(Arc::clone(&dropped)), 8);
    handler.inc_generation();

    handler.update_first_used_generation();
    assert_eq!(handler.first_used_generation(), 0);
    assert_eq!(holder.remove_all_old_generations(handler.first_used_generation()), 0);
    assert!(!dropped.load(Ordering::SeqCst));
    assert_eq!(handler.generation_ref_count(0), 1);

    drop(guard);
    handler.update_first_used_generation();
    assert_eq!(handler.first_used_generation(), 1);
    assert_eq!(holder.remove_all_old_generations(handler.first_used_generation()), 1);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(holder.held_bytes(), 0);
}

/// The floor stops at the oldest pinned generation.
#[test]
fn test_first_used_tracks_oldest_pin() {
    let handler = GenerationHandler::new();
    handler.inc_generation();
    let old = handler.take_guard();
    handler.inc_generation();
    handler.inc_generation();
    let newer = handler.take_guard();

    handler.update_first_used_generation();
    assert_eq!(handler.first_used_generation(), 1);
    assert!(handler.has_readers());

    drop(old);
    handler.update_first_used_generation();
    assert_eq!(handler.first_used_generation(), 3);
    assert_eq!(handler.generation_ref_count(3), 1);

    drop(newer);
    handler.update_first_used_generation();
    assert!(!handler.has_readers());
}

// =============================================================================
// Attribute Snapshot Tests
// =============================================================================

/// A guard keeps its retired snapshot alive and unchanged.
#[test]
fn test_guard_snapshot_survives_commits() {
    let config = AttributeConfig::new(BasicType::Int64, CollectionType::Single);
    let mut attr = AttributeVector::new("g", config).unwrap();
    attr.add_docs(4);
    for doc in 1..=4 {
        attr.update(doc, 1i64);
    }
    attr.commit(false);

    let reader = attr.reader();
    let pinned = reader.read();
    for round in 2..6i64 {
        for doc in 1..=4 {
            attr.update(doc, round);
        }
        attr.commit(false);
        assert!(attr.held_generations() > 0);
    }

    for doc in 1..=4 {
        assert_eq!(pinned.get::<i64>(doc), 1);
    }
    assert_eq!(reader.read().get::<i64>(1), 5);

    drop(pinned);
    attr.remove_all_old_generations();
    assert_eq!(attr.held_generations(), 0);
    assert_eq!(attr.status().on_hold_bytes, 0);
}

/// Readers racing the writer see consistent snapshots and only published
/// documents.
#[test]
fn test_concurrent_readers_see_consistent_snapshots() {
    const READERS: usize = 4;
    const ROUNDS: i64 = 200;

    let config = AttributeConfig::new(BasicType::Int64, CollectionType::Array);
    let mut attr = AttributeVector::new("race", config).unwrap();
    let reader = attr.reader();
    let barrier = Arc::new(Barrier::new(READERS + 1));
    let done = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let reader = reader.clone();
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                barrier.wait();
                let mut checks = 0u64;
                while !done.load(Ordering::Acquire) {
                    let read = reader.read();
                    let limit = read.committed_doc_id_limit();
                    let mut round_seen = None;
                    for doc in 1..limit {
                        // Every visible document carries [doc, tag(round)]
                        let values = read.get_all::<i64>(doc);
                        assert_eq!(values.len(), 2, "doc {} not fully published", doc);
                        assert_eq!(values[0], doc as i64);
                        match round_seen {
                            None => round_seen = Some(values[1]),
                            Some(r) => assert_eq!(values[1], r, "torn snapshot"),
                        }
                    }
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    // Negative so a tag never collides with a doc id
    let tag = |round: i64| -(round + 1);
    barrier.wait();
    for round in 0..ROUNDS {
        let doc = attr.add_doc();
        attr.append(doc, doc as i64, 1, false);
        attr.append(doc, tag(round), 1, false);
        for old in 1..doc {
            attr.remove(old, tag(round - 1), 1);
            attr.append(old, tag(round), 1, false);
        }
        attr.commit(false);
    }
    done.store(true, Ordering::Release);

    for handle in handles {
        handle.join().unwrap();
    }
    attr.remove_all_old_generations();
    assert_eq!(attr.held_generations(), 0);
    assert_eq!(attr.committed_doc_id_limit(), ROUNDS as u32 + 1);
}

/// Committed limit never decreases without an explicit compaction.
#[test]
fn test_committed_limit_monotonic() {
    let config = AttributeConfig::new(BasicType::Int32, CollectionType::Single);
    let mut attr = AttributeVector::new("m", config).unwrap();
    let mut last = attr.committed_doc_id_limit();
    for i in 0..50u32 {
        if i % 3 == 0 {
            attr.add_docs(i % 5);
        }
        if i % 7 == 0 {
            let doc = attr.num_docs() - 1;
            attr.update(doc, i as i64);
        }
        attr.commit(false);
        let now = attr.committed_doc_id_limit();
        assert!(now >= last);
        assert!(now <= attr.num_docs());
        assert!(now <= attr.uncommitted_doc_id_limit());
        last = now;
    }
}

// =============================================================================
// Dictionary Lock Tests
// =============================================================================

/// A commit that leaves the dictionary unchanged does not wait for readers
/// holding it.
#[test]
fn test_weight_only_commit_ignores_dictionary_readers() {
    let config = AttributeConfig::new(BasicType::String, CollectionType::WeightedSet)
        .with_fast_search(true);
    let mut attr = AttributeVector::new("dict", config).unwrap();
    attr.add_docs(2);
    attr.append(1, "a", 1, false);
    attr.append(2, "b", 1, false);
    attr.commit(false);

    let reader = attr.reader();
    let read = reader.read();
    let held = read.enum_guard();
    let a = held.find_enum(&"a".into()).unwrap();

    let (tx, rx) = mpsc::channel();
    let writer = thread::spawn(move || {
        attr.adjust_weight(1, "a", WeightOp::Increase(5));
        attr.append(2, "b", 9, false);
        attr.commit(false);
        tx.send(()).unwrap();
        attr
    });
    // Unwinding drops `held`, so a blocked writer still finishes
    rx.recv_timeout(Duration::from_secs(10))
        .expect("commit waited on the dictionary lock");
    assert_eq!(held.ref_count(a), 1);
    assert_eq!(held.enum_value(a), Some(&"a".into()));

    drop(held);
    drop(read);
    let attr = writer.join().unwrap();
    let read = attr.reader().read();
    assert_eq!(
        read.get_weighted::<String>(1),
        vec![Weighted::new("a".to_string(), 6)]
    );
    assert_eq!(
        read.get_weighted::<String>(2),
        vec![Weighted::new("b".to_string(), 9)]
    );
}
