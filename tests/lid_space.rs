//! Lid Space Tests
//!
//! Tests for compaction and shrinking of the document id space:
//! - Compaction lowers the committed limit and clears the dropped documents
//! - Storage is only released once no reader predates the compaction
//! - Document ids above the limit are reused after a shrink

use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;

use aerocolumn::attribute::{AttributeConfig, AttributeVector, BasicType, CollectionType};

fn strings(fast_search: bool) -> AttributeVector {
    let config = AttributeConfig::new(BasicType::String, CollectionType::WeightedSet)
        .with_fast_search(fast_search);
    let mut attr = AttributeVector::new("lid", config).unwrap();
    attr.add_docs(9);
    for doc in 1..10 {
        attr.append(doc, format!("d{}", doc), doc as i32, false);
        attr.append(doc, "shared", 1, false);
    }
    attr.commit(true);
    attr
}

// =============================================================================
// Compaction Tests
// =============================================================================

/// Compaction lowers the limit but keeps storage until shrink.
#[test]
fn test_compact_lowers_limit() {
    let mut attr = strings(false);
    assert_eq!(attr.committed_doc_id_limit(), 10);

    attr.compact_lid_space(4);
    assert_eq!(attr.committed_doc_id_limit(), 4);
    assert_eq!(attr.uncommitted_doc_id_limit(), 4);
    assert_eq!(attr.num_docs(), 10);
    assert!(attr.want_shrink_lid_space());

    let read = attr.reader().read();
    assert_eq!(read.committed_doc_id_limit(), 4);
    assert_eq!(read.value_count(3), 2);
    assert_eq!(read.value_count(4), 0);
}

/// Compaction to zero keeps the reserved document.
#[test]
fn test_compact_floor_is_one() {
    let mut attr = strings(false);
    attr.compact_lid_space(0);
    assert_eq!(attr.committed_doc_id_limit(), 1);
    assert!(attr.shrink_lid_space());
    assert_eq!(attr.num_docs(), 1);
}

/// Compacting to a limit above the current one does nothing.
#[test]
fn test_compact_above_limit_noop() {
    let mut attr = strings(false);
    let generation = attr.current_generation();
    attr.compact_lid_space(50);
    assert_eq!(attr.committed_doc_id_limit(), 10);
    assert!(!attr.want_shrink_lid_space());
    assert_eq!(attr.current_generation(), generation);
}

// =============================================================================
// Shrink Tests
// =============================================================================

/// A guard taken before compaction blocks the shrink until dropped.
#[test]
fn test_stale_reader_blocks_shrink() {
    let mut attr = strings(false);
    let reader = attr.reader();
    let stale = reader.read();

    attr.compact_lid_space(5);
    assert!(attr.want_shrink_lid_space());
    assert!(!attr.can_shrink_lid_space());
    assert!(!attr.shrink_lid_space());
    assert_eq!(attr.num_docs(), 10);
    // The stale snapshot still has its documents
    assert_eq!(stale.committed_doc_id_limit(), 10);
    assert_eq!(stale.get_all::<String>(9)[0], "d9");

    drop(stale);
    assert!(attr.shrink_lid_space());
    assert_eq!(attr.num_docs(), 5);
    assert!(!attr.want_shrink_lid_space());
    assert_eq!(attr.status().num_docs, 5);
}

/// With no reader alive, compaction and shrink leave nothing on hold.
#[test]
fn test_shrink_reclaims_retired_snapshot() {
    let config = AttributeConfig::new(BasicType::Int64, CollectionType::Single);
    let mut attr = AttributeVector::new("big", config).unwrap();
    attr.add_docs(4999);
    for doc in 1..5000 {
        attr.update(doc, doc as i64);
    }
    attr.commit(false);

    attr.compact_lid_space(2);
    assert!(!attr.has_readers());
    assert_eq!(attr.held_generations(), 0);

    assert!(attr.shrink_lid_space());
    assert!(!attr.has_readers());
    assert_eq!(attr.held_generations(), 0);
    assert_eq!(attr.status().on_hold_bytes, 0);
    assert_eq!(attr.reader().read().get::<i64>(1), 1);
}

/// A guard taken after compaction does not block the shrink.
#[test]
fn test_fresh_reader_allows_shrink() {
    let mut attr = strings(false);
    attr.compact_lid_space(3);
    let fresh = attr.reader().read();
    assert!(attr.shrink_lid_space());
    assert_eq!(fresh.committed_doc_id_limit(), 3);
    assert_eq!(fresh.value_count(2), 2);
}

/// Document ids from the shrunk range are handed out again, empty.
#[test]
fn test_ids_reused_after_shrink() {
    let mut attr = strings(true);
    attr.compact_lid_space(6);
    assert!(attr.shrink_lid_space());

    let doc = attr.add_doc();
    assert_eq!(doc, 6);
    attr.commit(false);
    let read = attr.reader().read();
    assert_eq!(read.committed_doc_id_limit(), 7);
    assert_eq!(read.value_count(6), 0);
}

/// Shrinking releases dictionary references of the dropped documents.
#[test]
fn test_shrink_releases_dictionary_entries() {
    let mut attr = strings(true);
    assert_eq!(attr.status().num_unique_values, 10);

    attr.compact_lid_space(4);
    assert!(attr.shrink_lid_space());
    attr.remove_all_old_generations();
    attr.update_stat(true);
    // d1..d3 and "shared"
    assert_eq!(attr.status().num_unique_values, 4);

    let read = attr.reader().read();
    let shared = read.find_enum(&"shared".into()).unwrap();
    assert_eq!(read.enum_guard().ref_count(shared), 3);
    assert!(read.find_enum(&"d7".into()).is_none());
}

/// Readers on other threads hold the shrink back until all release.
#[test]
fn test_threaded_readers_gate_shrink() {
    const READERS: usize = 3;

    let mut attr = strings(false);
    let reader = attr.reader();
    let pinned = Arc::new(Barrier::new(READERS + 1));
    let release = Arc::new(Barrier::new(READERS + 1));
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let reader = reader.clone();
            let pinned = Arc::clone(&pinned);
            let release = Arc::clone(&release);
            let tx = tx.clone();
            thread::spawn(move || {
                let read = reader.read();
                pinned.wait();
                release.wait();
                tx.send(read.get_all::<String>(8)).unwrap();
            })
        })
        .collect();

    pinned.wait();
    attr.compact_lid_space(2);
    assert!(!attr.shrink_lid_space());
    release.wait();

    for handle in handles {
        handle.join().unwrap();
    }
    drop(tx);
    for values in rx {
        assert_eq!(values, vec!["d8".to_string(), "shared".to_string()]);
    }

    assert!(attr.shrink_lid_space());
    assert_eq!(attr.num_docs(), 2);
    assert!(!attr.has_readers());
}
