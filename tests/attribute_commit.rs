//! Commit Pipeline Tests
//!
//! Tests for the change-vector commit pipeline:
//! - Enqueue-order application per document
//! - Integral arithmetic rounding
//! - Divide-by-zero skipping without aborting the batch
//! - Statistics and counters

use aerocolumn::attribute::{
    ArithOp, AttributeConfig, AttributeVector, BasicType, CollectionType, EnumHandle, Value,
    WeightOp, Weighted,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn attribute(basic_type: BasicType, collection: CollectionType, docs: u32) -> AttributeVector {
    let config = AttributeConfig::new(basic_type, collection);
    let mut attr = AttributeVector::new("test", config).unwrap();
    attr.add_docs(docs);
    attr.commit(false);
    attr
}

// =============================================================================
// Arithmetic Tests
// =============================================================================

/// Mul(3) on 5 yields 15, Div(2) on 5 yields 3.
#[test]
fn test_integral_mul_div_rounding() {
    let mut attr = attribute(BasicType::Int32, CollectionType::Single, 2);
    attr.update(1, 5i64);
    attr.update(2, 5i64);
    attr.commit(false);

    attr.apply_arithmetic(1, ArithOp::Mul(3.0));
    attr.apply_arithmetic(2, ArithOp::Div(2.0));
    attr.commit(false);

    let read = attr.reader().read();
    assert_eq!(read.get::<i64>(1), 15);
    assert_eq!(read.get::<i64>(2), 3);
}

/// Arithmetic on an undefined value leaves the sentinel.
#[test]
fn test_arithmetic_on_undefined_is_noop() {
    let mut attr = attribute(BasicType::Int16, CollectionType::Single, 1);
    attr.apply_arithmetic(1, ArithOp::Add(7.0));
    attr.commit(false);
    assert_eq!(attr.reader().read().get::<i64>(1), i16::MIN as i64);

    let mut attr = attribute(BasicType::Double, CollectionType::Single, 1);
    attr.apply_arithmetic(1, ArithOp::Mul(2.0));
    attr.commit(false);
    assert!(attr.reader().read().get::<f64>(1).is_nan());
}

/// Integral results wrap to the column width.
#[test]
fn test_int8_results_narrowed() {
    let mut attr = attribute(BasicType::Int8, CollectionType::Single, 1);
    attr.update(1, 100i64);
    attr.apply_arithmetic(1, ArithOp::Add(100.0));
    attr.commit(false);
    assert_eq!(attr.reader().read().get::<i64>(1), (200i64 as i8) as i64);
}

/// Float division by zero follows IEEE instead of being skipped.
#[test]
fn test_float_div_by_zero_is_ieee() {
    let mut attr = attribute(BasicType::Double, CollectionType::Single, 1);
    attr.update(1, 1.5);
    attr.apply_arithmetic(1, ArithOp::Div(0.0));
    attr.commit(false);
    assert_eq!(attr.reader().read().get::<f64>(1), f64::INFINITY);
    assert_eq!(attr.metrics().divide_by_zero, 0);
}

/// Float storage rounds through f32.
#[test]
fn test_float_column_rounds_to_f32() {
    let mut attr = attribute(BasicType::Float, CollectionType::Single, 1);
    attr.update(1, 0.1);
    attr.commit(false);
    assert_eq!(attr.reader().read().get::<f64>(1), 0.1f32 as f64);
}

// =============================================================================
// Divide-by-zero Skip Tests
// =============================================================================

/// DivWeight(0) leaves the weight and the rest of the batch applies.
#[test]
fn test_div_weight_zero_skipped_batch_continues() {
    let mut attr = attribute(BasicType::Int64, CollectionType::WeightedSet, 2);
    attr.append(1, 10i64, 8, false);
    attr.append(2, 20i64, 8, false);
    attr.commit(false);

    attr.adjust_weight(1, 10i64, WeightOp::Div(0));
    attr.adjust_weight(2, 20i64, WeightOp::Div(2));
    attr.append(1, 11i64, 3, false);
    attr.commit(false);

    let read = attr.reader().read();
    assert_eq!(
        read.get_weighted::<i64>(1),
        vec![Weighted::new(10, 8), Weighted::new(11, 3)]
    );
    assert_eq!(read.get_weighted::<i64>(2), vec![Weighted::new(20, 4)]);
    let metrics = attr.metrics();
    assert_eq!(metrics.divide_by_zero, 1);
    assert_eq!(metrics.changes_skipped, 1);
}

/// Integral Div(0) is skipped the same way as DivWeight(0).
#[test]
fn test_integral_value_div_zero_skipped() {
    let mut attr = attribute(BasicType::Int64, CollectionType::Single, 2);
    attr.update(1, 9i64);
    attr.update(2, 9i64);
    attr.apply_arithmetic(1, ArithOp::Div(0.0));
    attr.apply_arithmetic(2, ArithOp::Div(0.0));
    attr.apply_arithmetic(2, ArithOp::Add(1.0));
    attr.commit(false);

    let read = attr.reader().read();
    assert_eq!(read.get::<i64>(1), 9);
    assert_eq!(read.get::<i64>(2), 10);
    assert_eq!(attr.metrics().divide_by_zero, 2);
}

// =============================================================================
// Commit Ordering Tests
// =============================================================================

/// Two changes to the same document compose in enqueue order.
#[test]
fn test_two_changes_apply_in_order() {
    let mut attr = attribute(BasicType::Int64, CollectionType::Single, 1);
    attr.update(1, 2i64);
    attr.apply_arithmetic(1, ArithOp::Add(3.0));
    attr.apply_arithmetic(1, ArithOp::Mul(10.0));
    attr.commit(false);
    // (2 + 3) * 10, not 2 * 10 + 3
    assert_eq!(attr.reader().read().get::<i64>(1), 50);
}

/// Remove then append and append then remove differ.
#[test]
fn test_array_append_remove_order() {
    let mut attr = attribute(BasicType::String, CollectionType::Array, 2);
    attr.append(1, "x", 1, false);
    attr.remove(1, "x", 1);
    attr.remove(2, "x", 1);
    attr.append(2, "x", 1, false);
    attr.commit(false);

    let read = attr.reader().read();
    assert_eq!(read.value_count(1), 0);
    assert_eq!(read.get_all::<String>(2), vec!["x".to_string()]);
}

/// Arrays keep duplicates; remove drops every copy.
#[test]
fn test_array_duplicates_and_remove_all() {
    let mut attr = attribute(BasicType::Int32, CollectionType::Array, 1);
    for v in [4i64, 4, 5, 4] {
        attr.append(1, v, 99, false);
    }
    attr.commit(false);
    let read = attr.reader().read();
    assert_eq!(read.get_all::<i64>(1), vec![4, 4, 5, 4]);
    // Arrays ignore the supplied weight
    assert!(read.get_weighted::<i64>(1).iter().all(|w| w.weight == 1));
    drop(read);

    attr.remove(1, 4i64, 1);
    attr.commit(false);
    assert_eq!(attr.reader().read().get_all::<i64>(1), vec![5]);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Set(i64),
    Add(i64),
    Mul(i64),
    Clear,
}

fn model_apply(current: Option<i64>, op: Op) -> Option<i64> {
    match op {
        Op::Set(v) => Some(v),
        Op::Clear => None,
        Op::Add(n) => current.map(|v| v + n),
        Op::Mul(n) => current.map(|v| v * n),
    }
}

/// Randomized batches match sequential application against a model.
#[test]
fn test_random_batches_match_sequential_model() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let docs = 20u32;
    let mut attr = attribute(BasicType::Int64, CollectionType::Single, docs);
    let mut model: Vec<Option<i64>> = vec![None; docs as usize + 1];

    for _ in 0..8 {
        for _ in 0..40 {
            let doc = rng.gen_range(1..=docs);
            let op = match rng.gen_range(0..10) {
                0..=2 => Op::Set(rng.gen_range(-50..50)),
                3..=6 => Op::Add(rng.gen_range(-5..5)),
                7..=8 => Op::Mul(rng.gen_range(-2..=2)),
                _ => Op::Clear,
            };
            let accepted = match op {
                Op::Set(v) => attr.update(doc, v),
                Op::Add(n) => attr.apply_arithmetic(doc, ArithOp::Add(n as f64)),
                Op::Mul(n) => attr.apply_arithmetic(doc, ArithOp::Mul(n as f64)),
                Op::Clear => attr.clear_doc(doc),
            };
            assert!(accepted);
            model[doc as usize] = model_apply(model[doc as usize], op);
        }
        attr.commit(false);

        let read = attr.reader().read();
        for doc in 1..=docs {
            let expected = model[doc as usize].unwrap_or(i64::MIN);
            assert_eq!(read.get::<i64>(doc), expected, "doc {}", doc);
        }
    }
}

// =============================================================================
// Read Accessor Tests
// =============================================================================

/// Reads fail closed to the sentinel.
#[test]
fn test_reads_fail_closed() {
    let mut attr = attribute(BasicType::Int32, CollectionType::Single, 1);
    attr.update(1, 3i64);
    attr.commit(false);
    let read = attr.reader().read();

    assert_eq!(read.get::<i64>(99), i32::MIN as i64);
    assert_eq!(read.get::<String>(1), "");
    assert!(read.get::<f64>(1).is_nan());
    assert_eq!(read.get::<EnumHandle>(1), EnumHandle::UNDEFINED);
    assert!(read.get_all::<i64>(99).is_empty());
    assert_eq!(read.value_count(99), 0);
}

/// get_into reports the full count even when the buffer is short.
#[test]
fn test_get_into_reports_full_count() {
    let mut attr = attribute(BasicType::Int64, CollectionType::Array, 1);
    for v in 1..=5i64 {
        attr.append(1, v, 1, false);
    }
    attr.commit(false);

    let read = attr.reader().read();
    let mut buf = [0i64; 3];
    assert_eq!(read.get_into(1, &mut buf), 5);
    assert_eq!(buf, [1, 2, 3]);
}

/// Enum handles resolve to values through the dictionary.
#[test]
fn test_enum_handles_resolve() {
    let config = AttributeConfig::new(BasicType::String, CollectionType::Single)
        .with_fast_search(true);
    let mut attr = AttributeVector::new("e", config).unwrap();
    attr.add_docs(3);
    attr.update(1, "red");
    attr.update(2, "blue");
    attr.update(3, "red");
    attr.commit(false);

    let read = attr.reader().read();
    let guard = read.enum_guard();
    let red = guard.find_enum(&Value::from("red")).unwrap();
    assert_eq!(guard.get_enum(1), red);
    assert_eq!(guard.get_enum(3), red);
    assert_ne!(guard.get_enum(2), red);
    assert_eq!(guard.enum_value(red), Some(&Value::from("red")));
    assert_eq!(guard.ref_count(red), 2);
    assert!(guard.find_enum(&Value::from("green")).is_none());
}

// =============================================================================
// Statistics Tests
// =============================================================================

/// Forced statistics reflect the committed column.
#[test]
fn test_status_counts() {
    let mut attr = attribute(BasicType::Int32, CollectionType::WeightedSet, 3);
    attr.append(1, 1i64, 1, true);
    attr.append(1, 2i64, 1, true);
    attr.append(2, 1i64, 1, false);
    attr.commit(true);

    let status = attr.status();
    assert_eq!(status.num_docs, 4);
    assert_eq!(status.num_values, 3);
    assert_eq!(status.highest_value_count, 2);
    assert_eq!(status.updates, 3);
    assert_eq!(status.non_idempotent_updates, 2);
}

/// The throttle defers recomputation until the volume threshold.
#[test]
fn test_status_throttled_by_volume() {
    let config = AttributeConfig::new(BasicType::Int32, CollectionType::Array)
        .with_stat_update(3_600_000, 3);
    let mut attr = AttributeVector::new("t", config).unwrap();
    attr.add_doc();
    attr.commit(true);

    attr.append(1, 1i64, 1, false);
    attr.commit(false);
    assert_eq!(attr.status().num_values, 0);

    attr.append(1, 2i64, 1, false);
    attr.append(1, 3i64, 1, false);
    attr.commit(false);
    assert_eq!(attr.status().num_values, 3);
}
