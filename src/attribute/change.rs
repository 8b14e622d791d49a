//! Queued changes and the single code path that applies one to a document.
//!
//! A `Change` is a mutation intent for one document. Changes wait in the
//! writer's `ChangeVector` until commit, where they are replayed in enqueue
//! order. `apply_change` works on a detached copy of one document's values,
//! so the caller owns loading and storing.

use super::types::{BasicType, CollectionType, DocId, Value, Weighted};

/// Weight adjustment applied to an existing weighted-set entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightOp {
    Increase(i32),
    Mul(i32),
    Div(i32),
}

impl WeightOp {
    /// New weight, or `None` when the operation divides by zero.
    pub fn apply(self, weight: i32) -> Option<i32> {
        match self {
            WeightOp::Increase(n) => Some(weight.wrapping_add(n)),
            WeightOp::Mul(n) => Some(weight.wrapping_mul(n)),
            WeightOp::Div(0) => None,
            WeightOp::Div(n) => Some(weight.wrapping_div(n)),
        }
    }
}

/// Arithmetic applied to a single numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add(f64),
    Sub(f64),
    Mul(f64),
    Div(f64),
}

impl ArithOp {
    /// True if applying the op can never change a value.
    pub fn is_noop(self) -> bool {
        matches!(self, ArithOp::Div(d) | ArithOp::Mul(d) if d == 1.0)
            || matches!(self, ArithOp::Add(d) | ArithOp::Sub(d) if d == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Replace the value of a single-value document
    Update { doc: DocId, value: Value },
    /// Reset the document to its empty state
    ClearDoc { doc: DocId },
    Append {
        doc: DocId,
        value: Value,
        weight: i32,
        do_count: bool,
    },
    Remove { doc: DocId, value: Value, weight: i32 },
    AdjustWeight { doc: DocId, value: Value, op: WeightOp },
    Arithmetic { doc: DocId, op: ArithOp },
}

impl Change {
    pub fn doc(&self) -> DocId {
        match self {
            Change::Update { doc, .. }
            | Change::ClearDoc { doc }
            | Change::Append { doc, .. }
            | Change::Remove { doc, .. }
            | Change::AdjustWeight { doc, .. }
            | Change::Arithmetic { doc, .. } => *doc,
        }
    }

    /// Whether this change counts as a non-idempotent update in the status.
    pub fn is_non_idempotent(&self) -> bool {
        match self {
            Change::Append { do_count, .. } => *do_count,
            Change::AdjustWeight { .. } | Change::Arithmetic { .. } => true,
            _ => false,
        }
    }
}

/// Ordered, append-only queue of pending changes.
#[derive(Debug, Default)]
pub struct ChangeVector {
    changes: Vec<Change>,
}

impl ChangeVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Take every queued change, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

/// Result of applying one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Done,
    /// Skipped because it would divide by zero
    DivideByZero,
}

/// Apply `change` to the detached values of one document.
///
/// `values` holds exactly one entry for single-value columns. The caller has
/// already checked that the change kind fits the column.
pub fn apply_change(
    values: &mut Vec<Weighted<Value>>,
    change: &Change,
    basic_type: BasicType,
    collection: CollectionType,
) -> Applied {
    match change {
        Change::Update { value, .. } => {
            values.clear();
            values.push(Weighted::unweighted(value.clone()));
        }
        Change::ClearDoc { .. } => {
            values.clear();
            if !collection.is_multi_value() {
                values.push(Weighted::unweighted(basic_type.undefined()));
            }
        }
        Change::Append { value, weight, .. } => match collection {
            CollectionType::WeightedSet => {
                if let Some(existing) = values.iter_mut().find(|w| w.value == *value) {
                    existing.weight = *weight;
                } else {
                    values.push(Weighted::new(value.clone(), *weight));
                }
            }
            _ => values.push(Weighted::unweighted(value.clone())),
        },
        Change::Remove { value, .. } => values.retain(|w| w.value != *value),
        Change::AdjustWeight { value, op, .. } => {
            if let Some(existing) = values.iter_mut().find(|w| w.value == *value) {
                match op.apply(existing.weight) {
                    Some(weight) => existing.weight = weight,
                    None => return Applied::DivideByZero,
                }
            }
        }
        Change::Arithmetic { op, .. } => {
            if let Some(current) = values.first_mut() {
                match apply_arithmetic(&current.value, *op, basic_type) {
                    Some(value) => current.value = value,
                    None => return Applied::DivideByZero,
                }
            }
        }
    }
    Applied::Done
}

/// Apply `op` to `value`, or `None` for an integral divide by zero.
///
/// Undefined values pass through unchanged. Integral results of `Mul` and
/// `Div` are computed in floating point and rounded half up.
pub fn apply_arithmetic(value: &Value, op: ArithOp, basic_type: BasicType) -> Option<Value> {
    if basic_type.is_undefined(value) {
        return Some(value.clone());
    }
    match value {
        Value::Int(v) => {
            let v = *v;
            let result = match op {
                ArithOp::Add(d) => v.wrapping_add(d as i64),
                ArithOp::Sub(d) => v.wrapping_sub(d as i64),
                ArithOp::Mul(d) => round_half_up(v as f64 * d),
                ArithOp::Div(d) if d == 0.0 => return None,
                ArithOp::Div(d) => round_half_up(v as f64 / d),
            };
            Some(Value::Int(basic_type.narrow_int(result)))
        }
        Value::Float(v) => {
            let result = match op {
                ArithOp::Add(d) => v + d,
                ArithOp::Sub(d) => v - d,
                ArithOp::Mul(d) => v * d,
                ArithOp::Div(d) => v / d,
            };
            Some(Value::Float(basic_type.narrow_float(result)))
        }
        Value::Str(_) => Some(value.clone()),
    }
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
