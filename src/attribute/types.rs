//! Value model: basic types, collection types, values and enum handles.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Dense document slot. Document 0 is reserved.
pub type DocId = u32;

/// Element type stored by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
}

impl BasicType {
    /// On-disk width of one raw element, 0 for variable width.
    pub fn fixed_size(self) -> usize {
        match self {
            BasicType::Int8 => 1,
            BasicType::Int16 => 2,
            BasicType::Int32 | BasicType::Float => 4,
            BasicType::Int64 | BasicType::Double => 8,
            BasicType::String => 0,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            BasicType::Int8 | BasicType::Int16 | BasicType::Int32 | BasicType::Int64
        )
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, BasicType::Float | BasicType::Double)
    }

    /// The undefined sentinel for this type.
    pub fn undefined(self) -> Value {
        match self {
            BasicType::Int8 => Value::Int(i8::MIN as i64),
            BasicType::Int16 => Value::Int(i16::MIN as i64),
            BasicType::Int32 => Value::Int(i32::MIN as i64),
            BasicType::Int64 => Value::Int(i64::MIN),
            BasicType::Float | BasicType::Double => Value::Float(f64::NAN),
            BasicType::String => Value::Str(String::new()),
        }
    }

    pub fn is_undefined(self, value: &Value) -> bool {
        match value {
            Value::Float(v) => v.is_nan(),
            other => *other == self.undefined(),
        }
    }

    /// Coerce a value into this type's storage domain.
    ///
    /// Returns `None` when the value kind does not fit. Integers are narrowed
    /// with a wrapping cast, floats are rounded through `f32` for `Float`.
    pub fn normalize(self, value: Value) -> Option<Value> {
        match (self, value) {
            (t, Value::Int(v)) if t.is_integral() => Some(Value::Int(self.narrow_int(v))),
            (t, Value::Float(v)) if t.is_floating_point() => {
                Some(Value::Float(self.narrow_float(v)))
            }
            (BasicType::String, Value::Str(s)) => Some(Value::Str(s)),
            _ => None,
        }
    }

    pub(crate) fn narrow_int(self, v: i64) -> i64 {
        match self {
            BasicType::Int8 => v as i8 as i64,
            BasicType::Int16 => v as i16 as i64,
            BasicType::Int32 => v as i32 as i64,
            _ => v,
        }
    }

    pub(crate) fn narrow_float(self, v: f64) -> f64 {
        match self {
            BasicType::Float => v as f32 as f64,
            _ => v,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BasicType::Int8 => 1,
            BasicType::Int16 => 2,
            BasicType::Int32 => 3,
            BasicType::Int64 => 4,
            BasicType::Float => 5,
            BasicType::Double => 6,
            BasicType::String => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BasicType::Int8),
            2 => Some(BasicType::Int16),
            3 => Some(BasicType::Int32),
            4 => Some(BasicType::Int64),
            5 => Some(BasicType::Float),
            6 => Some(BasicType::Double),
            7 => Some(BasicType::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BasicType::Int8 => "int8",
            BasicType::Int16 => "int16",
            BasicType::Int32 => "int32",
            BasicType::Int64 => "int64",
            BasicType::Float => "float",
            BasicType::Double => "double",
            BasicType::String => "string",
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many values a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    /// Exactly one value per document
    Single,
    /// Ordered values, duplicates allowed, weight always 1
    Array,
    /// Unique values, each with an integer weight
    WeightedSet,
}

impl CollectionType {
    pub fn is_multi_value(self) -> bool {
        !matches!(self, CollectionType::Single)
    }

    pub fn is_weighted_set(self) -> bool {
        matches!(self, CollectionType::WeightedSet)
    }

    pub fn code(self) -> u8 {
        match self {
            CollectionType::Single => 1,
            CollectionType::Array => 2,
            CollectionType::WeightedSet => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CollectionType::Single),
            2 => Some(CollectionType::Array),
            3 => Some(CollectionType::WeightedSet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionType::Single => "single",
            CollectionType::Array => "array",
            CollectionType::WeightedSet => "weighted_set",
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value.
///
/// Equality, ordering and hashing are total: floats compare by
/// `f64::total_cmp`, so NaN equals NaN and values can key a dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::Float(_) => 1,
            Value::Str(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A value with its weight. Unweighted collections use weight 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weighted<T> {
    pub value: T,
    pub weight: i32,
}

impl<T> Weighted<T> {
    pub fn new(value: T, weight: i32) -> Self {
        Self { value, weight }
    }

    pub fn unweighted(value: T) -> Self {
        Self { value, weight: 1 }
    }
}

/// Handle of an entry in a column's enum dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnumHandle(u32);

impl EnumHandle {
    /// Returned when a column has no dictionary or the document is out of range.
    pub const UNDEFINED: EnumHandle = EnumHandle(u32::MAX);

    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }
}
