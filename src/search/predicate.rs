//! Term predicates over stored values.
//!
//! Comparison is exact within one value kind. A bound of another kind never
//! matches and undefined values never match.

use crate::attribute::{BasicType, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Gte(Value),
    Gt(Value),
    Lte(Value),
    Lt(Value),
    /// Inclusive on both ends
    Range(Value, Value),
}

impl Predicate {
    /// Normalize the bounds into `basic_type`'s storage domain.
    ///
    /// `None` when a bound cannot be stored by the column, in which case no
    /// document can match.
    pub fn normalize(&self, basic_type: BasicType) -> Option<Predicate> {
        let n = |v: &Value| basic_type.normalize(v.clone());
        Some(match self {
            Predicate::Eq(v) => Predicate::Eq(n(v)?),
            Predicate::Gte(v) => Predicate::Gte(n(v)?),
            Predicate::Gt(v) => Predicate::Gt(n(v)?),
            Predicate::Lte(v) => Predicate::Lte(n(v)?),
            Predicate::Lt(v) => Predicate::Lt(n(v)?),
            Predicate::Range(low, high) => Predicate::Range(n(low)?, n(high)?),
        })
    }

    pub fn matches(&self, basic_type: BasicType, value: &Value) -> bool {
        if basic_type.is_undefined(value) {
            return false;
        }
        match self {
            Predicate::Eq(v) => value == v,
            Predicate::Gte(v) => value >= v,
            Predicate::Gt(v) => value > v,
            Predicate::Lte(v) => value <= v,
            Predicate::Lt(v) => value < v,
            Predicate::Range(low, high) => value >= low && value <= high,
        }
    }

    /// The single value this predicate can match, for dictionary lookup.
    pub fn exact_term(&self) -> Option<&Value> {
        match self {
            Predicate::Eq(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_inclusive() {
        let p = Predicate::Range(Value::Int(3), Value::Int(5));
        assert!(!p.matches(BasicType::Int32, &Value::Int(2)));
        assert!(p.matches(BasicType::Int32, &Value::Int(3)));
        assert!(p.matches(BasicType::Int32, &Value::Int(5)));
        assert!(!p.matches(BasicType::Int32, &Value::Int(6)));
    }

    #[test]
    fn test_undefined_never_matches() {
        let p = Predicate::Lt(Value::Int(0));
        assert!(!p.matches(BasicType::Int32, &BasicType::Int32.undefined()));
        assert!(p.matches(BasicType::Int32, &Value::Int(-1)));

        let p = Predicate::Lte(Value::from("zzz"));
        assert!(!p.matches(BasicType::String, &Value::from("")));
    }

    #[test]
    fn test_normalize_narrows_and_rejects_kind() {
        let p = Predicate::Eq(Value::Int(300)).normalize(BasicType::Int8);
        assert_eq!(p, Some(Predicate::Eq(Value::Int(44))));

        assert!(Predicate::Gt(Value::from("x"))
            .normalize(BasicType::Int64)
            .is_none());
    }

    #[test]
    fn test_string_order() {
        let p = Predicate::Gte(Value::from("m"));
        assert!(p.matches(BasicType::String, &Value::from("n")));
        assert!(!p.matches(BasicType::String, &Value::from("a")));
    }
}
