//! Document value model
//!
//! Every document, constraint and error payload in docvet is a [`Value`]:
//! a tagged union over the scalar and container shapes the engine
//! understands.
//!
//! # Design Principles
//!
//! - Structural equality, deep and order-insensitive for maps and sets
//! - Insertion order is preserved and observable for maps
//! - `Eq + Hash` hold for every variant (floats are bit-canonicalized)
//! - A total, deterministic ordering exists for error sorting

mod convert;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::{IndexMap, IndexSet};

/// An insertion-ordered mapping with arbitrary hashable keys.
pub type Map = IndexMap<Value, Value>;

/// An insertion-ordered set of values.
pub type ValueSet = IndexSet<Value>;

/// A field name in a document or schema. Normally a string, but any
/// hashable value is accepted.
pub type FieldName = Value;

/// A tree-shaped document value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence of content.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// Calendar date without time of day.
    Date(NaiveDate),
    /// Date and time without timezone.
    DateTime(NaiveDateTime),
    /// Ordered sequence.
    Seq(Vec<Value>),
    /// Insertion-ordered mapping.
    Map(Map),
    /// Mutable set.
    Set(ValueSet),
    /// Immutable set.
    FrozenSet(ValueSet),
    /// Fixed-arity sequence.
    Tuple(Vec<Value>),
    /// A value of a user-registered type. `type_name` keys the predicate
    /// in the type registry; `data` carries the payload structurally.
    Opaque {
        /// Registered type name.
        type_name: String,
        /// Structural payload.
        data: Box<Value>,
    },
}

impl Value {
    /// Returns the name of this value's concrete type as used by the
    /// builtin type catalog.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Seq(_) => "list",
            Value::Map(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Tuple(_) => "tuple",
            Value::Opaque { .. } => "opaque",
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrows the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrows the mapping content, if this is a map.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrows the mapping content, if this is a map.
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrows the elements of a sequence-like value (`Seq` or `Tuple`).
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for mappings.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// `true` for sequences in the container-algebra sense: lists and
    /// tuples, excluding strings.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Seq(_) | Value::Tuple(_))
    }

    /// `true` for sets, mutable or frozen.
    pub fn is_set_like(&self) -> bool {
        matches!(self, Value::Set(_) | Value::FrozenSet(_))
    }

    /// `true` for values with a defined length.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            Value::String(_)
                | Value::Bytes(_)
                | Value::Seq(_)
                | Value::Map(_)
                | Value::Set(_)
                | Value::FrozenSet(_)
                | Value::Tuple(_)
        )
    }

    /// `true` for values that can be iterated element-wise. Strings count,
    /// matching the container algebra.
    pub fn is_iterable(&self) -> bool {
        self.is_sized()
    }

    /// `true` for values supporting membership tests.
    pub fn is_container(&self) -> bool {
        self.is_sized()
    }

    /// The number of elements (characters for strings, entries for maps).
    /// `None` for unsized values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Seq(v) | Value::Tuple(v) => Some(v.len()),
            Value::Map(m) => Some(m.len()),
            Value::Set(s) | Value::FrozenSet(s) => Some(s.len()),
            _ => None,
        }
    }

    /// `true` when the value is sized and holds no elements.
    pub fn is_empty_sized(&self) -> bool {
        self.len() == Some(0)
    }

    /// Iterates the members of a container: elements of sequences and
    /// sets, keys of mappings. Scalars and strings yield nothing.
    pub fn members(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::Seq(v) | Value::Tuple(v) => Box::new(v.iter()),
            Value::Set(s) | Value::FrozenSet(s) => Box::new(s.iter()),
            Value::Map(m) => Box::new(m.keys()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Membership test. For mappings the keys are probed, for strings a
    /// substring test is performed when `needle` is itself a string.
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::Seq(v) | Value::Tuple(v) => v.contains(needle),
            Value::Set(s) | Value::FrozenSet(s) => s.contains(needle),
            Value::Map(m) => m.contains_key(needle),
            Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
            _ => false,
        }
    }

    /// Numeric ordering across `Int` and `Float`, lexical ordering for
    /// strings, temporal ordering for dates. `None` when the two values
    /// are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total deterministic ordering: variant rank first, then contents.
    /// Used to sort error paths; unrelated to the semantics of `min`/`max`.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) => 2,
                Value::Float(_) => 3,
                Value::Bytes(_) => 4,
                Value::String(_) => 5,
                Value::Date(_) => 6,
                Value::DateTime(_) => 7,
                Value::Seq(_) => 8,
                Value::Map(_) => 9,
                Value::Set(_) => 10,
                Value::FrozenSet(_) => 11,
                Value::Tuple(_) => 12,
                Value::Opaque { .. } => 13,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Seq(a), Value::Seq(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                seq_total_cmp(a.iter(), b.iter())
            }
            (Value::Set(a), Value::Set(b)) | (Value::FrozenSet(a), Value::FrozenSet(b)) => {
                seq_total_cmp(a.iter(), b.iter())
            }
            (Value::Map(a), Value::Map(b)) => {
                seq_total_cmp(a.keys(), b.keys()).then_with(|| seq_total_cmp(a.values(), b.values()))
            }
            (
                Value::Opaque { type_name: an, data: ad },
                Value::Opaque { type_name: bn, data: bd },
            ) => an.cmp(bn).then_with(|| ad.total_cmp(bd)),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

fn seq_total_cmp<'a>(
    a: impl Iterator<Item = &'a Value>,
    b: impl Iterator<Item = &'a Value>,
) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.total_cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

// Floats break derived equality: NaN != NaN would make Value unusable as a
// map key. Equality and hashing treat all NaNs as one value and -0.0 as 0.0.

fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn float_hash<H: Hasher>(f: f64, state: &mut H) {
    let canonical = if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    };
    canonical.hash(state);
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) | (Value::FrozenSet(a), Value::FrozenSet(b)) => a == b,
            (
                Value::Opaque { type_name: an, data: ad },
                Value::Opaque { type_name: bn, data: bd },
            ) => an == bn && ad == bd,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => float_hash(*f, state),
            Value::Bytes(b) => b.hash(state),
            Value::String(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Seq(v) | Value::Tuple(v) => v.hash(state),
            // Map and set equality are order-insensitive, so their hashes
            // must be too: combine entry hashes commutatively.
            Value::Map(m) => {
                m.len().hash(state);
                let mut acc = 0u64;
                for (k, v) in m {
                    let mut h = std::collections::hash_map::DefaultHasher::new();
                    k.hash(&mut h);
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                acc.hash(state);
            }
            Value::Set(s) | Value::FrozenSet(s) => {
                s.len().hash(state);
                let mut acc = 0u64;
                for v in s {
                    let mut h = std::collections::hash_map::DefaultHasher::new();
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                acc.hash(state);
            }
            Value::Opaque { type_name, data } => {
                type_name.hash(state);
                data.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(d) => write!(f, "{}", d),
            Value::Seq(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
            Value::Tuple(v) => {
                write!(f, "(")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, ")")
            }
            Value::Set(s) | Value::FrozenSet(s) => {
                write!(f, "{{")?;
                for (i, x) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "}}")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Opaque { type_name, data } => write!(f, "<{} {}>", type_name, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_is_deep() {
        let a = Value::Seq(vec![Value::Int(1), Value::String("x".into())]);
        let b = Value::Seq(vec![Value::Int(1), Value::String("x".into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_equality_ignores_insertion_order() {
        let mut m1 = Map::new();
        m1.insert(Value::from("a"), Value::Int(1));
        m1.insert(Value::from("b"), Value::Int(2));
        let mut m2 = Map::new();
        m2.insert(Value::from("b"), Value::Int(2));
        m2.insert(Value::from("a"), Value::Int(1));
        assert_eq!(Value::Map(m1), Value::Map(m2));
    }

    #[test]
    fn test_map_preserves_insertion_order() {
        let mut m = Map::new();
        m.insert(Value::from("z"), Value::Int(1));
        m.insert(Value::from("a"), Value::Int(2));
        let keys: Vec<_> = m.keys().cloned().collect();
        assert_eq!(keys, vec![Value::from("z"), Value::from("a")]);
    }

    #[test]
    fn test_nan_is_self_equal() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_numeric_comparison_crosses_int_and_float() {
        assert_eq!(
            Value::Int(5).compare(&Value::Float(5.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(10.0).compare(&Value::Int(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_incomparable_values() {
        assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
    }

    #[test]
    fn test_string_length_counts_chars() {
        assert_eq!(Value::from("héllo").len(), Some(5));
    }

    #[test]
    fn test_contains_probes_map_keys() {
        let mut m = Map::new();
        m.insert(Value::from("k"), Value::Int(1));
        let v = Value::Map(m);
        assert!(v.contains(&Value::from("k")));
        assert!(!v.contains(&Value::Int(1)));
    }

    #[test]
    fn test_substring_containment() {
        assert!(Value::from("foobar").contains(&Value::from("oba")));
    }

    #[test]
    fn test_total_order_is_deterministic() {
        let mut values = vec![Value::from("b"), Value::Int(3), Value::Null, Value::from("a")];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![Value::Null, Value::Int(3), Value::from("a"), Value::from("b")]
        );
    }
}
