//! The decoded document: a tree of maps, arrays, and scalars (spec §3).
//!
//! Built incrementally by append during a decode session and never mutated
//! after construction (spec §9 "Accumulating document"). Parent-context
//! lookups (`optional_variable_name`, `length_variable_name`) read this tree
//! through [`Value::get_path`]; nothing holds a back-pointer into it.

use indexmap::IndexMap;
use serde::Serialize;

/// A node in the decoded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Map(IndexMap<String, Value>),
    Array(Vec<Value>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn empty_map() -> Self {
        Value::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer, if it holds a numeric kind
    /// representable as `u64`. Used by `dynamic_bytes`/`repetitive` length
    /// resolution.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Returns the value as a signed integer, if it holds a numeric kind
    /// representable as `i64`. Used by `optional_variable_value` comparisons,
    /// which are declared as signed in the schema regardless of the
    /// underlying field's `data_type`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Resolves a dotted path (`"a.b.c"`) against this value, treated as the
    /// root/parent context. Only walks through `Map` nodes; any other shape
    /// along the way is a resolution failure.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for segment in path.split('.') {
            cur = cur.as_map()?.get(segment)?;
        }
        Some(cur)
    }

    /// Inserts `value` under `name` in this node, which must be a `Map`.
    /// Panics if called on a non-map node; item parsers only ever write into
    /// maps they themselves constructed (record bodies, compound bodies,
    /// fixed_bitfield bodies), so this is an internal invariant, not a
    /// user-facing error path.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.as_map_mut()
            .expect("insert target must be a map")
            .insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_path_walks_nested_maps() {
        let mut inner = Value::empty_map();
        inner.insert("mode", Value::UInt(1));

        let mut outer = Value::empty_map();
        outer.insert("ctx", inner);

        assert_eq!(outer.get_path("ctx.mode"), Some(&Value::UInt(1)));
        assert_eq!(outer.get_path("ctx.missing"), None);
        assert_eq!(outer.get_path("missing.mode"), None);
    }

    #[test]
    fn as_u64_accepts_nonnegative_int() {
        assert_eq!(Value::Int(5).as_u64(), Some(5));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::UInt(7).as_u64(), Some(7));
        assert_eq!(Value::Str("x".into()).as_u64(), None);
    }
}
