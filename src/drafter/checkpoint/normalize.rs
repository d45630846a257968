// SPDX-License-Identifier: MIT

//! JSON-safety normalization of checkpoint payloads
//!
//! Anything handed to the store is first described as a [`Raw`] tree, a
//! closed set of container kinds. [`Normalizer::normalize`] turns that tree
//! into a `serde_json::Value` holding only primitives, arrays and
//! string-keyed objects. It is total: every input produces a value.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;

/// Default nesting limit for containers
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Rendered in place of a container nested deeper than the limit
pub const DEPTH_MARKER: &str = "<max depth exceeded>";

/// A value of arbitrary shape awaiting normalization
#[derive(Clone)]
pub enum Raw {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Lists, tuples and sets
    Seq(Vec<Raw>),
    /// Mapping with keys of any kind
    Map(Vec<(Raw, Raw)>),
    /// Overlay of mappings; a key in an earlier layer shadows later ones
    Layered(Vec<Vec<(Raw, Raw)>>),
    /// Not decomposable; persisted as its string form
    Opaque(Arc<dyn fmt::Display + Send + Sync>),
}

impl Raw {
    /// Wrap a value that only has a string form
    pub fn opaque(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Mapping with string keys
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Raw)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Raw::Str(k.into()), v))
                .collect(),
        )
    }

    /// Capture anything serializable
    ///
    /// Serializer failures (e.g. non-string map keys) degrade to an opaque
    /// marker instead of an error.
    pub fn capture<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::from(v),
            Err(e) => Self::opaque(format!("<unserializable: {}>", e)),
        }
    }
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raw::Null => f.write_str("Null"),
            Raw::Bool(b) => write!(f, "Bool({})", b),
            Raw::Int(i) => write!(f, "Int({})", i),
            Raw::UInt(u) => write!(f, "UInt({})", u),
            Raw::Float(x) => write!(f, "Float({})", x),
            Raw::Str(s) => write!(f, "Str({:?})", s),
            Raw::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Raw::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Raw::Layered(layers) => f.debug_tuple("Layered").field(layers).finish(),
            Raw::Opaque(v) => write!(f, "Opaque({})", v),
        }
    }
}

impl From<Value> for Raw {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Raw::Null,
            Value::Bool(b) => Raw::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Raw::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Raw::UInt(u)
                } else {
                    Raw::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Raw::Str(s),
            Value::Array(items) => Raw::Seq(items.into_iter().map(Raw::from).collect()),
            Value::Object(obj) => {
                Raw::Map(obj.into_iter().map(|(k, v)| (Raw::Str(k), v.into())).collect())
            }
        }
    }
}

impl From<&str> for Raw {
    fn from(s: &str) -> Self {
        Raw::Str(s.to_string())
    }
}

impl From<String> for Raw {
    fn from(s: String) -> Self {
        Raw::Str(s)
    }
}

impl From<bool> for Raw {
    fn from(b: bool) -> Self {
        Raw::Bool(b)
    }
}

impl From<i64> for Raw {
    fn from(i: i64) -> Self {
        Raw::Int(i)
    }
}

impl From<u64> for Raw {
    fn from(u: u64) -> Self {
        Raw::UInt(u)
    }
}

impl From<f64> for Raw {
    fn from(x: f64) -> Self {
        Raw::Float(x)
    }
}

impl From<Vec<Raw>> for Raw {
    fn from(items: Vec<Raw>) -> Self {
        Raw::Seq(items)
    }
}

/// Recursive-descent normalizer with a depth guard
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_depth: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Normalizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn normalize(&self, raw: &Raw) -> Value {
        self.visit(raw, 0)
    }

    fn visit(&self, raw: &Raw, depth: usize) -> Value {
        match raw {
            Raw::Null => Value::Null,
            Raw::Bool(b) => Value::Bool(*b),
            Raw::Int(i) => Value::from(*i),
            Raw::UInt(u) => Value::from(*u),
            Raw::Float(x) => Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(x.to_string())),
            Raw::Str(s) => Value::String(s.clone()),
            Raw::Opaque(v) => Value::String(v.to_string()),
            Raw::Seq(_) | Raw::Map(_) | Raw::Layered(_) if depth >= self.max_depth => {
                Value::String(DEPTH_MARKER.to_string())
            }
            Raw::Seq(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.visit(item, depth + 1))
                    .collect(),
            ),
            Raw::Map(entries) => {
                let mut obj = Map::new();
                self.insert_entries(&mut obj, entries, depth);
                Value::Object(obj)
            }
            Raw::Layered(layers) => {
                // Flatten back to front so earlier layers overwrite later ones.
                let mut obj = Map::new();
                for layer in layers.iter().rev() {
                    self.insert_entries(&mut obj, layer, depth);
                }
                Value::Object(obj)
            }
        }
    }

    fn insert_entries(&self, obj: &mut Map<String, Value>, entries: &[(Raw, Raw)], depth: usize) {
        for (key, value) in entries {
            obj.insert(self.key_string(key, depth), self.visit(value, depth + 1));
        }
    }

    fn key_string(&self, key: &Raw, depth: usize) -> String {
        match self.visit(key, depth + 1) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

/// Normalize with the default depth limit
pub fn normalize(raw: &Raw) -> Value {
    Normalizer::default().normalize(raw)
}
