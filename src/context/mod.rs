// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Flow item context
//!
//! A context is a nested mapping with string keys, addressed by dotted paths
//! such as `"histogram.bins"`. Elements write their own subtrees and merge
//! them into the context they received.

mod format;
mod merge;

pub use format::ContextTemplate;
pub use merge::{difference, intersection, merge, merge_in_place, ContextDiff};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::{FlowError, FlowResult};

/// Nested, dotted-key addressable mapping carried by every flow item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a nested context from a dotted path and its leaf value
    ///
    /// `Context::from_dotted("a.b", 1)` is `{"a": {"b": 1}}`.
    pub fn from_dotted(path: &str, value: impl Into<Value>) -> Self {
        let mut context = Self::new();
        context.set(path, value);
        context
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }

        let mut keys = path.split('.');
        let first = keys.next()?;
        let mut current = self.0.get(first)?;
        for key in keys {
            current = current.as_object()?.get(key)?;
        }
        Some(current)
    }

    /// Look up a value by dotted path, failing if it is absent
    pub fn require(&self, path: &str) -> FlowResult<&Value> {
        self.get(path).ok_or_else(|| FlowError::ContextKey {
            path: path.to_string(),
        })
    }

    /// Set a value at a dotted path
    ///
    /// Intermediate mappings are created as needed. A non-mapping value on
    /// the way is replaced by a mapping.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let keys: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = keys.split_last() else {
            return;
        };

        let mut map = &mut self.0;
        for key in parents {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(inner) = slot else {
                return;
            };
            map = inner;
        }
        map.insert(last.to_string(), value.into());
    }

    /// Remove the value at a dotted path and return it
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        match path.rsplit_once('.') {
            None => self.0.remove(path),
            Some((parent, last)) => {
                let mut map = &mut self.0;
                for key in parent.split('.') {
                    map = map.get_mut(key)?.as_object_mut()?;
                }
                map.remove(last)
            }
        }
    }

    /// Check whether the context contains a dotted path
    ///
    /// The last segment is a key of the mapping reached by the preceding
    /// ones, or, when that reaches a leaf, the leaf's string form:
    /// `{"fit": {"coordinate": "x"}}` contains both `"fit.coordinate"` and
    /// `"fit.coordinate.x"`.
    pub fn contains(&self, path: &str) -> bool {
        let Some((parent, last)) = path.rsplit_once('.') else {
            return self.0.contains_key(path);
        };

        match self.get(parent) {
            Some(Value::Object(map)) => map.contains_key(last),
            Some(Value::String(s)) => s == last,
            Some(other) => other.to_string() == last,
            None => false,
        }
    }

    /// Replace `key` with `other`, nesting the previous value inside it
    ///
    /// The old `self[key]` is stored at the deepest `other.key.key...`, so
    /// that a chain of elements rewriting the same key keeps its history:
    /// `{"variable": {"name": "x"}}` updated with `{"name": "n"}` becomes
    /// `{"variable": {"name": "n", "variable": {"name": "x"}}}`.
    pub fn update_nested(&mut self, key: &str, mut other: Map<String, Value>) {
        if let Some(previous) = self.0.remove(key) {
            insert_deepest(&mut other, key, previous);
        }
        self.0.insert(key.to_string(), Value::Object(other));
    }
}

fn insert_deepest(map: &mut Map<String, Value>, key: &str, value: Value) {
    if let Some(Value::Object(inner)) = map.get_mut(key) {
        insert_deepest(inner, key, value);
        return;
    }
    map.insert(key.to_string(), value);
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Context {
    type Error = FlowError;

    fn try_from(value: Value) -> FlowResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(FlowError::invalid_value(
                "context",
                format!("a context must be a mapping, got {}", other),
            )),
        }
    }
}

/// Compact JSON with sorted keys, stable across runs
impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
