// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Context merge, difference and intersection
//!
//! `level` bounds the recursion into nested mappings. `None` recurses
//! without limit; `Some(0)` compares or replaces top-level values whole.

use serde_json::{Map, Value};

use super::Context;

/// Items present on one side only, from each side's point of view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDiff {
    /// Items of the first context not contained in the second
    pub left: Context,
    /// Items of the second context not contained in the first
    pub right: Context,
}

impl ContextDiff {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Merge `update` into a copy of `base`
///
/// Leaves of `update` overwrite leaves of `base` at the same path. Keys
/// present on one side only are kept. Neither argument is modified.
pub fn merge(base: &Context, update: &Context, level: Option<usize>) -> Context {
    let mut merged = base.clone();
    merge_in_place(&mut merged, update, level);
    merged
}

/// Merge `update` into `base` in place
pub fn merge_in_place(base: &mut Context, update: &Context, level: Option<usize>) {
    merge_maps(&mut base.0, &update.0, level);
}

fn merge_maps(base: &mut Map<String, Value>, update: &Map<String, Value>, level: Option<usize>) {
    for (key, value) in update {
        if let (Some(next), Value::Object(nested)) = (deeper(level), value) {
            if let Some(Value::Object(existing)) = base.get_mut(key) {
                merge_maps(existing, nested, next);
                continue;
            }
        }
        base.insert(key.clone(), value.clone());
    }
}

/// One level down, or `None` if no further recursion is allowed
fn deeper(level: Option<usize>) -> Option<Option<usize>> {
    match level {
        None => Some(None),
        Some(0) => None,
        Some(n) => Some(Some(n - 1)),
    }
}

/// Symmetric structural difference of two contexts
pub fn difference(a: &Context, b: &Context, level: Option<usize>) -> ContextDiff {
    ContextDiff {
        left: one_sided(&a.0, &b.0, level).into(),
        right: one_sided(&b.0, &a.0, level).into(),
    }
}

fn one_sided(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    level: Option<usize>,
) -> Map<String, Value> {
    if a == b {
        return Map::new();
    }
    let Some(next) = deeper(level) else {
        return a.clone();
    };

    let mut result = Map::new();
    for (key, value) in a {
        match b.get(key) {
            None => {
                result.insert(key.clone(), value.clone());
            }
            Some(other) if other == value => {}
            Some(other) => match (value, other) {
                (Value::Object(left), Value::Object(right)) => {
                    let nested = one_sided(left, right, next);
                    if !nested.is_empty() {
                        result.insert(key.clone(), Value::Object(nested));
                    }
                }
                _ => {
                    result.insert(key.clone(), value.clone());
                }
            },
        }
    }
    result
}

/// Items contained in every context
///
/// With `Some(0)` all contexts must be equal, otherwise the result is
/// empty. With `Some(1)` only equal top-level values are kept.
pub fn intersection(contexts: &[&Context], level: Option<usize>) -> Context {
    let Some((first, rest)) = contexts.split_first() else {
        return Context::new();
    };

    let mut result = first.0.clone();
    for other in rest {
        if level == Some(0) {
            if other.0 != result || result.is_empty() {
                return Context::new();
            }
            continue;
        }
        intersect_maps(&mut result, &other.0, level);
        if result.is_empty() {
            break;
        }
    }
    result.into()
}

fn intersect_maps(result: &mut Map<String, Value>, other: &Map<String, Value>, level: Option<usize>) {
    // differing mappings are intersected only while levels remain
    let recurse = level != Some(1);
    let next = level.map(|n| n.saturating_sub(1));
    result.retain(|key, value| match other.get(key) {
        None => false,
        Some(theirs) if *theirs == *value => true,
        Some(Value::Object(theirs)) if recurse => match value {
            Value::Object(ours) => {
                intersect_maps(ours, theirs, next);
                !ours.is_empty()
            }
            _ => false,
        },
        Some(_) => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        Context::try_from(value).unwrap()
    }

    #[test]
    fn test_merge_nested_mappings() {
        let merged = merge(&ctx(json!({"x": {"a": 1}})), &ctx(json!({"x": {"b": 2}})), None);
        assert_eq!(merged, ctx(json!({"x": {"a": 1, "b": 2}})));
    }

    #[test]
    fn test_merge_leaf_overwrites() {
        let merged = merge(&ctx(json!({"x": 1})), &ctx(json!({"x": 2})), None);
        assert_eq!(merged, ctx(json!({"x": 2})));
    }

    #[test]
    fn test_merge_keeps_one_sided_keys_and_inputs() {
        let base = ctx(json!({"a": 1, "b": {"c": 3}}));
        let update = ctx(json!({"b": {"d": 4}, "e": 5}));
        let merged = merge(&base, &update, None);

        assert_eq!(merged, ctx(json!({"a": 1, "b": {"c": 3, "d": 4}, "e": 5})));
        assert_eq!(base, ctx(json!({"a": 1, "b": {"c": 3}})));
        assert_eq!(update, ctx(json!({"b": {"d": 4}, "e": 5})));
    }

    #[test]
    fn test_merge_level_limits_recursion() {
        let base = ctx(json!({"x": {"y": {"a": 1}, "k": 0}}));
        let update = ctx(json!({"x": {"y": {"b": 2}}}));

        assert_eq!(merge(&base, &update, Some(0)), ctx(json!({"x": {"y": {"b": 2}}})));
        assert_eq!(
            merge(&base, &update, Some(1)),
            ctx(json!({"x": {"y": {"b": 2}, "k": 0}}))
        );
        assert_eq!(
            merge(&base, &update, Some(2)),
            ctx(json!({"x": {"y": {"a": 1, "b": 2}, "k": 0}}))
        );
    }

    #[test]
    fn test_merge_mapping_replaces_leaf() {
        let merged = merge(&ctx(json!({"b": 2})), &ctx(json!({"b": {"c": 1}})), None);
        assert_eq!(merged, ctx(json!({"b": {"c": 1}})));
    }

    #[test]
    fn test_difference_is_symmetric() {
        let a = ctx(json!({"x": {"a": 1, "b": 2}, "y": 0}));
        let b = ctx(json!({"x": {"a": 1, "c": 3}, "z": 9}));
        let diff = difference(&a, &b, None);

        assert_eq!(diff.left, ctx(json!({"x": {"b": 2}, "y": 0})));
        assert_eq!(diff.right, ctx(json!({"x": {"c": 3}, "z": 9})));
        assert!(difference(&a, &a, None).is_empty());
    }

    #[test]
    fn test_difference_level_zero_returns_whole() {
        let a = ctx(json!({"x": {"a": 1}, "y": 0}));
        let b = ctx(json!({"x": {"a": 1}}));
        assert_eq!(difference(&a, &b, Some(0)).left, a);
        assert_eq!(difference(&a, &b, Some(1)).left, ctx(json!({"y": 0})));
    }

    #[test]
    fn test_intersection_levels() {
        let d1 = ctx(json!({"1": "1", "2": {"3": "3", "4": "4"}}));
        let d2 = ctx(json!({"2": {"4": "4"}}));

        assert_eq!(intersection(&[&d1, &d2], None), d2);
        assert!(intersection(&[&d1, &d2], Some(0)).is_empty());
        assert!(intersection(&[&d1, &d2], Some(1)).is_empty());
        assert_eq!(intersection(&[&d1, &d2], Some(2)), d2);
    }

    #[test]
    fn test_intersection_edge_cases() {
        let d = ctx(json!({"a": 1}));
        assert!(intersection(&[], None).is_empty());
        assert_eq!(intersection(&[&d], None), d);
        assert_eq!(intersection(&[&d, &d], Some(0)), d);
    }
}
