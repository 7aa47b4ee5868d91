//! Patch merging
//!
//! Combines a patch body with the live manifest. `json-merge` follows
//! RFC 7396: objects merge recursively, `null` deletes a key, scalars and
//! arrays replace wholesale. `merge`/`strategic` add one refinement: arrays
//! of named objects merge element-wise by the `name` key, preserving
//! unmatched live elements.
//!
//! Merging is idempotent for every strategy and never mutates its inputs.
//! A structural mismatch between patch and live state (object vs scalar at
//! the same path) is a conflict, reported before any mutation is applied.

use crate::error::{PatchError, Result};
use caravel_types::{Manifest, MergeStrategy};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Key identifying elements of mergeable named-object lists.
const MERGE_KEY: &str = "name";

/// Merge a patch body into a live manifest.
pub fn merge(live: &Manifest, patch: &Manifest, strategy: MergeStrategy) -> Result<Manifest> {
    let mut path = Vec::new();
    let merged = merge_values(live.as_value(), patch.as_value(), strategy, &mut path)?;
    Ok(Manifest::new(merged))
}

fn merge_values(
    live: &Value,
    patch: &Value,
    strategy: MergeStrategy,
    path: &mut Vec<String>,
) -> Result<Value> {
    match (live, patch) {
        (Value::Object(live_map), Value::Object(patch_map)) => {
            let mut result = live_map.clone();
            for (key, patch_value) in patch_map {
                path.push(key.clone());
                if patch_value.is_null() {
                    result.remove(key);
                } else {
                    let merged = match live_map.get(key) {
                        Some(live_value) => {
                            merge_values(live_value, patch_value, strategy, path)?
                        }
                        None => strip_nulls(patch_value),
                    };
                    result.insert(key.clone(), merged);
                }
                path.pop();
            }
            Ok(Value::Object(result))
        }
        (Value::Array(live_items), Value::Array(patch_items)) => {
            if strategy.merges_lists_by_key()
                && is_keyed_list(live_items)
                && is_keyed_list(patch_items)
            {
                merge_keyed_lists(live_items, patch_items, strategy, path)
            } else {
                // Arrays replace wholesale, never element-merge.
                Ok(Value::Array(patch_items.clone()))
            }
        }
        (Value::Null, patch_value) => Ok(strip_nulls(patch_value)),
        (_, Value::Null) => Ok(Value::Null),
        (live_value, patch_value) if structurally_incompatible(live_value, patch_value) => {
            Err(PatchError::PatchConflict {
                path: path.join("."),
                reason: format!(
                    "cannot merge {} into {}",
                    type_name(patch_value),
                    type_name(live_value)
                ),
            })
        }
        (_, patch_value) => Ok(patch_value.clone()),
    }
}

fn structurally_incompatible(live: &Value, patch: &Value) -> bool {
    live.is_object() != patch.is_object() || live.is_array() != patch.is_array()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A list merges by key only when every element is an object naming itself.
fn is_keyed_list(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.get(MERGE_KEY).and_then(Value::as_str).is_some())
}

fn merge_keyed_lists(
    live_items: &[Value],
    patch_items: &[Value],
    strategy: MergeStrategy,
    path: &mut Vec<String>,
) -> Result<Value> {
    let mut result = Vec::with_capacity(live_items.len());
    let mut consumed: HashSet<&str> = HashSet::new();

    for live_item in live_items {
        let key = live_item
            .get(MERGE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        match patch_items
            .iter()
            .find(|p| p.get(MERGE_KEY).and_then(Value::as_str) == Some(key))
        {
            Some(patch_item) => {
                path.push(key.to_string());
                result.push(merge_values(live_item, patch_item, strategy, path)?);
                path.pop();
                consumed.insert(key);
            }
            None => result.push(live_item.clone()),
        }
    }

    for patch_item in patch_items {
        let key = patch_item
            .get(MERGE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !consumed.contains(key) {
            result.push(strip_nulls(patch_item));
        }
    }

    Ok(Value::Array(result))
}

/// Null members of added objects never materialize (RFC 7396).
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut result = Map::new();
            for (key, member) in map {
                if !member.is_null() {
                    result.insert(key.clone(), strip_nulls(member));
                }
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}
