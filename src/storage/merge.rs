//! Merge rules used by merge-mode imports.
//!
//! - arrays: concatenated, de-duplicated by element `id` (later wins)
//! - objects: shallow merge, incoming keys win
//! - anything else: incoming replaces existing

use std::collections::HashMap;

use serde_json::Value;

/// Merge `incoming` into `existing`
pub fn merge_values(existing: Option<Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Array(current)), Value::Array(added)) => Value::Array(merge_arrays(current, added)),
        (Some(Value::Object(mut current)), Value::Object(added)) => {
            current.extend(added);
            Value::Object(current)
        }
        (_, incoming) => incoming,
    }
}

/// Identifier of an array element, if it exposes one
fn element_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn merge_arrays(current: Vec<Value>, added: Vec<Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(current.len() + added.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in current.into_iter().chain(added) {
        match element_id(&item) {
            Some(id) => match positions.get(&id) {
                Some(&pos) => merged[pos] = item,
                None => {
                    positions.insert(id, merged.len());
                    merged.push(item);
                }
            },
            None => merged.push(item),
        }
    }

    merged
}
