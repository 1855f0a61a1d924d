//! Field shaping for the entity layer: logical-to-storage key remapping and
//! stripping of fields that must not reach log payloads.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Rename an object's keys per the remap table (logical name -> storage
/// name). Keys without a mapping pass through unchanged.
/// e.g. with `{"id": "_id"}`: `{"id": 1, "status": "a"}` -> `{"_id": 1, "status": "a"}`
pub fn remap_object_keys(obj: &mut Map<String, Value>, remap: &HashMap<String, String>) {
    if remap.is_empty() {
        return;
    }
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        if let Some(storage) = remap.get(&k) {
            if storage != &k {
                if let Some(v) = obj.remove(&k) {
                    obj.insert(storage.clone(), v);
                }
            }
        }
    }
}

/// Apply key remapping to a Value. If it's an object, remaps its keys;
/// arrays remap each object element; otherwise no-op.
pub fn remap_value_keys(value: &mut Value, remap: &HashMap<String, String>) {
    match value {
        Value::Object(map) => remap_object_keys(map, remap),
        Value::Array(items) => {
            for item in items.iter_mut() {
                remap_value_keys(item, remap);
            }
        }
        _ => {}
    }
}

/// Remove the named top-level fields from an object. Used on write payloads
/// before they are attached to log events.
pub fn strip_fields(value: &mut Value, excluded: &[String]) {
    if let Value::Object(map) = value {
        for field in excluded {
            map.remove(field);
        }
    }
}
