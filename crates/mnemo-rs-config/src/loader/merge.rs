//! JSON merge helpers for layered configuration.

use serde_json::{Map, Value};

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// replaces the base value.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => merge_json_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = overlay.clone();
}

/// Deep-merge `overlay` into `base`, skipping any leaf locked by `constraints`.
///
/// A constraint object only locks the keys it names; an unconstrained key
/// merges normally. A non-object constraint locks the whole subtree, arrays
/// included.
pub(super) fn merge_json_with_constraints(
    base: &mut Value,
    overlay: &Value,
    constraints: Option<&Value>,
) {
    let constraint_map: Option<&Map<String, Value>> = match constraints {
        None => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => return,
    };

    let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) else {
        if constraint_map.is_none() {
            merge_json_values(base, overlay);
        }
        return;
    };

    for (key, value) in overlay_map {
        match constraint_map.and_then(|map| map.get(key)) {
            None => match base_map.get_mut(key) {
                Some(existing) => merge_json_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            },
            Some(nested @ Value::Object(_)) => {
                let entry = base_map
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                merge_json_with_constraints(entry, value, Some(nested));
            }
            Some(_) => {}
        }
    }
}
