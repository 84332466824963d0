//! Record representation and merge helpers.

use serde_json::{Map, Value};

/// A record exchanged with a resource: a plain JSON object.
pub type Record = Map<String, Value>;

/// The shared per-call context passed to every policy and store call.
pub type Meta = Map<String, Value>;

/// Fill properties missing from `target` with the ones in `defaults`.
///
/// Properties already present in `target` win. When both sides hold an
/// object under the same key the merge recurses into it, so nested
/// properties fall back individually.
pub fn defaults_deep(target: &mut Record, defaults: &Record) {
    for (key, fallback) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), fallback.clone());
            }
            Some(Value::Object(nested)) => {
                if let Value::Object(nested_fallback) = fallback {
                    defaults_deep(nested, nested_fallback);
                }
            }
            Some(_) => {}
        }
    }
}

/// Keep only the top-level properties of `validated` that the caller
/// supplied in `input`.
///
/// This computes the update delta: properties that only exist in
/// `validated` because of a merge with the stored record, or because the
/// schema filled a default, are left out. Properties the schema stripped
/// from `input` are left out as well.
pub fn project_onto(input: &Record, validated: &Record) -> Record {
    input
        .keys()
        .filter_map(|key| {
            validated
                .get(key)
                .map(|value| (key.clone(), value.clone()))
        })
        .collect()
}
