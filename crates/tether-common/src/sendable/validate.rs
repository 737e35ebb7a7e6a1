use serde_json::Value;

use super::{KeyKind, Sendable};

/// Checks `value` against `descriptor`.
///
/// Purely structural and recursive with no depth limit; total,
/// side-effect-free and deterministic. Never panics: any value/descriptor
/// pairing not covered by the rules simply fails.
///
/// # Example
///
/// ```
/// use tether_common::sendable::{validate, Sendable};
/// use serde_json::json;
///
/// assert!(validate(&json!("x"), &Sendable::String));
/// assert!(!validate(&json!(1), &Sendable::String));
/// ```
pub fn validate(value: &Value, descriptor: &Sendable) -> bool {
    match descriptor {
        Sendable::None => value.is_null(),
        Sendable::String => value.is_string(),
        Sendable::Number => value.is_number(),
        Sendable::Boolean => value.is_boolean(),
        Sendable::FixedArray { elems } => match value.as_array() {
            // Mismatched length is rejected outright, no partial match.
            Some(items) if items.len() == elems.len() => items
                .iter()
                .zip(elems.iter())
                .all(|(item, elem)| validate(item, elem)),
            _ => false,
        },
        Sendable::VariableArray { elem } => match value.as_array() {
            Some(items) => items.iter().all(|item| validate(item, elem)),
            None => false,
        },
        Sendable::VariableObject { key, elem } => match value.as_object() {
            Some(map) => map
                .iter()
                .all(|(k, v)| key_matches(k, *key) && validate(v, elem)),
            None => false,
        },
        Sendable::Union { alternatives } => alternatives.iter().any(|alt| validate(value, alt)),
        Sendable::FixedObject { fields } => match value.as_object() {
            // Key sets must be exactly equal: extra keys on either side fail.
            Some(map) if map.len() == fields.len() => fields
                .iter()
                .all(|(name, field)| map.get(name).is_some_and(|v| validate(v, field))),
            _ => false,
        },
    }
}

/// Object keys travel as text; a number key is one whose text parses as a
/// number.
fn key_matches(key: &str, kind: KeyKind) -> bool {
    match kind {
        KeyKind::String => true,
        KeyKind::Number => key.parse::<f64>().is_ok(),
    }
}
