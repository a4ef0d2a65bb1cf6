//! Field value normalisation
//!
//! Appliances speak strings: booleans are `"1"`/`"0"` and multi-valued
//! fields are comma-separated lists. Declared values are normalised to that
//! encoding before comparison and before every write.

use serde_json::{Map, Value};

/// A field map as sent to or received from the appliance
pub type Fields = Map<String, Value>;

/// Render a scalar (or list of scalars) in the appliance's string encoding
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Normalise a value: objects recurse, everything else becomes a string
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_fields(map)),
        other => Value::String(scalar_string(other)),
    }
}

/// Normalise every value of a field map
pub fn normalize_fields(fields: &Fields) -> Fields {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), normalize(v)))
        .collect()
}

/// Whether a value carries no information (empty string, empty list, null, `{}`)
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        other => scalar_string(other).is_empty(),
    }
}

/// Split a comma-separated list, trimming and dropping empty elements
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
