//! Option Values
//!
//! Stored option documents are arbitrary JSON. These helpers read them without
//! ever failing: every accessor returns the value or a caller-supplied default.

use serde_json::Value;

/// A JSON object, insertion ordered.
pub type Map = serde_json::Map<String, Value>;

/// Borrow `value` as a mapping, if it is one.
pub fn as_map(value: &Value) -> Option<&Map> {
    value.as_object()
}

/// Read a string field from a mapping, or `default` when absent or not a string.
pub fn str_field<'a>(map: &'a Map, key: &str, default: &'a str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Loose boolean cast: empty strings, `"0"`, zero, null and empty
/// containers are false; everything else is true.
pub fn cast_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Form-style boolean: `"true"`/`"on"` are true, `"false"` is false, and
/// anything else goes through [`cast_bool`].
pub fn form_bool(value: &Value) -> bool {
    match value {
        Value::String(s) if s == "true" || s == "on" => true,
        Value::String(s) if s == "false" => false,
        other => cast_bool(other),
    }
}

/// Permissive boolean parsing: only `true`, `1`, `"1"`, `"true"`, `"on"` and
/// `"yes"` (case-insensitive) are true.
pub fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

/// Tri-state boolean: null stays null, everything else is parsed permissively.
pub fn parse_tristate(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Bool(parse_bool(other)),
    }
}

/// Accept a list or a comma separated string and produce trimmed, non-empty items.
pub fn split_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Deep merge `overlay` into `base`.
///
/// Maps merge key by key. When `concat_arrays` is set, two arrays under the
/// same key are concatenated; otherwise the overlay value replaces the base.
pub fn deep_merge(base: &mut Map, overlay: &Map, concat_arrays: bool) {
    for (key, incoming) in overlay {
        match (base.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming, concat_arrays);
            }
            (Some(Value::Array(existing)), Value::Array(incoming)) if concat_arrays => {
                existing.extend(incoming.iter().cloned());
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}
