use serde_json::{Number, Value};

/// Convert a JSON value into the text used as a label value.
///
/// Strings are kept verbatim, numbers use their shortest round-trip decimal form and
/// arrays are flattened into a comma separated list of their stringified elements.
/// Anything else falls back to its compact JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_string(n),
        Value::Array(items) => join_array(items),
        other => other.to_string(),
    }
}

/// Join array elements with `,`, recursing into nested arrays.
pub fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(value_to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decimal text without exponent notation or trailing zeros (`1.0` -> `1`, `1e21` -> `1000000000000000000000`).
pub fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => format!("{}", f),
        None => n.to_string(),
    }
}
