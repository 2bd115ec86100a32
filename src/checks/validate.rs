//! Minimal JSON Schema structural validator used by
//! `response_schema_conformance`.
//!
//! Only the keywords a response body realistically needs checking against
//! are covered — type, required, enum, numeric/string/array bounds, and
//! nested `properties`/`items`. Returns JSON-pointer-tagged violation
//! strings rather than failing fast, so one check surfaces every mismatch
//! at once.

use serde_json::Value;

#[must_use]
pub fn validate(value: &Value, schema: &Value) -> Vec<String> {
    let mut violations = Vec::new();
    validate_at(value, schema, "", &mut violations);
    violations
}

fn validate_at(value: &Value, schema: &Value, pointer: &str, violations: &mut Vec<String>) {
    let Some(obj) = schema.as_object() else { return };

    if let Some(expected) = obj.get("type").and_then(Value::as_str) {
        if !type_matches(value, expected) {
            violations.push(format!("{pointer}: expected type '{expected}', got '{}'", json_type_name(value)));
            return;
        }
    }

    if let Some(enum_values) = obj.get("enum").and_then(Value::as_array) {
        if !enum_values.contains(value) {
            violations.push(format!("{pointer}: value is not one of the declared enum members"));
        }
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = obj.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        violations.push(format!("{pointer}/{name}: required property is missing"));
                    }
                }
            }
            if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
                for (name, prop_schema) in properties {
                    if let Some(prop_value) = map.get(name) {
                        validate_at(prop_value, prop_schema, &format!("{pointer}/{name}"), violations);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(min_items) = obj.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min_items {
                    violations.push(format!("{pointer}: array has fewer than minItems={min_items} elements"));
                }
            }
            if let Some(max_items) = obj.get("maxItems").and_then(Value::as_u64) {
                if (items.len() as u64) > max_items {
                    violations.push(format!("{pointer}: array has more than maxItems={max_items} elements"));
                }
            }
            if let Some(item_schema) = obj.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item, item_schema, &format!("{pointer}/{i}"), violations);
                }
            }
        }
        Value::String(s) => {
            if let Some(min_len) = obj.get("minLength").and_then(Value::as_u64) {
                if (s.len() as u64) < min_len {
                    violations.push(format!("{pointer}: string shorter than minLength={min_len}"));
                }
            }
            if let Some(max_len) = obj.get("maxLength").and_then(Value::as_u64) {
                if (s.len() as u64) > max_len {
                    violations.push(format!("{pointer}: string longer than maxLength={max_len}"));
                }
            }
        }
        Value::Number(n) => {
            if let Some(min) = obj.get("minimum").and_then(Value::as_f64) {
                if n.as_f64().unwrap_or(0.0) < min {
                    violations.push(format!("{pointer}: value below minimum={min}"));
                }
            }
            if let Some(max) = obj.get("maximum").and_then(Value::as_f64) {
                if n.as_f64().unwrap_or(0.0) > max {
                    violations.push(format!("{pointer}: value above maximum={max}"));
                }
            }
        }
        _ => {}
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
