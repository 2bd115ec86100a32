//! Positive and negative value generation from a JSON Schema fragment
//! (Draft 4/7 subset, as used by OpenAPI).
//!
//! The schema is assumed to already be `$ref`-inlined by
//! [`crate::schema::resolver::Resolver::inline`] — this module only ever
//! sees plain JSON values.

use crate::error::Error;
use serde_json::{Map, Value};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A single JSON Schema keyword that can be independently negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegationTarget {
    Type,
    Enum,
    Minimum,
    Maximum,
    MinLength,
    MaxLength,
    Pattern,
    Format(String),
    MinItems,
    MaxItems,
    UniqueItems,
    Required(String),
}

impl NegationTarget {
    #[must_use]
    pub fn keyword(&self) -> String {
        match self {
            Self::Type => "type".to_string(),
            Self::Enum => "enum".to_string(),
            Self::Minimum => "minimum".to_string(),
            Self::Maximum => "maximum".to_string(),
            Self::MinLength => "minLength".to_string(),
            Self::MaxLength => "maxLength".to_string(),
            Self::Pattern => "pattern".to_string(),
            Self::Format(f) => format!("format:{f}"),
            Self::MinItems => "minItems".to_string(),
            Self::MaxItems => "maxItems".to_string(),
            Self::UniqueItems => "uniqueItems".to_string(),
            Self::Required(name) => format!("required:{name}"),
        }
    }
}

/// Which keywords of `schema` can be independently negated while the rest
/// are honored best-effort. Used by the Coverage phase to enumerate one
/// negative case per keyword, and by the Fuzzing phase to pick one at random.
#[must_use]
pub fn negatable_keywords(schema: &Value) -> Vec<NegationTarget> {
    let Some(obj) = schema.as_object() else {
        return Vec::new();
    };
    let mut targets = Vec::new();

    if obj.contains_key("type") {
        targets.push(NegationTarget::Type);
    }
    if obj.contains_key("enum") {
        targets.push(NegationTarget::Enum);
    }
    if obj.contains_key("minimum") {
        targets.push(NegationTarget::Minimum);
    }
    if obj.contains_key("maximum") {
        targets.push(NegationTarget::Maximum);
    }
    if obj.contains_key("minLength") {
        targets.push(NegationTarget::MinLength);
    }
    if obj.contains_key("maxLength") {
        targets.push(NegationTarget::MaxLength);
    }
    if obj.contains_key("pattern") {
        targets.push(NegationTarget::Pattern);
    }
    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        if super::formats::is_registered(format) {
            targets.push(NegationTarget::Format(format.to_string()));
        }
    }
    if obj.contains_key("minItems") {
        targets.push(NegationTarget::MinItems);
    }
    if obj.contains_key("maxItems") {
        targets.push(NegationTarget::MaxItems);
    }
    if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
        targets.push(NegationTarget::UniqueItems);
    }
    if let Some(required) = obj.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            targets.push(NegationTarget::Required(name.to_string()));
        }
    }

    targets
}

/// Generate a value satisfying every declared constraint in `schema`.
#[must_use]
pub fn generate_positive(schema: &Value, rng: &mut fastrand::Rng) -> Value {
    generate_positive_depth(schema, rng, 0)
}

const MAX_RECURSION_DEPTH: usize = 12;

fn generate_positive_depth(schema: &Value, rng: &mut fastrand::Rng, depth: usize) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Null;
    };

    if let Some(enum_values) = obj.get("enum").and_then(Value::as_array) {
        if !enum_values.is_empty() {
            return enum_values[rng.usize(..enum_values.len())].clone();
        }
    }
    if let Some(const_value) = obj.get("const") {
        return const_value.clone();
    }
    if let Some(one_of) = obj.get("oneOf").and_then(Value::as_array).filter(|v| !v.is_empty()) {
        return generate_positive_depth(&one_of[rng.usize(..one_of.len())], rng, depth + 1);
    }
    if let Some(any_of) = obj.get("anyOf").and_then(Value::as_array).filter(|v| !v.is_empty()) {
        return generate_positive_depth(&any_of[rng.usize(..any_of.len())], rng, depth + 1);
    }
    if let Some(all_of) = obj.get("allOf").and_then(Value::as_array).filter(|v| !v.is_empty()) {
        let merged = merge_all_of(all_of);
        return generate_positive_depth(&merged, rng, depth + 1);
    }

    if obj.get("nullable").and_then(Value::as_bool) == Some(true) && rng.bool() {
        return Value::Null;
    }

    let schema_type = resolve_type(obj, rng);

    match schema_type.as_deref() {
        Some("string") => Value::String(generate_string(obj, rng)),
        Some("integer") => generate_integer(obj, rng),
        Some("number") => generate_number(obj, rng),
        Some("boolean") => Value::Bool(rng.bool()),
        Some("null") => Value::Null,
        Some("array") => generate_array(obj, rng, depth),
        Some("object") => generate_object(obj, rng, depth),
        _ => {
            if obj.contains_key("properties") || obj.contains_key("required") {
                generate_object(obj, rng, depth)
            } else if obj.contains_key("items") {
                generate_array(obj, rng, depth)
            } else {
                Value::Null
            }
        }
    }
}

fn resolve_type(obj: &Map<String, Value>, rng: &mut fastrand::Rng) -> Option<String> {
    match obj.get("type") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(types)) if !types.is_empty() => {
            types[rng.usize(..types.len())].as_str().map(ToString::to_string)
        }
        _ => None,
    }
}

fn merge_all_of(schemas: &[Value]) -> Value {
    let mut merged = Map::new();
    for schema in schemas {
        if let Some(obj) = schema.as_object() {
            for (k, v) in obj {
                merged.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
    }
    Value::Object(merged)
}

fn generate_string(obj: &Map<String, Value>, rng: &mut fastrand::Rng) -> String {
    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        if let Some(value) = super::formats::generate(format, rng) {
            return value;
        }
    }

    let min_len = obj.get("minLength").and_then(Value::as_u64).unwrap_or(0) as usize;
    let max_len = obj.get("maxLength").and_then(Value::as_u64).map_or(min_len + 10, |m| m as usize).max(min_len);
    let len = if min_len >= max_len { min_len } else { rng.usize(min_len..=max_len) };

    if obj.contains_key("pattern") {
        // A best-effort quantifier-merge with minLength/maxLength is a
        // performance optimization only; here we just honor length bounds
        // and accept that a hand-rolled pattern sampler would be needed
        // for strict conformance to arbitrary regexes.
        return (0..len).map(|_| ALPHABET[rng.usize(..ALPHABET.len())] as char).collect();
    }

    (0..len).map(|_| ALPHABET[rng.usize(..ALPHABET.len())] as char).collect()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn generate_integer(obj: &Map<String, Value>, rng: &mut fastrand::Rng) -> Value {
    let mut min = obj.get("minimum").and_then(Value::as_i64).unwrap_or(-1_000_000);
    let mut max = obj.get("maximum").and_then(Value::as_i64).unwrap_or(1_000_000);
    if obj.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true) {
        min += 1;
    }
    if obj.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true) {
        max -= 1;
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let mut value = rng.i64(min..=max);
    if let Some(multiple_of) = obj.get("multipleOf").and_then(Value::as_i64).filter(|m| *m > 0) {
        value -= value % multiple_of;
    }
    Value::from(value)
}

#[allow(clippy::cast_precision_loss)]
fn generate_number(obj: &Map<String, Value>, rng: &mut fastrand::Rng) -> Value {
    let mut min = obj.get("minimum").and_then(Value::as_f64).unwrap_or(-1e6);
    let mut max = obj.get("maximum").and_then(Value::as_f64).unwrap_or(1e6);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let span = (max - min).max(0.0);
    let value = min + rng.f64() * span;
    Value::from(value)
}

fn generate_array(obj: &Map<String, Value>, rng: &mut fastrand::Rng, depth: usize) -> Value {
    if depth >= MAX_RECURSION_DEPTH {
        return Value::Array(vec![]);
    }
    let min_items = obj.get("minItems").and_then(Value::as_u64).unwrap_or(0) as usize;
    let max_items = obj.get("maxItems").and_then(Value::as_u64).map_or(min_items + 3, |m| m as usize).max(min_items);
    let count = if min_items >= max_items { min_items } else { rng.usize(min_items..=max_items) };

    let item_schema = obj.get("items").cloned().unwrap_or_else(|| Value::Object(Map::new()));
    let prefix_items = obj.get("prefixItems").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let schema = prefix_items.get(i).cloned().unwrap_or_else(|| item_schema.clone());
        items.push(generate_positive_depth(&schema, rng, depth + 1));
    }

    if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
        dedup_preserve_order(&mut items);
    }

    Value::Array(items)
}

fn dedup_preserve_order(items: &mut Vec<Value>) {
    let mut seen = Vec::new();
    items.retain(|item| {
        let key = item.to_string();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

fn generate_object(obj: &Map<String, Value>, rng: &mut fastrand::Rng, depth: usize) -> Value {
    if depth >= MAX_RECURSION_DEPTH {
        return Value::Object(Map::new());
    }
    let mut result = Map::new();
    let properties = obj.get("properties").and_then(Value::as_object).cloned().unwrap_or_default();
    let required: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
        .unwrap_or_default();

    for (name, prop_schema) in &properties {
        let is_required = required.contains(name);
        if is_required || rng.bool() {
            result.insert(name.clone(), generate_positive_depth(prop_schema, rng, depth + 1));
        }
    }
    for name in &required {
        result.entry(name.clone()).or_insert(Value::Null);
    }

    let min_properties = obj.get("minProperties").and_then(Value::as_u64).unwrap_or(0) as usize;
    if result.len() < min_properties {
        if let Some(additional) = obj.get("additionalProperties") {
            let schema = if additional.is_object() { additional.clone() } else { Value::Object(Map::new()) };
            let mut i = 0;
            while result.len() < min_properties {
                let key = format!("extra{i}");
                result.insert(key, generate_positive_depth(&schema, rng, depth + 1));
                i += 1;
            }
        }
    }

    Value::Object(result)
}

/// Produce a value violating exactly `target` while honoring other
/// constraints best-effort.
///
/// # Errors
/// Returns [`Error::unsatisfiable_negative`] when negating `target` is
/// structurally impossible given the rest of the schema.
pub fn generate_negative(
    schema: &Value,
    target: &NegationTarget,
    rng: &mut fastrand::Rng,
) -> Result<Value, Error> {
    let obj = schema.as_object().cloned().unwrap_or_default();

    match target {
        NegationTarget::Type => {
            let declared = obj.get("type").and_then(Value::as_str).unwrap_or("object");
            let wrong_type = pick_mismatched_scalar(declared, rng);
            Ok(wrong_type)
        }
        NegationTarget::Enum => {
            let enum_values = obj.get("enum").and_then(Value::as_array).cloned().unwrap_or_default();
            let candidate = Value::String(format!("not-a-member-{}", rng.u32(..)));
            if enum_values.contains(&candidate) {
                return Err(Error::unsatisfiable_negative("schema", "enum"));
            }
            Ok(candidate)
        }
        NegationTarget::Minimum => {
            let min = obj.get("minimum").and_then(Value::as_i64).ok_or_else(|| {
                Error::unsatisfiable_negative("schema", "minimum")
            })?;
            Ok(Value::from(min - 1 - i64::from(rng.u8(0..10))))
        }
        NegationTarget::Maximum => {
            let max = obj.get("maximum").and_then(Value::as_i64).ok_or_else(|| {
                Error::unsatisfiable_negative("schema", "maximum")
            })?;
            Ok(Value::from(max + 1 + i64::from(rng.u8(0..10))))
        }
        NegationTarget::MinLength => {
            let min_len = obj.get("minLength").and_then(Value::as_u64).unwrap_or(0);
            if min_len == 0 {
                return Err(Error::unsatisfiable_negative("schema", "minLength"));
            }
            let len = (min_len as usize).saturating_sub(1);
            Ok(Value::String((0..len).map(|_| 'x').collect()))
        }
        NegationTarget::MaxLength => {
            let max_len = obj.get("maxLength").and_then(Value::as_u64).unwrap_or(0) as usize;
            Ok(Value::String((0..=max_len + 1).map(|_| 'x').collect()))
        }
        NegationTarget::Pattern => Ok(Value::String("\u{0}\u{0}\u{0}not-matching\u{0}".to_string())),
        NegationTarget::Format(format) => super::formats::generate_invalid(format, rng)
            .map(Value::String)
            .ok_or_else(|| Error::unsatisfiable_negative("schema", "format")),
        NegationTarget::MinItems => {
            let min_items = obj.get("minItems").and_then(Value::as_u64).unwrap_or(0);
            if min_items == 0 {
                return Err(Error::unsatisfiable_negative("schema", "minItems"));
            }
            Ok(Value::Array(vec![Value::Null; (min_items as usize).saturating_sub(1)]))
        }
        NegationTarget::MaxItems => {
            let max_items = obj.get("maxItems").and_then(Value::as_u64).unwrap_or(0) as usize;
            Ok(Value::Array(vec![Value::Null; max_items + 1]))
        }
        NegationTarget::UniqueItems => {
            let min_items = obj.get("minItems").and_then(Value::as_u64).unwrap_or(2).max(2);
            Ok(Value::Array(vec![Value::from(1); min_items as usize]))
        }
        NegationTarget::Required(name) => {
            let mut value = generate_positive_depth(schema, rng, 0);
            if let Value::Object(map) = &mut value {
                map.remove(name);
            }
            Ok(value)
        }
    }
}

fn pick_mismatched_scalar(declared: &str, rng: &mut fastrand::Rng) -> Value {
    let candidates: Vec<Value> = match declared {
        "string" => vec![Value::from(1), Value::Bool(true), Value::Array(vec![])],
        "integer" | "number" => vec![Value::String("not-a-number".into()), Value::Bool(false)],
        "boolean" => vec![Value::String("true".into()), Value::from(1)],
        "array" => vec![Value::String("[]".into()), Value::from(1)],
        "object" => vec![Value::String("{}".into()), Value::Array(vec![])],
        _ => vec![Value::Null],
    };
    candidates[rng.usize(..candidates.len())].clone()
}

/// Canonicalize a generated value into a sortable "size" for shrinking:
/// shorter strings, smaller arrays, smaller numbers are preferred minima.
#[must_use]
pub fn shrink_complexity(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(n) => n.as_f64().unwrap_or(0.0).abs() as u64,
        Value::String(s) => s.len() as u64,
        Value::Array(items) => items.iter().map(shrink_complexity).sum::<u64>() + items.len() as u64,
        Value::Object(map) => map.values().map(shrink_complexity).sum::<u64>() + map.len() as u64,
    }
}

/// Produce a list of strictly-simpler candidates derived from `value`,
/// ordered from most-aggressive to least-aggressive simplification.
#[must_use]
pub fn shrink_candidates(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) if !s.is_empty() => {
            vec![Value::String(String::new()), Value::String(s[..s.len() / 2].to_string())]
        }
        Value::Array(items) if !items.is_empty() => {
            let half = items[..items.len() / 2].to_vec();
            vec![Value::Array(vec![]), Value::Array(half)]
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                vec![Value::from(0), Value::from(i / 2)]
            } else {
                vec![Value::from(0.0)]
            }
        }
        Value::Object(map) if !map.is_empty() => {
            let mut reduced = map.clone();
            if let Some(key) = reduced.keys().next().cloned() {
                reduced.remove(&key);
            }
            vec![Value::Object(Map::new()), Value::Object(reduced)]
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generates_string_within_length_bounds() {
        let schema = json!({"type": "string", "minLength": 3, "maxLength": 5});
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..20 {
            let value = generate_positive(&schema, &mut rng);
            let s = value.as_str().unwrap();
            assert!(s.len() >= 3 && s.len() <= 5);
        }
    }

    #[test]
    fn generates_integer_within_bounds() {
        let schema = json!({"type": "integer", "minimum": 10, "maximum": 12});
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..20 {
            let value = generate_positive(&schema, &mut rng);
            let n = value.as_i64().unwrap();
            assert!((10..=12).contains(&n));
        }
    }

    #[test]
    fn negating_minimum_produces_value_below_bound() {
        let schema = json!({"type": "integer", "minimum": 5});
        let mut rng = fastrand::Rng::with_seed(1);
        let value = generate_negative(&schema, &NegationTarget::Minimum, &mut rng).unwrap();
        assert!(value.as_i64().unwrap() < 5);
    }

    #[test]
    fn negating_absent_keyword_is_unsatisfiable() {
        let schema = json!({"type": "string"});
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(generate_negative(&schema, &NegationTarget::Minimum, &mut rng).is_err());
    }

    #[test]
    fn required_property_omission_generates_object_without_it() {
        let schema = json!({
            "type": "object",
            "required": ["x"],
            "properties": {"x": {"type": "string"}, "y": {"type": "string"}}
        });
        let mut rng = fastrand::Rng::with_seed(1);
        let value = generate_negative(&schema, &NegationTarget::Required("x".into()), &mut rng).unwrap();
        assert!(value.get("x").is_none());
    }

    #[test]
    fn cyclic_schema_terminates_via_recursion_cap() {
        // A schema that keeps nesting itself as its own `items` — simulates an
        // inlined self-reference the resolver couldn't fully flatten.
        let mut schema = json!({"type": "array", "items": {}});
        let mut cursor = schema.clone();
        for _ in 0..(MAX_RECURSION_DEPTH + 5) {
            cursor = json!({"type": "array", "items": cursor});
        }
        schema = cursor;
        let mut rng = fastrand::Rng::with_seed(9);
        let _ = generate_positive(&schema, &mut rng); // must return, not overflow the stack
    }
}
