//! Runtime Expression evaluation for stateful links.
//!
//! Link parameters are templates like `"$response.body#/id"` or
//! `"$response.header.Location#regex:([^/]+)$"`. This module evaluates one
//! such expression against a captured step's request/response, producing
//! the plain string to feed into the next step's parameter or body.

use crate::case::ResponseSnapshot;
use crate::error::Error;
use serde_json::Value;

/// One step's recorded request/response, kept around only long enough for
/// later steps in the same scenario to evaluate expressions against it.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub request_body: Option<Value>,
    pub request_path_params: indexmap::IndexMap<String, Value>,
    pub request_query: indexmap::IndexMap<String, Value>,
    pub response: ResponseSnapshot,
    pub response_body: Option<Value>,
}

/// Evaluate one Runtime Expression against `context`.
///
/// # Errors
/// Returns [`Error::expression_unresolvable`] when the expression
/// references a part of the step that wasn't captured, or its JSON
/// Pointer / regex doesn't match anything.
pub fn evaluate(expression: &str, context: &StepContext) -> Result<String, Error> {
    if let Some(rest) = expression.strip_prefix("$response.body#") {
        return evaluate_body_pointer(rest, context.response_body.as_ref(), expression);
    }
    if let Some(rest) = expression.strip_prefix("$response.header.") {
        return evaluate_header(rest, context, expression);
    }
    if let Some(rest) = expression.strip_prefix("$request.body#") {
        return evaluate_body_pointer(rest, context.request_body.as_ref(), expression);
    }
    if let Some(rest) = expression.strip_prefix("$request.path.") {
        return context
            .request_path_params
            .get(rest)
            .map(value_to_plain)
            .ok_or_else(|| Error::expression_unresolvable(expression));
    }
    if let Some(rest) = expression.strip_prefix("$request.query.") {
        return context
            .request_query
            .get(rest)
            .map(value_to_plain)
            .ok_or_else(|| Error::expression_unresolvable(expression));
    }
    if expression == "$statusCode" {
        return Ok(context.response.status.to_string());
    }

    // Not a runtime expression — treat as a literal value.
    Ok(expression.to_string())
}

fn evaluate_header(rest: &str, context: &StepContext, expression: &str) -> Result<String, Error> {
    let (header_name, regex_suffix) = match rest.split_once("#regex:") {
        Some((name, pattern)) => (name, Some(pattern.trim_end_matches('$'))),
        None => (rest, None),
    };

    let raw = context
        .response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(header_name))
        .map(|(_, v)| v.clone())
        .ok_or_else(|| Error::expression_unresolvable(expression))?;

    match regex_suffix {
        Some(pattern) => {
            let re = regex::Regex::new(pattern)
                .map_err(|_| Error::expression_unresolvable(expression))?;
            re.captures(&raw)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| Error::expression_unresolvable(expression))
        }
        None => Ok(raw),
    }
}

fn evaluate_body_pointer(pointer: &str, body: Option<&Value>, expression: &str) -> Result<String, Error> {
    let body = body.ok_or_else(|| Error::expression_unresolvable(expression))?;
    let pointer = if pointer.is_empty() { "" } else { pointer };
    let value = body
        .pointer(pointer)
        .ok_or_else(|| Error::expression_unresolvable(expression))?;
    Ok(value_to_plain(value))
}

fn value_to_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with_body(body: Value) -> StepContext {
        let mut headers = indexmap::IndexMap::new();
        headers.insert("Location".to_string(), "/users/42".to_string());
        StepContext {
            request_body: None,
            request_path_params: indexmap::IndexMap::new(),
            request_query: indexmap::IndexMap::new(),
            response: ResponseSnapshot {
                status: 201,
                headers,
                body_truncated: String::new(),
                elapsed_ms: 1,
            },
            response_body: Some(body),
        }
    }

    #[test]
    fn body_pointer_extracts_nested_field() {
        let context = context_with_body(json!({"id": 42}));
        let value = evaluate("$response.body#/id", &context).unwrap();
        assert_eq!(value, "42");
    }

    #[test]
    fn header_regex_extracts_capture_group() {
        let context = context_with_body(json!({}));
        let value = evaluate("$response.header.Location#regex:([^/]+)$", &context).unwrap();
        assert_eq!(value, "42");
    }

    #[test]
    fn status_code_expression_resolves() {
        let context = context_with_body(json!({}));
        assert_eq!(evaluate("$statusCode", &context).unwrap(), "201");
    }

    #[test]
    fn missing_pointer_target_is_unresolvable() {
        let context = context_with_body(json!({"id": 42}));
        assert!(evaluate("$response.body#/missing", &context).is_err());
    }

    #[test]
    fn plain_literal_passes_through_unchanged() {
        let context = context_with_body(json!({}));
        assert_eq!(evaluate("literal-value", &context).unwrap(), "literal-value");
    }
}
