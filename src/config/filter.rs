//! Operation selection: path/method/tag/operation-id/name matchers plus the
//! small `JSON_POINTER OP VALUE` expression language behind `--include-by`
//! and `--exclude-by`.
//!
//! Filters of the same type combine disjunctively (any declared path
//! matches); filters across types combine conjunctively (path AND method
//! AND tag...).

use crate::error::Error;
use crate::schema::model::APIOperation;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    pub exact: Vec<String>,
    pub regex: Vec<Regex>,
}

impl Matcher {
    fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.regex.is_empty()
    }

    fn matches(&self, value: &str) -> bool {
        self.exact.iter().any(|e| e == value) || self.regex.iter().any(|r| r.is_match(value))
    }

    fn matches_any(&self, values: &[String]) -> bool {
        values.iter().any(|v| self.matches(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    In,
    NotIn,
}

/// One parsed `--include-by`/`--exclude-by` clause: `JSON_POINTER OP VALUE`.
#[derive(Debug, Clone)]
pub struct ByExpression {
    pointer: String,
    op: ComparisonOp,
    values: Vec<Value>,
}

impl ByExpression {
    /// Parses `"/tags/0 == internal"` or `"/method in GET,HEAD"`.
    ///
    /// # Errors
    /// Returns [`Error::invalid_filter_expression`] if the expression has
    /// fewer than three whitespace-separated tokens or an unknown operator.
    pub fn parse(expr: &str) -> Result<Self, Error> {
        let mut parts = expr.splitn(3, char::is_whitespace);
        let pointer = parts.next().unwrap_or_default().to_string();
        let op_token = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();

        let op = match op_token {
            "==" => ComparisonOp::Eq,
            "!=" => ComparisonOp::Ne,
            "in" => ComparisonOp::In,
            "not" if rest.trim_start().starts_with("in ") => ComparisonOp::NotIn,
            _ => return Err(Error::invalid_filter_expression(expr)),
        };

        let rest = if op == ComparisonOp::NotIn { rest.trim_start().trim_start_matches("in ") } else { rest };
        if pointer.is_empty() || rest.is_empty() {
            return Err(Error::invalid_filter_expression(expr));
        }

        let values = match op {
            ComparisonOp::In | ComparisonOp::NotIn => rest.split(',').map(|v| Value::String(v.trim().to_string())).collect(),
            ComparisonOp::Eq | ComparisonOp::Ne => vec![Value::String(rest.trim().to_string())],
        };

        Ok(Self { pointer, op, values })
    }

    /// Evaluates the expression against a JSON view of an operation,
    /// looking up `pointer` with [`Value::pointer`].
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        let Some(found) = document.pointer(&self.pointer) else { return false };
        let found_str = found.as_str().map_or_else(|| found.to_string(), ToString::to_string);
        match self.op {
            ComparisonOp::Eq => self.values.first().is_some_and(|v| value_eq_str(v, &found_str)),
            ComparisonOp::Ne => !self.values.first().is_some_and(|v| value_eq_str(v, &found_str)),
            ComparisonOp::In => self.values.iter().any(|v| value_eq_str(v, &found_str)),
            ComparisonOp::NotIn => !self.values.iter().any(|v| value_eq_str(v, &found_str)),
        }
    }
}

fn value_eq_str(value: &Value, s: &str) -> bool {
    value.as_str().is_some_and(|v| v == s)
}

/// Conjunction of every declared matcher/expression, applied in `select`.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub include_path: Matcher,
    pub exclude_path: Matcher,
    pub include_method: Matcher,
    pub exclude_method: Matcher,
    pub include_tag: Matcher,
    pub exclude_tag: Matcher,
    pub include_operation_id: Matcher,
    pub exclude_operation_id: Matcher,
    pub include_name: Matcher,
    pub exclude_name: Matcher,
    pub include_by: Vec<ByExpression>,
    pub exclude_by: Vec<ByExpression>,
    pub exclude_deprecated: bool,
}

impl FilterConfig {
    #[must_use]
    pub fn select(&self, operation: &APIOperation) -> bool {
        if self.exclude_deprecated && operation.deprecated {
            return false;
        }

        if !self.include_path.is_empty() && !self.include_path.matches(&operation.path) {
            return false;
        }
        if self.exclude_path.matches(&operation.path) {
            return false;
        }

        if !self.include_method.is_empty() && !self.include_method.matches(&operation.method) {
            return false;
        }
        if self.exclude_method.matches(&operation.method) {
            return false;
        }

        if !self.include_tag.is_empty() && !self.include_tag.matches_any(&operation.tags) {
            return false;
        }
        if self.exclude_tag.matches_any(&operation.tags) {
            return false;
        }

        let operation_id = operation.operation_id.clone().unwrap_or_default();
        if !self.include_operation_id.is_empty() && !self.include_operation_id.matches(&operation_id) {
            return false;
        }
        if self.exclude_operation_id.matches(&operation_id) {
            return false;
        }

        if !self.include_name.is_empty() && !self.include_name.matches(&operation.name) {
            return false;
        }
        if self.exclude_name.matches(&operation.name) {
            return false;
        }

        let document = operation_as_value(operation);
        if !self.include_by.is_empty() && !self.include_by.iter().any(|e| e.matches(&document)) {
            return false;
        }
        if self.exclude_by.iter().any(|e| e.matches(&document)) {
            return false;
        }

        true
    }
}

fn operation_as_value(operation: &APIOperation) -> Value {
    serde_json::json!({
        "method": operation.method,
        "path": operation.path,
        "tags": operation.tags,
        "operationId": operation.operation_id,
        "name": operation.name,
        "deprecated": operation.deprecated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn sample() -> APIOperation {
        APIOperation {
            name: "GET /internal/users".into(),
            method: "GET".into(),
            path: "/internal/users".into(),
            operation_id: Some("listUsers".into()),
            tags: vec!["internal".into()],
            deprecated: false,
            parameters: vec![],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        }
    }

    #[test]
    fn include_path_exact_match_passes() {
        let filter = FilterConfig { include_path: Matcher { exact: vec!["/internal/users".into()], regex: vec![] }, ..FilterConfig::default() };
        assert!(filter.select(&sample()));
    }

    #[test]
    fn exclude_tag_rejects_matching_operation() {
        let filter = FilterConfig { exclude_tag: Matcher { exact: vec!["internal".into()], regex: vec![] }, ..FilterConfig::default() };
        assert!(!filter.select(&sample()));
    }

    #[test]
    fn exclude_deprecated_rejects_deprecated_operation() {
        let mut op = sample();
        op.deprecated = true;
        let filter = FilterConfig { exclude_deprecated: true, ..FilterConfig::default() };
        assert!(!filter.select(&op));
    }

    #[test]
    fn by_expression_in_matches_any_listed_value() {
        let expr = ByExpression::parse("/method in GET,POST").unwrap();
        assert!(expr.matches(&operation_as_value(&sample())));
    }

    #[test]
    fn by_expression_not_in_excludes_listed_value() {
        let expr = ByExpression::parse("/method not in POST,PUT").unwrap();
        assert!(expr.matches(&operation_as_value(&sample())));
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(ByExpression::parse("/method").is_err());
    }
}
