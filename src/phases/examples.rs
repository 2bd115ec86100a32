//! Examples phase: enumerate explicit examples declared in the schema,
//! filling any missing parts with one positive sample.

use crate::case::{Case, GenerationMeta, Mode, Phase};
use crate::generators::{self, Strategy};
use crate::schema::model::APIOperation;
use indexmap::IndexMap;
use serde_json::Value;

/// Extract the example values this operation declares for `location`:
/// parameter-level `example`, or the first entry of `examples`.
fn declared_examples(operation: &APIOperation, location: crate::schema::model::ParamLocation) -> IndexMap<String, Value> {
    operation
        .parameters
        .iter()
        .filter(|p| p.location == location)
        .filter_map(|p| {
            example_from_schema(&p.schema).map(|v| (p.name.clone(), v))
        })
        .collect()
}

fn example_from_schema(schema: &Value) -> Option<Value> {
    schema
        .get("example")
        .or_else(|| schema.get("examples").and_then(|e| e.as_array()).and_then(|a| a.first()))
        .or_else(|| schema.get("default"))
        .cloned()
}

/// Emit every `Case` this operation's declared examples produce. When
/// `fill_missing` is set, parts without a declared example are generated
/// positively; otherwise they're left at a single positive sample anyway,
/// since a `Case` is always fully populated before reaching the transport.
#[must_use]
pub fn generate(operation: &APIOperation, strategy: &mut Strategy, fill_missing: bool) -> Vec<Case> {
    use crate::schema::model::ParamLocation;

    let path_examples = declared_examples(operation, ParamLocation::Path);
    let query_examples = declared_examples(operation, ParamLocation::Query);
    let header_examples = declared_examples(operation, ParamLocation::Header);
    let cookie_examples = declared_examples(operation, ParamLocation::Cookie);

    let body_example = operation.bodies.first().and_then(|b| example_from_schema(&b.schema));

    let has_any_example = !path_examples.is_empty()
        || !query_examples.is_empty()
        || !header_examples.is_empty()
        || !cookie_examples.is_empty()
        || body_example.is_some();

    if !has_any_example {
        return Vec::new();
    }

    let positive = strategy.generate_positive_case(operation, Phase::Examples);

    let merge = |declared: IndexMap<String, Value>, generated: IndexMap<String, Value>| {
        if fill_missing {
            let mut merged = generated;
            merged.extend(declared);
            merged
        } else {
            declared
        }
    };

    let path_params = merge(path_examples, positive.path_params);
    let query = merge(query_examples, positive.query);
    let headers = merge(header_examples, positive.headers);
    let cookies = merge(cookie_examples, positive.cookies);
    let body = body_example.or(positive.body);

    let case = generators::CaseParts {
        path_params,
        query,
        headers,
        cookies,
        body,
        media_type: positive.media_type,
        meta: GenerationMeta {
            phase: Phase::Examples,
            mode: Mode::Positive,
            seed: Some(strategy.seed()),
            description: format!("declared example for {}", operation.name),
            mutation: None,
        },
    };

    vec![case.into_case(operation.name.clone())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{APIOperation, ParamLocation, ParamStyle, Parameter};
    use serde_json::json;

    fn operation_with_example() -> APIOperation {
        APIOperation {
            name: "GET /items/{id}".into(),
            method: "GET".into(),
            path: "/items/{id}".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![Parameter {
                location: ParamLocation::Path,
                name: "id".into(),
                required: true,
                schema: json!({"type": "integer", "example": 7}),
                style: ParamStyle::Simple,
                explode: false,
                content_type: None,
            }],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        }
    }

    #[test]
    fn emits_declared_example_value() {
        let operation = operation_with_example();
        let mut strategy = Strategy::with_seed(1);
        let cases = generate(&operation, &mut strategy, false);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].path_params["id"], json!(7));
    }

    #[test]
    fn no_examples_emits_no_cases() {
        let mut operation = operation_with_example();
        operation.parameters[0].schema = json!({"type": "integer"});
        let mut strategy = Strategy::with_seed(1);
        let cases = generate(&operation, &mut strategy, false);
        assert!(cases.is_empty());
    }
}
