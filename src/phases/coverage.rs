//! Coverage phase: deterministic boundary, negation, and omission cases,
//! one per applicable constraint keyword, per the keyword table.

use crate::case::{Case, GenerationMeta, Mode, Mutation, Phase};
use crate::generators::json_schema::{self, NegationTarget};
use crate::generators::{self, Strategy};
use crate::schema::model::{APIOperation, ParamLocation};
use indexmap::IndexMap;
use serde_json::Value;

/// Which unexpected HTTP methods to probe against each operation's path,
/// per `phases.coverage.unexpected-methods`.
#[derive(Debug, Clone, Default)]
pub struct CoverageConfig {
    pub unexpected_methods: Vec<String>,
    pub duplicate_query_params: bool,
}

/// Emit every deterministic Coverage case for `operation`.
#[must_use]
pub fn generate(operation: &APIOperation, strategy: &mut Strategy, config: &CoverageConfig) -> Vec<Case> {
    let mut cases = Vec::new();

    for param in &operation.parameters {
        for target in json_schema::negatable_keywords(&param.schema) {
            if let Some(case) = build_negative_case(operation, strategy, param.location, &param.name, &param.schema, &target) {
                cases.push(case);
            }
        }
    }

    for body in &operation.bodies {
        for target in json_schema::negatable_keywords(&body.schema) {
            if let Some(case) = build_negative_body_case(operation, strategy, &body.schema, &target, &body.media_type) {
                cases.push(case);
            }
        }
    }

    for method in &config.unexpected_methods {
        cases.push(unexpected_method_case(operation, strategy, method));
    }

    if config.duplicate_query_params {
        if let Some(case) = duplicate_query_case(operation, strategy) {
            cases.push(case);
        }
    }

    cases
}

fn build_negative_case(
    operation: &APIOperation,
    strategy: &mut Strategy,
    location: ParamLocation,
    name: &str,
    schema: &Value,
    target: &NegationTarget,
) -> Option<Case> {
    let mut positive = strategy.generate_positive_case(operation, Phase::Coverage);
    let mut rng = fastrand::Rng::with_seed(strategy.seed());
    let negated = json_schema::generate_negative(schema, target, &mut rng).ok()?;

    let bucket = match location {
        ParamLocation::Path => &mut positive.path_params,
        ParamLocation::Query => &mut positive.query,
        ParamLocation::Header => &mut positive.headers,
        ParamLocation::Cookie => &mut positive.cookies,
    };
    bucket.insert(name.to_string(), negated);

    let parts = generators::CaseParts {
        meta: GenerationMeta {
            phase: Phase::Coverage,
            mode: Mode::Negative,
            seed: Some(strategy.seed()),
            description: format!("coverage: negate {} on {location:?} '{name}'", target.keyword()),
            mutation: Some(Mutation {
                location: location.as_str().to_string(),
                name: name.to_string(),
                keyword: target.keyword(),
            }),
        },
        ..positive
    };
    Some(parts.into_case(operation.name.clone()))
}

fn build_negative_body_case(
    operation: &APIOperation,
    strategy: &mut Strategy,
    schema: &Value,
    target: &NegationTarget,
    media_type: &str,
) -> Option<Case> {
    let mut positive = strategy.generate_positive_case(operation, Phase::Coverage);
    let mut rng = fastrand::Rng::with_seed(strategy.seed());
    let negated_body = json_schema::generate_negative(schema, target, &mut rng).ok()?;

    let parts = generators::CaseParts {
        body: Some(negated_body),
        media_type: Some(media_type.to_string()),
        meta: GenerationMeta {
            phase: Phase::Coverage,
            mode: Mode::Negative,
            seed: Some(strategy.seed()),
            description: format!("coverage: negate {} on body", target.keyword()),
            mutation: Some(Mutation {
                location: "body".to_string(),
                name: "$".to_string(),
                keyword: target.keyword(),
            }),
        },
        ..positive
    };
    Some(parts.into_case(operation.name.clone()))
}

fn unexpected_method_case(operation: &APIOperation, strategy: &mut Strategy, method: &str) -> Case {
    let positive = strategy.generate_positive_case(operation, Phase::Coverage);
    let parts = generators::CaseParts {
        meta: GenerationMeta {
            phase: Phase::Coverage,
            mode: Mode::Negative,
            seed: Some(strategy.seed()),
            description: format!("coverage: unexpected method {method} on {}", operation.path),
            mutation: Some(Mutation {
                location: "method".to_string(),
                name: method.to_string(),
                keyword: "unexpected_method".to_string(),
            }),
        },
        ..positive
    };
    // The generated Case still carries `operation.method`'s normal route;
    // the engine's unsupported_method check substitutes `meta.mutation.name`
    // as the actual verb sent over the wire.
    parts.into_case(operation.name.clone())
}

fn duplicate_query_case(operation: &APIOperation, strategy: &mut Strategy) -> Option<Case> {
    let first_query_param = operation.parameters.iter().find(|p| p.location == ParamLocation::Query)?;
    let mut positive = strategy.generate_positive_case(operation, Phase::Coverage);
    let value = positive.query.get(&first_query_param.name).cloned()?;
    let duplicated = Value::Array(vec![value.clone(), value]);
    positive.query.insert(first_query_param.name.clone(), duplicated);

    let parts = generators::CaseParts {
        meta: GenerationMeta {
            phase: Phase::Coverage,
            mode: Mode::Negative,
            seed: Some(strategy.seed()),
            description: format!("coverage: duplicate query param '{}'", first_query_param.name),
            mutation: Some(Mutation {
                location: "query".to_string(),
                name: first_query_param.name.clone(),
                keyword: "duplicate".to_string(),
            }),
        },
        ..positive
    };
    Some(parts.into_case(operation.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{ParamStyle, Parameter};
    use serde_json::json;

    fn operation_with_bounded_param() -> APIOperation {
        APIOperation {
            name: "GET /items".into(),
            method: "GET".into(),
            path: "/items".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![Parameter {
                location: ParamLocation::Query,
                name: "limit".into(),
                required: true,
                schema: json!({"type": "integer", "minimum": 1, "maximum": 100}),
                style: ParamStyle::Form,
                explode: true,
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
    fn emits_one_case_per_negatable_keyword() {
        let operation = operation_with_bounded_param();
        let mut strategy = Strategy::with_seed(5);
        let cases = generate(&operation, &mut strategy, &CoverageConfig::default());
        // minimum and maximum are both negatable on this schema.
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.meta.mode == Mode::Negative));
    }

    #[test]
    fn unexpected_methods_produce_one_case_each() {
        let operation = operation_with_bounded_param();
        let mut strategy = Strategy::with_seed(5);
        let config = CoverageConfig {
            unexpected_methods: vec!["TRACE".to_string(), "CONNECT".to_string()],
            duplicate_query_params: false,
        };
        let cases = generate(&operation, &mut strategy, &config);
        let method_cases: Vec<_> = cases
            .iter()
            .filter(|c| c.meta.mutation.as_ref().is_some_and(|m| m.keyword == "unexpected_method"))
            .collect();
        assert_eq!(method_cases.len(), 2);
    }
}
