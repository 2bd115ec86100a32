//! Stateful phase: walk [`Scenario`]s, binding each step's parameters by
//! evaluating Runtime Expressions against the previous step's response.

pub mod expr;
pub mod machine;

use crate::case::{Case, GenerationMeta, Mode, Phase};
use crate::generators::{self, Strategy};
use crate::schema::model::APISchema;
use expr::StepContext;
use machine::Scenario;
use serde_json::Value;

/// Bind one scenario step's `Case` by combining a fresh positive generation
/// with any parameter overrides supplied by the incoming link, each
/// resolved via [`expr::evaluate`] against `prior`. A link parameter whose
/// expression is unresolvable is skipped (per spec: "not a failure"),
/// leaving that parameter at its freshly-generated value.
#[must_use]
pub fn bind_step(
    schema: &APISchema,
    operation_idx: usize,
    link_parameters: &indexmap::IndexMap<String, String>,
    prior: Option<&StepContext>,
    strategy: &mut Strategy,
) -> Case {
    let operation = &schema.operations[operation_idx];
    let mut parts = strategy.generate_positive_case(operation, Phase::Stateful);

    if let Some(prior) = prior {
        for (name, expression) in link_parameters {
            let Ok(value) = expr::evaluate(expression, prior) else { continue };
            bind_named_parameter(operation, &mut parts, name, Value::String(value));
        }
    }

    parts.meta = GenerationMeta {
        phase: Phase::Stateful,
        mode: Mode::Positive,
        seed: parts.meta.seed,
        description: format!("stateful step: {}", operation.name),
        mutation: None,
    };

    parts.into_case(operation.name.clone())
}

fn bind_named_parameter(
    operation: &crate::schema::model::APIOperation,
    parts: &mut generators::CaseParts,
    name: &str,
    value: Value,
) {
    use crate::schema::model::ParamLocation;
    let Some(param) = operation.parameters.iter().find(|p| p.name == name) else { return };
    let bucket = match param.location {
        ParamLocation::Path => &mut parts.path_params,
        ParamLocation::Query => &mut parts.query,
        ParamLocation::Header => &mut parts.headers,
        ParamLocation::Cookie => &mut parts.cookies,
    };
    bucket.insert(name.to_string(), value);
}

/// Build every runnable scenario for `schema`, each capped at `max_steps`
/// hops. `build_scenarios` already bounds each individual walk against
/// revisiting a node, so a cycle in the link graph can't hang generation;
/// [`machine::check_reachable_cycle`] is exposed separately for the engine
/// to surface a one-time warning about a cyclic graph instead of silently
/// truncating it.
#[must_use]
pub fn plan_scenarios(schema: &APISchema, max_steps: usize) -> Vec<Scenario> {
    let edges = machine::build_edges(schema);
    machine::build_scenarios(schema, &edges, max_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{Link, StatusPattern};
    use crate::schema::resolver::Resolver;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    fn build_schema() -> APISchema {
        use crate::schema::model::{APIOperation, ParamLocation, ParamStyle, Parameter};

        let mut create = APIOperation {
            name: "POST /users".into(),
            method: "POST".into(),
            path: "/users".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        };
        let mut parameters = IndexMap::new();
        parameters.insert("id".to_string(), "$response.body#/id".to_string());
        create.links_out.push(Link {
            name: "getUser".into(),
            source_status: StatusPattern::Exact(201),
            target_operation: "GET /users/{id}".into(),
            parameters,
            request_body: None,
            inferred: false,
        });

        let get = APIOperation {
            name: "GET /users/{id}".into(),
            method: "GET".into(),
            path: "/users/{id}".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![Parameter {
                location: ParamLocation::Path,
                name: "id".into(),
                required: true,
                schema: json!({"type": "integer"}),
                style: ParamStyle::Simple,
                explode: false,
                content_type: None,
            }],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        };

        let resolver = Arc::new(Resolver::new(json!({})));
        APISchema::new(vec![create, get], resolver, json!({}))
    }

    #[test]
    fn binds_path_parameter_from_prior_response_body() {
        let schema = build_schema();
        let mut strategy = Strategy::with_seed(1);
        let prior = StepContext {
            request_body: None,
            request_path_params: IndexMap::new(),
            request_query: IndexMap::new(),
            response: crate::case::ResponseSnapshot {
                status: 201,
                headers: IndexMap::new(),
                body_truncated: String::new(),
                elapsed_ms: 5,
            },
            response_body: Some(json!({"id": 99})),
        };
        let mut parameters = IndexMap::new();
        parameters.insert("id".to_string(), "$response.body#/id".to_string());

        let case = bind_step(&schema, 1, &parameters, Some(&prior), &mut strategy);
        assert_eq!(case.path_params["id"], json!("99"));
    }

    #[test]
    fn plan_scenarios_produces_at_least_one_scenario() {
        let schema = build_schema();
        let scenarios = plan_scenarios(&schema, 6);
        assert_eq!(scenarios.len(), 1);
    }
}
