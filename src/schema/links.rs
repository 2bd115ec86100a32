//! Explicit `links` extraction plus optional synthetic-link inference.
//!
//! Two inference algorithms, both gated by configuration (see
//! [`crate::config::LinkInferenceConfig`]):
//! - *Location-headers*: a `201` response with a `Location` header whose
//!   value could match another operation's path template.
//! - *Dependency-analysis*: a response body property that matches a target
//!   operation's path parameter name.

use super::model::{APIOperation, Link, ParamLocation, StatusPattern};
use indexmap::IndexMap;
use serde_json::Value;

/// Parse the explicit `links` object attached to one response definition.
#[must_use]
pub fn parse_explicit_links(links_value: &Value, source_status: StatusPattern) -> Vec<Link> {
    let Some(object) = links_value.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .map(|(name, def)| {
            let target_operation = def
                .get("operationId")
                .or_else(|| def.get("operationRef"))
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string();

            let parameters = def
                .get("parameters")
                .and_then(Value::as_object)
                .map(|params| {
                    params
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let request_body = def
                .get("requestBody")
                .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string));

            Link {
                name: name.clone(),
                source_status,
                target_operation,
                parameters,
                request_body,
                inferred: false,
            }
        })
        .collect()
}

/// Path template segment used to find a single-path-param "detail"
/// operation matching a "collection" operation's base path.
fn path_template_single_param(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let param_segments: Vec<&str> = segments
        .iter()
        .filter(|s| s.starts_with('{') && s.ends_with('}'))
        .copied()
        .collect();
    if param_segments.len() == 1 {
        Some(param_segments[0].trim_start_matches('{').trim_end_matches('}'))
    } else {
        None
    }
}

fn strips_to_base(candidate_path: &str, source_path: &str) -> bool {
    let base = source_path.trim_end_matches('/');
    let candidate_base = candidate_path
        .rsplit_once('/')
        .map_or(candidate_path, |(prefix, _)| prefix);
    candidate_base == base || candidate_base.is_empty() && base == "/"
}

/// Infer `Location`-header links: `source` returns a created-resource
/// status with a `Location` header, and `target`'s path is `source`'s path
/// plus exactly one trailing path parameter segment.
#[must_use]
pub fn infer_location_header_links(source: &APIOperation, candidates: &[&APIOperation]) -> Vec<Link> {
    let mut links = Vec::new();

    for response in source.responses.values() {
        let is_creation_status = matches!(response.status, StatusPattern::Exact(201))
            || matches!(response.status, StatusPattern::Wildcard(2));
        if !is_creation_status {
            continue;
        }
        let has_location_header = response
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("location"));
        if !has_location_header {
            continue;
        }

        for target in candidates {
            if std::ptr::eq(*target, source) {
                continue;
            }
            let Some(param_name) = path_template_single_param(&target.path) else {
                continue;
            };
            if !strips_to_base(&target.path, &source.path) {
                continue;
            }
            let mut parameters = IndexMap::new();
            parameters.insert(
                param_name.to_string(),
                "$response.header.Location#regex:([^/]+)$".to_string(),
            );
            links.push(Link {
                name: format!("{}->{}", source.name, target.name),
                source_status: response.status,
                target_operation: target.name.clone(),
                parameters,
                request_body: None,
                inferred: true,
            });
        }
    }

    links
}

/// Infer dependency-analysis links: `source`'s response body has a property
/// matching a path parameter name declared by `target`.
#[must_use]
pub fn infer_dependency_links(source: &APIOperation, candidates: &[&APIOperation]) -> Vec<Link> {
    let mut links = Vec::new();

    for response in source.responses.values() {
        if !matches!(
            response.status,
            StatusPattern::Wildcard(2) | StatusPattern::Exact(200) | StatusPattern::Exact(201)
        ) {
            continue;
        }
        let Some(schema) = response
            .content
            .values()
            .find(|_| true)
        else {
            continue;
        };
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            continue;
        };

        for target in candidates {
            if std::ptr::eq(*target, source) {
                continue;
            }
            for param in target.path_params() {
                if param.location != ParamLocation::Path {
                    continue;
                }
                if properties.contains_key(&param.name) {
                    let mut parameters = IndexMap::new();
                    parameters.insert(
                        param.name.clone(),
                        format!("$response.body#/{}", param.name),
                    );
                    links.push(Link {
                        name: format!("{}->{}@{}", source.name, target.name, param.name),
                        source_status: response.status,
                        target_operation: target.name.clone(),
                        parameters,
                        request_body: None,
                        inferred: true,
                    });
                }
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::ResponseDef;
    use serde_json::json;

    fn op(name: &str, method: &str, path: &str) -> APIOperation {
        APIOperation {
            name: name.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            operation_id: None,
            tags: vec![],
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
    fn location_header_link_infers_detail_path_param() {
        let mut create = op("POST /users", "POST", "/users");
        let mut resp = ResponseDef {
            status: StatusPattern::Exact(201),
            content: IndexMap::new(),
            headers: IndexMap::new(),
            links: vec![],
        };
        resp.headers.insert("Location".to_string(), json!({"type": "string"}));
        create.responses.insert("201".to_string(), resp);

        let get_by_id = op("GET /users/{id}", "GET", "/users/{id}");

        let links = infer_location_header_links(&create, &[&get_by_id]);
        assert_eq!(links.len(), 1);
        assert!(links[0].parameters.contains_key("id"));
    }

    #[test]
    fn dependency_link_infers_from_response_body_property() {
        let mut create = op("POST /users", "POST", "/users");
        let mut resp = ResponseDef {
            status: StatusPattern::Exact(201),
            content: IndexMap::new(),
            headers: IndexMap::new(),
            links: vec![],
        };
        resp.content.insert(
            "application/json".to_string(),
            json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
        );
        create.responses.insert("201".to_string(), resp);

        let mut get_by_id = op("GET /users/{id}", "GET", "/users/{id}");
        get_by_id.parameters.push(crate::schema::model::Parameter {
            location: ParamLocation::Path,
            name: "id".to_string(),
            required: true,
            schema: json!({"type": "integer"}),
            style: crate::schema::model::ParamStyle::Simple,
            explode: false,
            content_type: None,
        });

        let links = infer_dependency_links(&create, &[&get_by_id]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].parameters["id"], "$response.body#/id");
    }
}
