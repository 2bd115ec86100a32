//! Parses a raw OpenAPI 2.0/3.0/3.1 document into the typed [`APISchema`].
//!
//! Normalizes the dialect differences (Swagger 2.0's `parameters: [{in:
//! body}]` vs. 3.x's `requestBody`, draft-4-style boolean `exclusiveMinimum`
//! vs. 3.1's numeric form) into one internal shape, and never lets a single
//! malformed operation abort the whole load: a broken operation becomes a
//! synthetic placeholder that fails with `InvalidSchema` on any access,
//! while the rest of the document loads normally.

pub mod links;
pub mod model;
pub mod resolver;

use crate::constants::ALL_HTTP_METHODS;
use crate::error::Error;
use indexmap::IndexMap;
use model::{
    APIOperation, APISchema, Body, EncodingEntry, Link, ParamLocation, ParamStyle, Parameter,
    ResponseDef, StatusPattern,
};
use resolver::Resolver;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct LinkInferenceConfig {
    pub location_headers: bool,
    pub dependency_analysis: bool,
}

impl Default for LinkInferenceConfig {
    fn default() -> Self {
        Self {
            location_headers: false,
            dependency_analysis: false,
        }
    }
}

/// Parse `bytes` (YAML or JSON) into an [`APISchema`].
///
/// `generate_security_parameters`, when `true`, augments each operation's
/// parameter set with synthetic parameters derived from its security
/// requirements (so the generator can mutate/omit credentials like any
/// other parameter).
///
/// # Errors
/// Returns `Err` only for fatal, pre-run failures: the bytes are neither
/// valid JSON nor YAML, or the document has no usable `paths`/operation
/// object at all. Per-operation problems are captured as synthetic invalid
/// operations instead.
pub fn load_openapi(
    bytes: &[u8],
    links_config: LinkInferenceConfig,
    generate_security_parameters: bool,
) -> Result<APISchema, Error> {
    let raw = parse_bytes(bytes)?;
    let mut raw = raw;
    normalize_numeric_bounds(&mut raw);

    let is_swagger2 = raw.get("swagger").and_then(Value::as_str) == Some("2.0");
    let base_url = extract_base_url(&raw, is_swagger2);

    let paths = raw
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::schema("document has no 'paths' object"))?
        .clone();

    let global_security = raw
        .get("security")
        .cloned()
        .unwrap_or(Value::Array(vec![]));

    let mut operations = Vec::new();
    for (path_template, path_item) in &paths {
        if path_template.starts_with('$') {
            continue; // e.g. "$ref" on a Path Item Object — unsupported cross-file path items
        }
        let Some(path_item_obj) = path_item.as_object() else {
            continue;
        };
        let shared_params = path_item_obj
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for method in ALL_HTTP_METHODS {
            let key = method.to_lowercase();
            let Some(op_value) = path_item_obj.get(&key) else {
                continue;
            };
            let name = format!("{method} {path_template}");
            match build_operation(
                &name,
                method,
                path_template,
                op_value,
                &shared_params,
                &global_security,
                is_swagger2,
                generate_security_parameters,
            ) {
                Ok(op) => operations.push(op),
                Err(e) => operations.push(invalid_operation(&name, method, path_template, &e)),
            }
        }
    }

    if links_config.location_headers || links_config.dependency_analysis {
        apply_link_inference(&mut operations, links_config);
    }

    let security_schemes = raw
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| raw.get("securityDefinitions"))
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let resolver = Arc::new(Resolver::new(raw.clone()));
    let mut schema = APISchema::new(operations, resolver, raw);
    schema.base_url = base_url;
    schema.security_schemes = security_schemes;
    Ok(schema)
}

fn parse_bytes(bytes: &[u8]) -> Result<Value, Error> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::schema(format!("document is not valid UTF-8: {e}")))?;
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    Ok(serde_yaml::from_str::<Value>(text)?)
}

/// Normalize JSON Schema draft-4-style boolean `exclusiveMinimum`/`exclusiveMaximum`
/// (paired with a separate `minimum`/`maximum`) and 3.1's numeric form into one
/// shape: a numeric `minimum`/`maximum` plus a boolean `exclusiveMinimum`/`exclusiveMaximum`.
fn normalize_numeric_bounds(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for bound in ["Minimum", "Maximum"] {
                let excl_key = format!("exclusive{bound}");
                let plain_key = bound.to_lowercase();
                if let Some(Value::Number(n)) = map.get(&excl_key).cloned() {
                    map.insert(plain_key, Value::Number(n));
                    map.insert(excl_key, Value::Bool(true));
                }
            }
            for v in map.values_mut() {
                normalize_numeric_bounds(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_numeric_bounds(item);
            }
        }
        _ => {}
    }
}

fn extract_base_url(raw: &Value, is_swagger2: bool) -> Option<String> {
    if is_swagger2 {
        let host = raw.get("host").and_then(Value::as_str)?;
        let scheme = raw
            .get("schemes")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .unwrap_or("https");
        let base_path = raw.get("basePath").and_then(Value::as_str).unwrap_or("");
        return Some(format!("{scheme}://{host}{base_path}"));
    }
    raw.get("servers")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn invalid_operation(name: &str, method: &str, path: &str, error: &Error) -> APIOperation {
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
        invalid: Some(error.to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_operation(
    name: &str,
    method: &str,
    path: &str,
    op_value: &Value,
    shared_params: &[Value],
    global_security: &Value,
    is_swagger2: bool,
    generate_security_parameters: bool,
) -> Result<APIOperation, Error> {
    let op_obj = op_value
        .as_object()
        .ok_or_else(|| Error::schema_with_operation(name, "operation value is not an object"))?;

    let operation_id = op_obj.get("operationId").and_then(Value::as_str).map(ToString::to_string);
    let tags = op_obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|t| t.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
        .unwrap_or_default();
    let deprecated = op_obj.get("deprecated").and_then(Value::as_bool).unwrap_or(false);

    let mut own_params: Vec<Value> = op_obj
        .get("parameters")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut all_param_values: Vec<Value> = shared_params.to_vec();
    all_param_values.append(&mut own_params);

    let mut parameters = Vec::new();
    let mut bodies = Vec::new();
    let consumes = op_obj
        .get("consumes")
        .and_then(Value::as_array)
        .map(|v| v.iter().filter_map(Value::as_str).map(ToString::to_string).collect::<Vec<_>>())
        .unwrap_or_else(|| vec!["application/json".to_string()]);

    let mut form_data_properties = serde_json::Map::new();
    let mut form_data_required = Vec::new();

    for param_value in &all_param_values {
        let Some(param_obj) = param_value.as_object() else {
            continue;
        };
        if param_obj.contains_key("$ref") {
            continue; // left for the resolver to inline lazily; skipped at extraction time
        }
        let Some(location_str) = param_obj.get("in").and_then(Value::as_str) else {
            continue;
        };
        let name_attr = param_obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::schema_with_operation(name, "parameter missing 'name'"))?;

        if is_swagger2 && location_str == "body" {
            let schema = param_obj.get("schema").cloned().unwrap_or_else(|| serde_json::json!({}));
            for media_type in &consumes {
                bodies.push(Body {
                    media_type: media_type.clone(),
                    schema: schema.clone(),
                    encoding: IndexMap::new(),
                });
            }
            continue;
        }
        if is_swagger2 && location_str == "formData" {
            let schema = param_obj.clone();
            let required = param_obj.get("required").and_then(Value::as_bool).unwrap_or(false);
            if required {
                form_data_required.push(Value::String(name_attr.to_string()));
            }
            form_data_properties.insert(name_attr.to_string(), Value::Object(schema));
            continue;
        }

        let location = match location_str {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            "cookie" => ParamLocation::Cookie,
            other => {
                return Err(Error::schema_with_operation(
                    name,
                    format!("unsupported parameter location '{other}'"),
                ))
            }
        };
        let required = param_obj.get("required").and_then(Value::as_bool).unwrap_or(location == ParamLocation::Path);
        let schema = param_obj
            .get("schema")
            .cloned()
            .unwrap_or_else(|| {
                // Swagger 2.0 inlines the type keywords directly on the parameter.
                Value::Object(param_obj.clone())
            });
        let style_str = param_obj.get("style").and_then(Value::as_str);
        let style = style_str.map_or(ParamStyle::default_for(location), |s| parse_style(s, location));
        let explode = param_obj
            .get("explode")
            .and_then(Value::as_bool)
            .unwrap_or(matches!(style, ParamStyle::Form));
        let content_type = param_obj
            .get("content")
            .and_then(Value::as_object)
            .and_then(|c| c.keys().next())
            .cloned();

        parameters.push(Parameter {
            location,
            name: name_attr.to_string(),
            required,
            schema,
            style,
            explode,
            content_type,
        });
    }

    if !form_data_properties.is_empty() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": Value::Object(form_data_properties),
            "required": Value::Array(form_data_required),
        });
        bodies.push(Body {
            media_type: "application/x-www-form-urlencoded".to_string(),
            schema,
            encoding: IndexMap::new(),
        });
    }

    if let Some(request_body) = op_obj.get("requestBody").and_then(Value::as_object) {
        if let Some(content) = request_body.get("content").and_then(Value::as_object) {
            for (media_type, media_obj) in content {
                let schema = media_obj.get("schema").cloned().unwrap_or_else(|| serde_json::json!({}));
                let encoding = media_obj
                    .get("encoding")
                    .and_then(Value::as_object)
                    .map(|enc| {
                        enc.iter()
                            .map(|(field, def)| {
                                let content_type =
                                    def.get("contentType").and_then(Value::as_str).map(ToString::to_string);
                                let style = def
                                    .get("style")
                                    .and_then(Value::as_str)
                                    .map(|s| parse_style(s, ParamLocation::Query));
                                (field.clone(), EncodingEntry { content_type, style })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                bodies.push(Body { media_type: media_type.clone(), schema, encoding });
            }
        }
    }

    let responses_value = op_obj
        .get("responses")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::schema_with_operation(name, "operation missing 'responses'"))?;
    let produces = op_obj
        .get("produces")
        .and_then(Value::as_array)
        .map(|v| v.iter().filter_map(Value::as_str).map(ToString::to_string).collect::<Vec<_>>())
        .unwrap_or_else(|| vec!["application/json".to_string()]);

    let mut responses = IndexMap::new();
    for (status_key, response_value) in responses_value {
        let Some(response_obj) = response_value.as_object() else {
            continue;
        };
        let status = StatusPattern::parse(status_key);
        let mut content = IndexMap::new();
        if let Some(content_obj) = response_obj.get("content").and_then(Value::as_object) {
            for (media_type, media_obj) in content_obj {
                if let Some(schema) = media_obj.get("schema") {
                    content.insert(media_type.clone(), schema.clone());
                }
            }
        } else if let Some(schema) = response_obj.get("schema") {
            for media_type in &produces {
                content.insert(media_type.clone(), schema.clone());
            }
        }
        let headers = response_obj
            .get("headers")
            .and_then(Value::as_object)
            .map(|h| {
                h.iter()
                    .map(|(k, v)| (k.clone(), v.get("schema").cloned().unwrap_or_else(|| v.clone())))
                    .collect()
            })
            .unwrap_or_default();
        let links = response_obj
            .get("links")
            .map(|l| links::parse_explicit_links(l, status))
            .unwrap_or_default();
        responses.insert(status_key.clone(), ResponseDef { status, content, headers, links });
    }

    let security_value = op_obj.get("security").unwrap_or(global_security);
    let security: Vec<IndexMap<String, Vec<String>>> = security_value
        .as_array()
        .map(|reqs| {
            reqs.iter()
                .filter_map(Value::as_object)
                .map(|req| {
                    req.iter()
                        .map(|(scheme, scopes)| {
                            let scopes = scopes
                                .as_array()
                                .map(|s| s.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
                                .unwrap_or_default();
                            (scheme.clone(), scopes)
                        })
                        .collect::<IndexMap<_, _>>()
                })
                .collect()
        })
        .unwrap_or_default();

    if generate_security_parameters {
        for req in &security {
            for scheme_name in req.keys() {
                let synthetic_name = format!("__security_{scheme_name}");
                if !parameters.iter().any(|p| p.name == synthetic_name) {
                    parameters.push(Parameter {
                        location: ParamLocation::Header,
                        name: synthetic_name,
                        required: false,
                        schema: serde_json::json!({"type": "string"}),
                        style: ParamStyle::Simple,
                        explode: false,
                        content_type: None,
                    });
                }
            }
        }
    }

    let links_out = responses.values().flat_map(|r| r.links.clone()).collect();

    Ok(APIOperation {
        name: name.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        operation_id,
        tags,
        deprecated,
        parameters,
        bodies,
        responses,
        security,
        links_out,
        invalid: None,
    })
}

fn parse_style(raw: &str, location: ParamLocation) -> ParamStyle {
    match raw {
        "simple" => ParamStyle::Simple,
        "label" => ParamStyle::Label,
        "matrix" => ParamStyle::Matrix,
        "pipeDelimited" => ParamStyle::PipeDelimited,
        "deepObject" => ParamStyle::DeepObject,
        "spaceDelimited" => ParamStyle::SpaceDelimited,
        "form" => ParamStyle::Form,
        _ => ParamStyle::default_for(location),
    }
}

fn apply_link_inference(operations: &mut [APIOperation], config: LinkInferenceConfig) {
    let snapshot: Vec<APIOperation> = operations.to_vec();
    let refs: Vec<&APIOperation> = snapshot.iter().collect();

    let mut inferred_by_name: IndexMap<String, Vec<Link>> = IndexMap::new();
    for source in &snapshot {
        if source.invalid.is_some() {
            continue;
        }
        let mut new_links = Vec::new();
        if config.location_headers {
            new_links.extend(links::infer_location_header_links(source, &refs));
        }
        if config.dependency_analysis {
            new_links.extend(links::infer_dependency_links(source, &refs));
        }
        if !new_links.is_empty() {
            inferred_by_name.insert(source.name.clone(), new_links);
        }
    }

    for op in operations.iter_mut() {
        if let Some(new_links) = inferred_by_name.shift_remove(&op.name) {
            op.links_out.extend(new_links);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE_3X: &str = r#"
    {
      "openapi": "3.0.3",
      "info": {"title": "t", "version": "1"},
      "servers": [{"url": "https://api.example.com"}],
      "paths": {
        "/users": {
          "post": {
            "operationId": "createUser",
            "requestBody": {"content": {"application/json": {"schema": {"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}}}},
            "responses": {"201": {"description": "created", "headers": {"Location": {"schema": {"type": "string"}}}}}
          }
        },
        "/users/{id}": {
          "get": {
            "operationId": "getUser",
            "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
            "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"type": "object"}}}}}
          }
        }
      }
    }
    "#;

    #[test]
    fn loads_operations_and_base_url() {
        let schema = load_openapi(PETSTORE_3X.as_bytes(), LinkInferenceConfig::default(), false).unwrap();
        assert_eq!(schema.operations.len(), 2);
        assert_eq!(schema.base_url.as_deref(), Some("https://api.example.com"));
        assert!(schema.operation("POST", "/users").is_some());
    }

    #[test]
    fn infers_location_header_link_when_enabled() {
        let config = LinkInferenceConfig { location_headers: true, dependency_analysis: false };
        let schema = load_openapi(PETSTORE_3X.as_bytes(), config, false).unwrap();
        let create = schema.operation("POST", "/users").unwrap();
        assert!(!create.links_out.is_empty());
    }

    #[test]
    fn malformed_operation_becomes_synthetic_invalid_without_aborting_load() {
        let doc = r#"{
            "openapi": "3.0.3",
            "paths": {
                "/broken": {"get": {"parameters": [{"in": "bogus-location", "name": "x"}], "responses": {}}},
                "/ok": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        }"#;
        let schema = load_openapi(doc.as_bytes(), LinkInferenceConfig::default(), false).unwrap();
        assert_eq!(schema.operations.len(), 2);
        let broken = schema.operation("GET", "/broken").unwrap();
        assert!(broken.invalid.is_some());
        let ok = schema.operation("GET", "/ok").unwrap();
        assert!(ok.invalid.is_none());
    }

    #[test]
    fn normalizes_31_numeric_exclusive_minimum() {
        let mut value = serde_json::json!({"exclusiveMinimum": 5});
        normalize_numeric_bounds(&mut value);
        assert_eq!(value["minimum"], serde_json::json!(5));
        assert_eq!(value["exclusiveMinimum"], serde_json::json!(true));
    }
}
