//! Built-in response checks: pure functions from `(case, response)` to an
//! optional [`CheckFailure`].

pub mod validate;

use crate::case::{Case, CheckFailure, CheckKind, Mode, ResponseSnapshot};
use crate::schema::model::{media_type_matches, APIOperation};
use serde_json::Value;
use std::collections::HashMap;

/// Per-run overrides: which checks are enabled, and which statuses each
/// check should additionally treat as expected (`checks.<name>.expected-statuses`).
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    pub disabled: Vec<CheckKind>,
    pub expected_statuses: HashMap<CheckKind, Vec<u16>>,
    pub max_response_time_ms: Option<u64>,
}

impl CheckConfig {
    fn is_enabled(&self, kind: CheckKind) -> bool {
        !self.disabled.contains(&kind)
    }

    fn extra_expected(&self, kind: CheckKind) -> &[u16] {
        self.expected_statuses.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// `ignored_auth` issues two extra requests per operation rather than
    /// inspecting one case/response pair, so it lives outside `run_all`
    /// and needs its own enabled check.
    #[must_use]
    pub fn ignored_auth_enabled(&self) -> bool {
        self.is_enabled(CheckKind::AuthIgnored)
    }
}

/// Everything a check needs beyond the case/response pair: the matched
/// operation (for documented statuses/headers/schemas) and prior-step
/// context for the two Stateful checks.
pub struct CheckContext<'a> {
    pub operation: &'a APIOperation,
    pub config: &'a CheckConfig,
    /// `true` when this case targets a resource already DELETEd earlier in
    /// the same stateful scenario.
    pub resource_deleted: bool,
    /// `true` when this case is the linked retrieval following a
    /// successful create in the same stateful scenario.
    pub follows_successful_create: bool,
}

/// Run every enabled check against one `(case, response, body)` triple.
#[must_use]
pub fn run_all(context: &CheckContext, case: &Case, response: &ResponseSnapshot, body: Option<&Value>) -> Vec<CheckFailure> {
    let checks: [(CheckKind, fn(&CheckContext, &Case, &ResponseSnapshot, Option<&Value>) -> Option<CheckFailure>); 12] = [
        (CheckKind::ServerError, not_a_server_error),
        (CheckKind::UndocumentedStatus, status_code_conformance),
        (CheckKind::UndocumentedContentType, content_type_conformance),
        (CheckKind::MissingHeader, response_headers_conformance),
        (CheckKind::SchemaViolation, response_schema_conformance),
        (CheckKind::NegativeAccepted, negative_data_rejection),
        (CheckKind::PositiveRejected, positive_data_acceptance),
        (CheckKind::MissingHeaderNotRejected, missing_required_header),
        (CheckKind::MethodNotRejected, unsupported_method),
        (CheckKind::UseAfterFree, use_after_free),
        (CheckKind::ResourceMissing, ensure_resource_availability),
        (CheckKind::TooSlow, max_response_time),
    ];

    checks
        .iter()
        .filter(|(kind, _)| context.config.is_enabled(*kind))
        .filter_map(|(_, check)| check(context, case, response, body))
        .collect()
}

fn failure(kind: CheckKind, title: &str, message: String, context: Value, case: &Case, response: &ResponseSnapshot) -> CheckFailure {
    CheckFailure { kind, title: title.to_string(), message, context, case: case.clone(), response: Some(response.clone()) }
}

fn not_a_server_error(_ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, body: Option<&Value>) -> Option<CheckFailure> {
    let has_graphql_errors = body.and_then(|b| b.get("errors")).is_some_and(|e| e.is_array());
    if response.status >= 500 || has_graphql_errors {
        return Some(failure(
            CheckKind::ServerError,
            "Server error",
            format!("received {} for {}", response.status, case.operation),
            serde_json::json!({"status": response.status}),
            case,
            response,
        ));
    }
    None
}

fn status_code_conformance(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    if ctx.operation.documents_status(response.status) || ctx.config.extra_expected(CheckKind::UndocumentedStatus).contains(&response.status) {
        return None;
    }
    Some(failure(
        CheckKind::UndocumentedStatus,
        "Undocumented status code",
        format!("{} is not a documented response for {}", response.status, ctx.operation.name),
        serde_json::json!({"status": response.status}),
        case,
        response,
    ))
}

fn content_type_conformance(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    let Some(content_type) = response.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-type")).map(|(_, v)| v.clone()) else {
        return None;
    };
    let base_type = content_type.split(';').next().unwrap_or(&content_type).trim();
    let documented = ctx.operation.responses_for(response.status);
    if documented.is_empty() {
        return None;
    }
    let matches_any = documented.iter().any(|r| r.content.keys().any(|mt| media_type_matches(mt, base_type)));
    if matches_any {
        return None;
    }
    Some(failure(
        CheckKind::UndocumentedContentType,
        "Undocumented content type",
        format!("'{base_type}' is not a documented content type for {} {}", response.status, ctx.operation.name),
        serde_json::json!({"content_type": base_type}),
        case,
        response,
    ))
}

fn response_headers_conformance(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    for doc in ctx.operation.responses_for(response.status) {
        for name in doc.headers.keys() {
            if !response.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
                return Some(failure(
                    CheckKind::MissingHeader,
                    "Missing documented header",
                    format!("response is missing documented header '{name}'"),
                    serde_json::json!({"header": name}),
                    case,
                    response,
                ));
            }
        }
    }
    None
}

fn response_schema_conformance(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, body: Option<&Value>) -> Option<CheckFailure> {
    let Some(body) = body else { return None };
    for doc in ctx.operation.responses_for(response.status) {
        for schema in doc.content.values() {
            let violations = validate::validate(body, schema);
            if !violations.is_empty() {
                return Some(failure(
                    CheckKind::SchemaViolation,
                    "Response schema violation",
                    format!("response body does not conform to its documented schema ({} violation(s))", violations.len()),
                    serde_json::json!({"violations": violations}),
                    case,
                    response,
                ));
            }
        }
    }
    None
}

fn negative_data_rejection(_ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    if case.meta.mode == Mode::Negative && (200..300).contains(&response.status) {
        return Some(failure(
            CheckKind::NegativeAccepted,
            "Negative input accepted",
            format!("server returned {} for a deliberately invalid {}", response.status, case.operation),
            serde_json::json!({"mutation": case.meta.mutation}),
            case,
            response,
        ));
    }
    None
}

fn positive_data_acceptance(_ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    if case.meta.mode == Mode::Positive && (400..500).contains(&response.status) {
        return Some(failure(
            CheckKind::PositiveRejected,
            "Valid input rejected",
            format!("server returned {} for a schema-valid {}", response.status, case.operation),
            serde_json::json!({}),
            case,
            response,
        ));
    }
    None
}

fn missing_required_header(_ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    let Some(mutation) = &case.meta.mutation else { return None };
    if mutation.keyword != "required" || mutation.location != "header" {
        return None;
    }
    if response.status == 406 || response.status == 401 {
        return None;
    }
    Some(failure(
        CheckKind::MissingHeaderNotRejected,
        "Missing header not rejected",
        format!("omitting required header '{}' was not rejected with 406/401", mutation.name),
        serde_json::json!({"header": mutation.name}),
        case,
        response,
    ))
}

fn unsupported_method(_ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    let Some(mutation) = &case.meta.mutation else { return None };
    if mutation.keyword != "unexpected_method" {
        return None;
    }
    if response.status == 405 && response.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("allow")) {
        return None;
    }
    Some(failure(
        CheckKind::MethodNotRejected,
        "Unsupported method not rejected",
        format!("method '{}' was not rejected with 405+Allow", mutation.name),
        serde_json::json!({"method": mutation.name, "status": response.status}),
        case,
        response,
    ))
}

fn use_after_free(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    if !ctx.resource_deleted {
        return None;
    }
    if matches!(ctx.operation.method.as_str(), "GET" | "PATCH") && response.status != 404 {
        return Some(failure(
            CheckKind::UseAfterFree,
            "Use after free",
            format!("{} on a deleted resource returned {} instead of 404", ctx.operation.method, response.status),
            serde_json::json!({}),
            case,
            response,
        ));
    }
    None
}

fn ensure_resource_availability(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    if ctx.follows_successful_create && response.status == 404 {
        return Some(failure(
            CheckKind::ResourceMissing,
            "Resource unavailable after create",
            "a linked retrieval after a successful create returned 404".to_string(),
            serde_json::json!({}),
            case,
            response,
        ));
    }
    None
}

fn max_response_time(ctx: &CheckContext, case: &Case, response: &ResponseSnapshot, _body: Option<&Value>) -> Option<CheckFailure> {
    let threshold = ctx.config.max_response_time_ms?;
    if response.elapsed_ms > threshold {
        return Some(failure(
            CheckKind::TooSlow,
            "Response too slow",
            format!("response took {}ms, exceeding {}ms", response.elapsed_ms, threshold),
            serde_json::json!({"elapsed_ms": response.elapsed_ms, "threshold_ms": threshold}),
            case,
            response,
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{GenerationMeta, Phase};
    use crate::schema::model::{ResponseDef, StatusPattern};
    use indexmap::IndexMap;

    fn case_with_mode(mode: Mode) -> Case {
        Case {
            operation: "POST /items".into(),
            path_params: IndexMap::new(),
            query: IndexMap::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            body: None,
            media_type: None,
            meta: GenerationMeta { phase: Phase::Coverage, mode, seed: Some(1), description: String::new(), mutation: None },
        }
    }

    fn response(status: u16) -> ResponseSnapshot {
        ResponseSnapshot { status, headers: IndexMap::new(), body_truncated: String::new(), elapsed_ms: 1 }
    }

    fn operation_with_status(status: &str) -> APIOperation {
        let mut responses = IndexMap::new();
        responses.insert(status.to_string(), ResponseDef { status: StatusPattern::parse(status), content: IndexMap::new(), headers: IndexMap::new(), links: vec![] });
        APIOperation {
            name: "POST /items".into(),
            method: "POST".into(),
            path: "/items".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![],
            bodies: vec![],
            responses,
            security: vec![],
            links_out: vec![],
            invalid: None,
        }
    }

    #[test]
    fn server_error_flags_5xx() {
        let ctx = CheckContext { operation: &operation_with_status("200"), config: &CheckConfig::default(), resource_deleted: false, follows_successful_create: false };
        let failure = not_a_server_error(&ctx, &case_with_mode(Mode::Positive), &response(500), None);
        assert!(failure.is_some());
    }

    #[test]
    fn undocumented_status_is_flagged() {
        let operation = operation_with_status("200");
        let ctx = CheckContext { operation: &operation, config: &CheckConfig::default(), resource_deleted: false, follows_successful_create: false };
        let result = status_code_conformance(&ctx, &case_with_mode(Mode::Positive), &response(418), None);
        assert!(result.is_some());
    }

    #[test]
    fn documented_status_passes() {
        let operation = operation_with_status("200");
        let ctx = CheckContext { operation: &operation, config: &CheckConfig::default(), resource_deleted: false, follows_successful_create: false };
        let result = status_code_conformance(&ctx, &case_with_mode(Mode::Positive), &response(200), None);
        assert!(result.is_none());
    }

    #[test]
    fn negative_case_accepted_with_2xx_is_flagged() {
        let ctx = CheckContext { operation: &operation_with_status("200"), config: &CheckConfig::default(), resource_deleted: false, follows_successful_create: false };
        let result = negative_data_rejection(&ctx, &case_with_mode(Mode::Negative), &response(201), None);
        assert!(result.is_some());
    }

    #[test]
    fn positive_case_rejected_with_4xx_is_flagged() {
        let ctx = CheckContext { operation: &operation_with_status("200"), config: &CheckConfig::default(), resource_deleted: false, follows_successful_create: false };
        let result = positive_data_acceptance(&ctx, &case_with_mode(Mode::Positive), &response(422), None);
        assert!(result.is_some());
    }

    #[test]
    fn use_after_free_flags_non_404_get() {
        let mut operation = operation_with_status("200");
        operation.method = "GET".to_string();
        let ctx = CheckContext { operation: &operation, config: &CheckConfig::default(), resource_deleted: true, follows_successful_create: false };
        let result = use_after_free(&ctx, &case_with_mode(Mode::Positive), &response(200), None);
        assert!(result.is_some());
    }
}
