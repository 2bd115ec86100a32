//! Typed in-memory representation of operations, parameters, bodies,
//! responses, security, and links.
//!
//! Cyclic reference graphs are handled by storing operations in a flat
//! arena (`Vec<APIOperation>`) and referring to them by stable index rather
//! than by pointer, so the whole schema is trivially `Clone`/`Send`/`Sync`
//! and safe to share across worker tasks.

use super::resolver::Resolver;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamStyle {
    Form,
    Simple,
    Label,
    Matrix,
    PipeDelimited,
    DeepObject,
    SpaceDelimited,
}

impl ParamStyle {
    /// Default style for a location per the OpenAPI style table.
    #[must_use]
    pub const fn default_for(location: ParamLocation) -> Self {
        match location {
            ParamLocation::Query | ParamLocation::Cookie => Self::Form,
            ParamLocation::Path | ParamLocation::Header => Self::Simple,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub location: ParamLocation,
    pub name: String,
    pub required: bool,
    /// Raw (uninlined) JSON Schema fragment; inlining happens lazily at
    /// generation time so the arena stays cheap to clone.
    pub schema: Value,
    pub style: ParamStyle,
    pub explode: bool,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingEntry {
    pub content_type: Option<String>,
    pub style: Option<ParamStyle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    /// May be wildcarded, e.g. `"image/*"`.
    pub media_type: String,
    pub schema: Value,
    pub encoding: IndexMap<String, EncodingEntry>,
}

impl Body {
    #[must_use]
    pub fn matches_media_type(&self, candidate: &str) -> bool {
        media_type_matches(&self.media_type, candidate)
    }
}

#[must_use]
pub fn media_type_matches(pattern: &str, candidate: &str) -> bool {
    if pattern == "*/*" {
        return true;
    }
    let Some((pattern_type, pattern_subtype)) = pattern.split_once('/') else {
        return pattern == candidate;
    };
    let Some((candidate_type, candidate_subtype)) = candidate.split_once('/') else {
        return false;
    };
    (pattern_type == "*" || pattern_type == candidate_type)
        && (pattern_subtype == "*" || pattern_subtype == candidate_subtype)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum StatusPattern {
    Exact(u16),
    /// Class wildcard, e.g. `2XX` stored as `2`.
    Wildcard(u16),
    Default,
}

impl StatusPattern {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("default") {
            return Self::Default;
        }
        if let Ok(code) = raw.parse::<u16>() {
            return Self::Exact(code);
        }
        let upper = raw.to_uppercase();
        if upper.len() == 3 && upper.ends_with("XX") {
            if let Ok(class) = upper[..1].parse::<u16>() {
                return Self::Wildcard(class);
            }
        }
        Self::Default
    }

    #[must_use]
    pub fn matches(self, code: u16) -> bool {
        match self {
            Self::Exact(expected) => expected == code,
            Self::Wildcard(class) => code / 100 == class,
            Self::Default => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDef {
    pub status: StatusPattern,
    /// Media type → response body schema.
    pub content: IndexMap<String, Value>,
    /// Header name → header schema.
    pub headers: IndexMap<String, Value>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub source_status: StatusPattern,
    /// Target operation's canonical name (`METHOD /path`) or `operationId`.
    pub target_operation: String,
    /// Target parameter name → runtime expression string.
    pub parameters: IndexMap<String, String>,
    /// Runtime expression template for the target request body, if any.
    pub request_body: Option<String>,
    /// `true` when synthesized by location-header or dependency-analysis
    /// inference rather than declared explicitly in the document.
    pub inferred: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct APIOperation {
    /// Canonical name, `"METHOD /path"`.
    pub name: String,
    pub method: String,
    pub path: String,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    pub bodies: Vec<Body>,
    pub responses: IndexMap<String, ResponseDef>,
    pub security: Vec<IndexMap<String, Vec<String>>>,
    pub links_out: Vec<Link>,
    /// `Some(reason)` when this operation failed to parse; it then exists
    /// only as a placeholder that surfaces `InvalidSchema` on any access,
    /// per the "per-operation failure, not whole-run" semantics.
    pub invalid: Option<String>,
}

impl APIOperation {
    #[must_use]
    pub fn path_params(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.location == ParamLocation::Path)
    }

    #[must_use]
    pub fn responses_for(&self, status: u16) -> Vec<&ResponseDef> {
        let mut exact = None;
        let mut wildcard = None;
        let mut default = None;
        for response in self.responses.values() {
            match response.status {
                StatusPattern::Exact(code) if code == status => exact = Some(response),
                StatusPattern::Wildcard(class) if status / 100 == class => wildcard = Some(response),
                StatusPattern::Default => default = Some(response),
                _ => {}
            }
        }
        [exact, wildcard, default].into_iter().flatten().collect()
    }

    #[must_use]
    pub fn documents_status(&self, status: u16) -> bool {
        self.responses.values().any(|r| r.status.matches(status))
    }
}

/// Root entity owning the parsed document, resolver, and operation arena.
pub struct APISchema {
    pub operations: Vec<APIOperation>,
    /// `(method, path)` → index into `operations`, for O(1) lookup.
    pub by_method_path: IndexMap<(String, String), usize>,
    pub resolver: Arc<Resolver>,
    pub base_url: Option<String>,
    pub security_schemes: IndexMap<String, Value>,
    pub raw: Value,
}

impl APISchema {
    #[must_use]
    pub fn new(operations: Vec<APIOperation>, resolver: Arc<Resolver>, raw: Value) -> Self {
        let by_method_path = operations
            .iter()
            .enumerate()
            .map(|(idx, op)| ((op.method.clone(), op.path.clone()), idx))
            .collect();
        Self {
            operations,
            by_method_path,
            resolver,
            base_url: None,
            security_schemes: IndexMap::new(),
            raw,
        }
    }

    #[must_use]
    pub fn operation(&self, method: &str, path: &str) -> Option<&APIOperation> {
        self.by_method_path
            .get(&(method.to_uppercase(), path.to_string()))
            .map(|&idx| &self.operations[idx])
    }

    #[must_use]
    pub fn find_by_operation_id(&self, operation_id: &str) -> Option<&APIOperation> {
        self.operations
            .iter()
            .find(|op| op.operation_id.as_deref() == Some(operation_id))
    }

    /// Resolve a link's target, by operation id first, falling back to
    /// treating `target_operation` as a canonical `"METHOD /path"` name.
    #[must_use]
    pub fn resolve_link_target(&self, link: &Link) -> Option<&APIOperation> {
        self.find_by_operation_id(&link.target_operation).or_else(|| {
            self.operations.iter().find(|op| op.name == link.target_operation)
        })
    }

    /// Stable iteration order over all operations, matching arena order —
    /// satisfies the invariant that every operation is reachable via both
    /// keyed lookup and a stable ordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = &APIOperation> {
        self.operations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_pattern_wildcard_matches_class() {
        let pattern = StatusPattern::parse("2XX");
        assert!(pattern.matches(200));
        assert!(pattern.matches(201));
        assert!(!pattern.matches(301));
    }

    #[test]
    fn status_pattern_default_matches_anything() {
        assert!(StatusPattern::parse("default").matches(599));
    }

    #[test]
    fn media_type_wildcard_matching() {
        assert!(media_type_matches("image/*", "image/png"));
        assert!(!media_type_matches("image/*", "application/json"));
        assert!(media_type_matches("*/*", "anything/here"));
    }
}
