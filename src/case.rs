//! The atoms the engine passes between its components: a concrete request
//! (`Case`), a structured validator failure (`CheckFailure`), and the
//! ordered stream the engine emits to its consumer (`Event`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use serde_json::Value;

/// A generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Examples,
    Coverage,
    Fuzzing,
    Stateful,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Examples => "examples",
            Self::Coverage => "coverage",
            Self::Fuzzing => "fuzzing",
            Self::Stateful => "stateful",
        }
    }

    /// Canonical dispatch order: Examples, Coverage, Fuzzing, Stateful.
    pub const ORDER: [Self; 4] = [Self::Examples, Self::Coverage, Self::Fuzzing, Self::Stateful];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a generated value should satisfy or violate schema constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Positive,
    Negative,
}

/// Which keyword was deliberately violated to produce a negative `Case`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    /// Where the mutated schema lives, e.g. `"query.limit"` or `"body"`.
    pub location: String,
    /// Name of the parameter, or `"body"`.
    pub name: String,
    /// The JSON Schema keyword that was negated or varied.
    pub keyword: String,
}

/// Provenance attached to every generated `Case`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub phase: Phase,
    pub mode: Mode,
    pub seed: Option<u64>,
    pub description: String,
    pub mutation: Option<Mutation>,
}

/// A concrete, ready-to-send request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Canonical operation name, `"METHOD /path"`.
    pub operation: String,
    pub path_params: IndexMap<String, Value>,
    pub query: IndexMap<String, Value>,
    pub headers: IndexMap<String, String>,
    pub cookies: IndexMap<String, String>,
    pub body: Option<Value>,
    pub media_type: Option<String>,
    pub meta: GenerationMeta,
}

impl Case {
    /// Identity fingerprint: `(operation, canonicalized params/headers/query/body/media_type)`.
    ///
    /// Stable across runs for equal content regardless of map insertion order,
    /// since `IndexMap` iteration here is always sorted first.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.operation.as_bytes());

        let mut path_params: Vec<_> = self.path_params.iter().collect();
        path_params.sort_by_key(|(k, _)| k.clone());
        for (k, v) in path_params {
            hasher.update(k.as_bytes());
            hasher.update(v.to_string().as_bytes());
        }

        let mut query: Vec<_> = self.query.iter().collect();
        query.sort_by_key(|(k, _)| k.clone());
        for (k, v) in query {
            hasher.update(k.as_bytes());
            hasher.update(v.to_string().as_bytes());
        }

        let mut headers: Vec<_> = self.headers.iter().collect();
        headers.sort_by_key(|(k, _)| k.clone());
        for (k, v) in headers {
            hasher.update(k.to_lowercase().as_bytes());
            hasher.update(v.as_bytes());
        }

        if let Some(body) = &self.body {
            hasher.update(body.to_string().as_bytes());
        }
        if let Some(mt) = &self.media_type {
            hasher.update(mt.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Categories of response validator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ServerError,
    UndocumentedStatus,
    UndocumentedContentType,
    MalformedMediaType,
    MissingHeader,
    HeaderSchemaViolation,
    SchemaViolation,
    NegativeAccepted,
    PositiveRejected,
    MissingHeaderNotRejected,
    MethodNotRejected,
    UseAfterFree,
    ResourceMissing,
    AuthIgnored,
    TooSlow,
    TransportError,
}

impl CheckKind {
    pub const ALL: [Self; 16] = [
        Self::ServerError,
        Self::UndocumentedStatus,
        Self::UndocumentedContentType,
        Self::MalformedMediaType,
        Self::MissingHeader,
        Self::HeaderSchemaViolation,
        Self::SchemaViolation,
        Self::NegativeAccepted,
        Self::PositiveRejected,
        Self::MissingHeaderNotRejected,
        Self::MethodNotRejected,
        Self::UseAfterFree,
        Self::ResourceMissing,
        Self::AuthIgnored,
        Self::TooSlow,
        Self::TransportError,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerError => "server_error",
            Self::UndocumentedStatus => "undocumented_status",
            Self::UndocumentedContentType => "undocumented_content_type",
            Self::MalformedMediaType => "malformed_media_type",
            Self::MissingHeader => "missing_header",
            Self::HeaderSchemaViolation => "header_schema_violation",
            Self::SchemaViolation => "schema_violation",
            Self::NegativeAccepted => "negative_accepted",
            Self::PositiveRejected => "positive_rejected",
            Self::MissingHeaderNotRejected => "missing_header_not_rejected",
            Self::MethodNotRejected => "method_not_rejected",
            Self::UseAfterFree => "use_after_free",
            Self::ResourceMissing => "resource_missing",
            Self::AuthIgnored => "auth_ignored",
            Self::TooSlow => "too_slow",
            Self::TransportError => "transport_error",
        }
    }
}

/// A truncated view of the response that produced a `CheckFailure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body_truncated: String,
    pub elapsed_ms: u64,
}

/// A structured, deduplicatable validator failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFailure {
    pub kind: CheckKind,
    pub title: String,
    pub message: String,
    pub context: Value,
    pub case: Case,
    pub response: Option<ResponseSnapshot>,
}

impl CheckFailure {
    /// Canonical deduplication key: `(operation, kind, canonicalized context)`.
    ///
    /// Canonicalization drops volatile fields (timestamps, request ids) by
    /// only hashing the `context` value's *shape and stable fields* — callers
    /// are expected to omit volatile data from `context` before constructing
    /// a `CheckFailure`.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.case.operation.as_bytes());
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(canonicalize(&self.context).to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Recursively sort object keys so structurally-equal JSON hashes identically
/// regardless of field insertion order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Aggregate counters for an operation, used for threshold warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub total_cases: usize,
    pub failures: usize,
    pub status_4xx: usize,
    pub status_401_403: usize,
    pub status_404: usize,
    pub missing_deserializer: usize,
}

/// Final disposition of one operation's scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Success,
    Failure,
    Errored,
    Skipped,
}

/// A warning kind raised once per operation when a threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingAuth,
    MissingTestData,
    ValidationMismatch,
    MissingDeserializer,
    UnusedOpenapiAuth,
}

/// Ordered, serializable record emitted by the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    EngineStarted {
        operations: usize,
    },
    ScenarioStarted {
        operation: String,
    },
    ScenarioFinished {
        operation: String,
        status: ScenarioStatus,
        stats: ScenarioStats,
    },
    StepFinished {
        case: Case,
        status: Option<u16>,
        checks: Vec<CheckFailure>,
    },
    NonFatalError {
        operation: Option<String>,
        message: String,
    },
    Warning {
        kind: WarningKind,
        operation: String,
        counters: ScenarioStats,
    },
    Interrupted,
    EngineFinished {
        total_operations: usize,
        total_failures: usize,
        interrupted: bool,
    },
}
