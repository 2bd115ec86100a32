//! Error handling for the test engine.
//!
//! All internal failures are consolidated into a small number of
//! [`ErrorKind`] categories so that fatal, recoverable, and expected errors
//! (see the engine's error taxonomy) can be told apart mechanically by
//! callers, while still carrying a human-readable message and optional
//! structured context.

use crate::constants;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error categories used throughout the engine.
///
/// These map roughly to the error taxonomy of the design: `Schema` and
/// `Resolution` errors are usually recoverable per-operation; `Transport`
/// errors are expected per-case; `Config` and `Runtime` errors are usually
/// fatal, pre-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document could not be parsed or normalized into the schema model.
    Schema,
    /// `$ref` resolution failed (not a cycle — cycles are handled, not errors).
    Resolution,
    /// A generator could not produce a value for a schema fragment.
    Generation,
    /// Transport-level failure (connect, timeout, TLS, redirect loop).
    Transport,
    /// A check could not be evaluated (malformed response, missing context).
    Check,
    /// Stateful phase errors (expression evaluation, link graph construction).
    Stateful,
    /// Configuration or filter expression errors.
    Config,
    /// Anything else — engine bookkeeping, worker panics.
    Runtime,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(
        details: Option<serde_json::Value>,
        suggestion: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            details,
            suggestion,
        }
    }

    #[must_use]
    pub const fn with_details(details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_detail(key: &str, value: impl serde::Serialize) -> Self {
        Self {
            details: Some(json!({ key: value })),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn and_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(Cow::Owned(suggestion.into()));
        self
    }
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "Schema",
            Self::Resolution => "Resolution",
            Self::Generation => "Generation",
            Self::Transport => "Transport",
            Self::Check => "Check",
            Self::Stateful => "Stateful",
            Self::Config => "Config",
            Self::Runtime => "Runtime",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: Cow<'static, str>,
    pub message: String,
    pub context: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::Internal {
                kind,
                message,
                context: ctx,
            } => Self::Internal {
                kind,
                message: Cow::Owned(format!("{context}: {message}")),
                context: ctx,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn with_operation_context(self, operation: &str) -> Self {
        match self {
            Self::Internal {
                kind,
                message,
                context,
            } => Self::Internal {
                kind,
                message: Cow::Owned(format!("operation '{operation}': {message}")),
                context,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let (error_type, message, context, details): (
            &str,
            String,
            Option<Cow<'static, str>>,
            Option<serde_json::Value>,
        ) = match self {
            Self::Io(e) => ("Io", e.to_string(), None, None),
            Self::Network(e) => {
                let context = if e.is_connect() {
                    Some(Cow::Borrowed(constants::ERR_CONNECTION))
                } else if e.is_timeout() {
                    Some(Cow::Borrowed(constants::ERR_TIMEOUT))
                } else {
                    None
                };
                ("Network", e.to_string(), context, None)
            }
            Self::Yaml(e) => (
                "YamlParsing",
                e.to_string(),
                Some(Cow::Borrowed(constants::ERR_YAML_SYNTAX)),
                None,
            ),
            Self::Json(e) => (
                "JsonParsing",
                e.to_string(),
                Some(Cow::Borrowed(constants::ERR_JSON_SYNTAX)),
                None,
            ),
            Self::Toml(e) => (
                "TomlParsing",
                e.to_string(),
                Some(Cow::Borrowed(constants::ERR_TOML_SYNTAX)),
                None,
            ),
            Self::Internal {
                kind,
                message,
                context: ctx,
            } => {
                let context = ctx.as_ref().and_then(|c| c.suggestion.clone());
                let details = ctx.as_ref().and_then(|c| c.details.clone());
                (kind.as_str(), message.to_string(), context, details)
            }
            Self::Anyhow(e) => ("Unknown", e.to_string(), None, None),
        };

        JsonError {
            error_type: Cow::Borrowed(error_type),
            message,
            context,
            details,
        }
    }
}

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Schema,
            message: Cow::Owned(message.into()),
            context: None,
        }
    }

    pub fn schema_with_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let operation = operation.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Schema,
            message: Cow::Owned(format!("operation '{operation}' is invalid: {reason}")),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn unresolvable_reference(pointer: impl Into<String>) -> Self {
        let pointer = pointer.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!("cannot resolve reference '{pointer}'")),
            context: Some(ErrorContext::with_detail("pointer", &pointer)),
        }
    }

    pub fn external_reference_fetch_failed(
        uri: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let uri = uri.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "failed to fetch external reference '{uri}': {reason}"
            )),
            context: Some(ErrorContext::with_detail("uri", &uri)),
        }
    }

    pub fn unsatisfiable_negative(location: impl Into<String>, keyword: impl Into<String>) -> Self {
        let location = location.into();
        let keyword = keyword.into();
        Self::Internal {
            kind: ErrorKind::Generation,
            message: Cow::Owned(format!(
                "cannot negate keyword '{keyword}' at {location} without violating other constraints"
            )),
            context: Some(ErrorContext::with_details(
                json!({ "location": location, "keyword": keyword }),
            )),
        }
    }

    pub fn generation_exhausted(reason: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Generation,
            message: Cow::Owned(reason.into()),
            context: None,
        }
    }

    pub fn serialization_unsupported(media_type: impl Into<String>) -> Self {
        let media_type = media_type.into();
        Self::Internal {
            kind: ErrorKind::Generation,
            message: Cow::Owned(format!(
                "no serializer registered for media type '{media_type}'"
            )),
            context: Some(ErrorContext::with_detail("media_type", &media_type)),
        }
    }

    pub fn transport_timeout(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Transport,
            message: Cow::Owned(format!("request for '{operation}' timed out")),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn transient_network_error(message: impl Into<String>, retried: bool) -> Self {
        Self::Internal {
            kind: ErrorKind::Transport,
            message: Cow::Owned(message.into()),
            context: Some(ErrorContext::with_detail("retried", retried)),
        }
    }

    pub fn retry_limit_exceeded(attempts: u32, last_error: impl Into<String>) -> Self {
        let last_error = last_error.into();
        Self::Internal {
            kind: ErrorKind::Transport,
            message: Cow::Owned(format!(
                "exceeded {attempts} retry attempts; last error: {last_error}"
            )),
            context: Some(ErrorContext::with_detail("attempts", attempts)),
        }
    }

    pub fn expression_unresolvable(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        Self::Internal {
            kind: ErrorKind::Stateful,
            message: Cow::Owned(format!("runtime expression '{expression}' is unresolvable")),
            context: Some(ErrorContext::with_detail("expression", &expression)),
        }
    }

    pub fn stateful_cycle_unsafe(reason: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Stateful,
            message: Cow::Owned(reason.into()),
            context: None,
        }
    }

    pub fn invalid_filter_expression(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        Self::Internal {
            kind: ErrorKind::Config,
            message: Cow::Owned(format!(
                "invalid filter expression '{expr}', expected 'JSON_POINTER OP VALUE'"
            )),
            context: Some(
                ErrorContext::with_detail("expression", &expr)
                    .and_suggestion("operators are ==, !=, in, not in"),
            ),
        }
    }

    pub fn unknown_setting_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::Internal {
            kind: ErrorKind::Config,
            message: Cow::Owned(format!("unknown configuration key '{key}'")),
            context: Some(ErrorContext::with_detail("key", &key)),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Config,
            message: Cow::Owned(message.into()),
            context: None,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Owned(message.into()),
            context: None,
        }
    }

    pub fn database_corrupted(key: impl Into<String>, reason: impl Into<String>) -> Self {
        let key = key.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Owned(format!(
                "example database entry '{key}' is corrupted: {reason}"
            )),
            context: Some(ErrorContext::with_detail("key", &key)),
        }
    }

    pub fn worker_panicked(reason: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Owned(format!("worker task panicked: {}", reason.into())),
            context: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_round_trips_kind_and_message() {
        let err = Error::schema("bad document");
        let json = err.to_json();
        assert_eq!(json.error_type, "Schema");
        assert_eq!(json.message, "bad document");
    }

    #[test]
    fn suggestion_survives_context_chain() {
        let err = Error::unknown_setting_key("foo");
        match &err {
            Error::Internal { context, .. } => {
                assert!(context.as_ref().unwrap().suggestion.is_some());
            }
            _ => panic!("expected Internal variant"),
        }
    }
}
