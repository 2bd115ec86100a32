//! Tracing setup and request/response logging with automatic secret
//! redaction.
//!
//! Redaction runs on every outbound request and inbound response before
//! they're logged: known-sensitive header names and query parameters are
//! replaced outright, and any value the run was configured with (an
//! `--auth`/`--header` credential, an API key from `--generation-database`
//! replay) is scrubbed out of bodies wherever it reappears.

use crate::transport::{TransportKwargs, TransportResponse};
use tracing::{debug, info, trace};
use tracing_subscriber::EnvFilter;

const MIN_SECRET_LENGTH_FOR_BODY_REDACTION: usize = 8;

/// Values a run was configured with (credentials, API keys) that should
/// never appear verbatim in logs, independent of header-name matching.
#[derive(Debug, Default, Clone)]
pub struct SecretContext {
    secrets: Vec<String>,
}

impl SecretContext {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        secrets.sort();
        secrets.dedup();
        Self { secrets }
    }

    #[must_use]
    pub fn is_secret(&self, value: &str) -> bool {
        self.secrets.iter().any(|s| s == value)
    }

    #[must_use]
    pub fn redact_secrets_in_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for secret in &self.secrets {
            if secret.len() >= MIN_SECRET_LENGTH_FOR_BODY_REDACTION {
                result = result.replace(secret, "[REDACTED]");
            }
        }
        result
    }

    #[must_use]
    pub const fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }
}

/// Single source of truth for which header names carry credentials, used
/// by both logging and the VCR/HAR report writers.
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    matches!(
        lower.as_str(),
        "authorization"
            | "proxy-authorization"
            | "x-api-key"
            | "x-api-token"
            | "api-key"
            | "api_key"
            | "x-access-token"
            | "x-auth-token"
            | "x-secret-token"
            | "token"
            | "secret"
            | "password"
            | "x-webhook-secret"
            | "cookie"
            | "set-cookie"
            | "x-csrf-token"
            | "x-xsrf-token"
            | "x-amz-security-token"
            | "private-token"
    )
}

fn should_redact_query_param(param_name: &str) -> bool {
    let lower = param_name.to_lowercase();
    matches!(
        lower.as_str(),
        "api_key"
            | "apikey"
            | "api-key"
            | "key"
            | "token"
            | "access_token"
            | "accesstoken"
            | "auth_token"
            | "authtoken"
            | "bearer_token"
            | "refresh_token"
            | "secret"
            | "api_secret"
            | "client_secret"
            | "password"
            | "passwd"
            | "pwd"
            | "signature"
            | "sig"
            | "session_id"
            | "sessionid"
            | "auth"
            | "authorization"
            | "credentials"
    )
}

/// Redacts sensitive query parameter values from `url`, leaving parameter
/// names and the rest of the URL intact.
#[must_use]
pub fn redact_url_query_params(url: &str) -> String {
    let Some(query_start) = url.find('?') else { return url.to_string() };

    let base_url = &url[..query_start];
    let query_string = &url[query_start + 1..];
    let (query_part, fragment) = query_string
        .find('#')
        .map_or((query_string, None), |frag_start| (&query_string[..frag_start], Some(&query_string[frag_start..])));

    let redacted_params: Vec<String> = query_part
        .split('&')
        .map(|param| {
            param.find('=').map_or_else(
                || param.to_string(),
                |eq_pos| {
                    let name = &param[..eq_pos];
                    if should_redact_query_param(name) {
                        format!("{name}=[REDACTED]")
                    } else {
                        param.to_string()
                    }
                },
            )
        })
        .collect();

    let mut result = format!("{base_url}?{}", redacted_params.join("&"));
    if let Some(frag) = fragment {
        result.push_str(frag);
    }
    result
}

fn redact_body(body: &[u8], secret_ctx: &SecretContext) -> String {
    let text = String::from_utf8_lossy(&body[..body.len().min(get_max_body_len())]);
    secret_ctx.redact_secrets_in_text(&text)
}

/// Logs an outbound request at info (method/URL) and debug (headers/body).
pub fn log_request(kwargs: &TransportKwargs, secret_ctx: &SecretContext) {
    let redacted_url = redact_url_query_params(&kwargs.url);
    info!(target: "apitest::transport", "-> {} {}", kwargs.method.to_uppercase(), redacted_url);

    for (name, value) in &kwargs.headers {
        let shown = if should_redact_header(name) { "[REDACTED]".to_string() } else { value.clone() };
        debug!(target: "apitest::transport", "  {name}: {shown}");
    }

    if let Some(body) = &kwargs.body {
        trace!(target: "apitest::transport", "request body: {}", redact_body(body, secret_ctx));
    }
}

/// Logs an inbound response at info (status/elapsed) and trace (body).
pub fn log_response(response: &TransportResponse, secret_ctx: &SecretContext) {
    info!(target: "apitest::transport", "<- {} ({} ms)", response.status, response.elapsed.as_millis());
    trace!(target: "apitest::transport", "response body: {}", redact_body(&response.body, secret_ctx));
}

#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var("APITEST_LOG_MAX_BODY").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(1000)
}

/// Sets up the global `tracing` subscriber: verbosity from `-v`/`-vv`,
/// format (`text`/`json`) and output file from [`crate::constants::ENV_LOG_FORMAT`]
/// / [`crate::constants::ENV_LOG_FILE`].
pub fn init_tracing(verbosity: u8) {
    use crate::constants::{ENV_LOG, ENV_LOG_FILE, ENV_LOG_FORMAT};
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let log_level = if verbosity > 0 {
        if verbosity == 1 { "debug".to_string() } else { "trace".to_string() }
    } else {
        std::env::var(ENV_LOG).unwrap_or_else(|_| "error".to_string())
    };
    let env_filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("error"));

    let log_format = std::env::var(ENV_LOG_FORMAT).map_or_else(|_| "text".to_string(), |s| s.to_lowercase());
    let writer = std::env::var(ENV_LOG_FILE).ok().map_or_else(
        || FileOrStderr { file: None },
        |path| match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => FileOrStderr { file: Some(Mutex::new(file)) },
            Err(e) => {
                eprintln!("warning: could not open log file '{path}': {e}, using stderr");
                FileOrStderr { file: None }
            }
        },
    );

    if log_format == "json" {
        let layer = tracing_subscriber::fmt::layer().json().with_target(true).with_line_number(true).with_writer(writer);
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(false).with_writer(writer);
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    }
}

struct FileOrStderr {
    file: Option<std::sync::Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileOrStderr {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file.as_ref().and_then(|m| m.lock().ok()).and_then(|f| f.try_clone().ok()).map_or_else(
            || Box::new(std::io::stderr()) as Self::Writer,
            |cloned| Box::new(cloned) as Self::Writer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_known_sensitive_headers() {
        assert!(should_redact_header("Authorization"));
        assert!(should_redact_header("X-API-Key"));
        assert!(!should_redact_header("Accept"));
    }

    #[test]
    fn redacts_sensitive_query_params() {
        let url = "http://host/path?api_key=secret123&page=2";
        assert_eq!(redact_url_query_params(url), "http://host/path?api_key=[REDACTED]&page=2");
    }

    #[test]
    fn leaves_url_without_query_unchanged() {
        assert_eq!(redact_url_query_params("http://host/path"), "http://host/path");
    }

    #[test]
    fn secret_context_redacts_long_values_only() {
        let ctx = SecretContext::from_values(["verylongsecretvalue".to_string(), "ab".to_string()]);
        let text = "token=verylongsecretvalue and code=ab";
        let redacted = ctx.redact_secrets_in_text(text);
        assert!(redacted.contains("[REDACTED]"));
        assert!(redacted.contains("code=ab"));
    }
}
