//! Converts a generated [`Case`] into a wire request and executes it.
//!
//! Three transports share one interface: a real network client, and two
//! in-process adapters (WSGI/ASGI) for schemas loaded from a local
//! application object rather than a live `base_url`. Only the network
//! transport is implemented against `reqwest`; the adapter variants are a
//! trait seam the loader can target once an in-process target is wired up.

pub mod retry;

use crate::case::{Case, ResponseSnapshot};
use crate::constants;
use crate::error::Error;
use crate::generators::serialize;
use crate::schema::model::{APIOperation, ParamStyle};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use retry::TimeoutConfig;
use std::str::FromStr;
use std::time::Duration;

/// Everything the transport needs to address one request, independent of
/// the transport implementation that ultimately sends it.
#[derive(Debug, Clone)]
pub struct TransportKwargs {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<Vec<u8>>,
}

/// A transport's observed outcome — either a real HTTP response or a
/// fatal-to-this-case transport error (timeout, connection refused, etc.)
/// that the engine reports as a [`crate::case::CheckKind::TransportError`]
/// rather than aborting the run.
pub struct TransportResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Build the method/url/headers/body a `case` resolves to against
/// `base_url`, resolving the path template and serializing parameters
/// according to each one's declared style.
///
/// # Errors
/// Returns [`Error::serialization_unsupported`] if the case's body media
/// type has no registered serializer.
pub fn as_transport_kwargs(
    case: &Case,
    operation: &APIOperation,
    base_url: &str,
    test_case_id: &str,
) -> Result<TransportKwargs, Error> {
    let path = resolve_path_template(&operation.path, case, operation);
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let query_string = build_query_string(case, operation);
    if !query_string.is_empty() {
        url.push('?');
        url.push_str(&query_string);
    }

    let mut headers = IndexMap::new();
    for param in operation.parameters.iter().filter(|p| p.location == crate::schema::model::ParamLocation::Header) {
        if let Some(value) = case.headers.get(&param.name) {
            headers.insert(param.name.clone(), serialize::serialize_parameter(&param.name, &serde_json::Value::String(value.clone()), param.style, param.explode));
        }
    }
    for (name, value) in &case.headers {
        headers.entry(name.clone()).or_insert_with(|| value.clone());
    }
    headers.insert(constants::HEADER_TEST_CASE_ID.to_string(), test_case_id.to_string());

    let body = match (&case.body, &case.media_type) {
        (Some(value), Some(media_type)) => {
            headers.entry(constants::HEADER_CONTENT_TYPE.to_string()).or_insert_with(|| media_type.clone());
            Some(serialize::serialize_body(value, media_type)?)
        }
        _ => None,
    };

    Ok(TransportKwargs { method: operation.method.clone(), url, headers, body })
}

fn resolve_path_template(template: &str, case: &Case, operation: &APIOperation) -> String {
    let mut path = template.to_string();
    for param in operation.path_params() {
        if let Some(value) = case.path_params.get(&param.name) {
            let serialized = serialize::serialize_parameter(&param.name, value, param.style, param.explode);
            let encoded = if param.style == ParamStyle::Label || param.style == ParamStyle::Matrix {
                serialized
            } else {
                urlencoding::encode(&serialized).into_owned()
            };
            path = path.replace(&format!("{{{}}}", param.name), &encoded);
        }
    }
    path
}

fn build_query_string(case: &Case, operation: &APIOperation) -> String {
    operation
        .parameters
        .iter()
        .filter(|p| p.location == crate::schema::model::ParamLocation::Query)
        .filter_map(|param| {
            case.query.get(&param.name).map(|value| {
                serialize::serialize_parameter(&param.name, value, param.style, param.explode)
            })
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Configuration for the network transport: timeouts, redirects, TLS, and
/// proxying, matching the run's `--request-timeout`/`--max-redirects`/
/// `--no-tls-verify`/`--proxy` options.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub request_timeout: Duration,
    pub max_redirects: usize,
    pub tls_verify: bool,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(constants::DEFAULT_REQUEST_TIMEOUT_SECS),
            max_redirects: constants::DEFAULT_MAX_REDIRECTS as usize,
            tls_verify: true,
            proxy: None,
            user_agent: format!("apitest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Real-network transport over `reqwest`, resilient to transient failures
/// via [`retry::execute_with_retry`].
pub struct NetworkTransport {
    client: reqwest::Client,
    retry_config: retry::RetryConfig,
}

/// Installs the process-wide rustls crypto provider selected by the
/// `cfg(windows)`/`cfg(not(windows))` dependency split in `Cargo.toml`.
/// `reqwest`'s `rustls-no-provider` feature requires this before any
/// `Client` can be built; it is idempotent across repeated calls.
fn ensure_crypto_provider_installed() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        #[cfg(not(windows))]
        let provider = rustls::crypto::ring::default_provider();
        #[cfg(windows)]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let _ = provider.install_default();
    });
}

impl NetworkTransport {
    /// # Errors
    /// Returns [`Error::transport_timeout`] if the underlying client
    /// cannot be constructed (e.g. an invalid proxy URL).
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        ensure_crypto_provider_installed();
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(config.user_agent.clone());

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::transport_timeout(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::transport_timeout(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, retry_config: retry::RetryConfig::default() })
    }

    /// Send `kwargs`, retrying transient failures per [`retry::RetryConfig`].
    ///
    /// # Errors
    /// Returns [`Error::transient_network_error`] when every retry attempt
    /// is exhausted, and [`Error::transport_timeout`] on a per-request
    /// timeout that isn't retried away.
    pub async fn call(&self, kwargs: &TransportKwargs) -> Result<TransportResponse, Error> {
        let method = Method::from_str(&kwargs.method)
            .map_err(|_| Error::transport_timeout(format!("invalid HTTP method '{}'", kwargs.method)))?;

        retry::execute_with_retry(&self.retry_config, &kwargs.url, || {
            let client = self.client.clone();
            let method = method.clone();
            let kwargs = kwargs.clone();
            async move { send_once(&client, method, &kwargs).await }
        })
        .await
    }
}

async fn send_once(client: &reqwest::Client, method: Method, kwargs: &TransportKwargs) -> Result<TransportResponse, reqwest::Error> {
    let mut header_map = HeaderMap::new();
    for (name, value) in &kwargs.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            header_map.insert(name, value);
        }
    }

    let mut request = client.request(method, &kwargs.url).headers(header_map);
    if let Some(body) = &kwargs.body {
        request = request.body(body.clone());
    }

    let start = std::time::Instant::now();
    let response = request.send().await?;
    let elapsed = start.elapsed();

    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = response.bytes().await?.to_vec();

    Ok(TransportResponse { status: status.as_u16(), headers, body, elapsed })
}

#[must_use]
pub fn snapshot(response: &TransportResponse, max_body_bytes: usize) -> ResponseSnapshot {
    let truncated = String::from_utf8_lossy(&response.body[..response.body.len().min(max_body_bytes)]).into_owned();
    ResponseSnapshot {
        status: response.status,
        headers: response.headers.clone(),
        body_truncated: truncated,
        elapsed_ms: u64::try_from(response.elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}

#[must_use]
pub fn status_text(status: u16) -> String {
    StatusCode::from_u16(status).map_or_else(|_| status.to_string(), |s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{GenerationMeta, Mode, Phase};
    use crate::schema::model::{ParamLocation, Parameter};
    use serde_json::json;

    fn sample_operation() -> APIOperation {
        APIOperation {
            name: "GET /items/{id}".into(),
            method: "GET".into(),
            path: "/items/{id}".into(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![
                Parameter {
                    location: ParamLocation::Path,
                    name: "id".into(),
                    required: true,
                    schema: json!({"type": "integer"}),
                    style: ParamStyle::Simple,
                    explode: false,
                    content_type: None,
                },
                Parameter {
                    location: ParamLocation::Query,
                    name: "verbose".into(),
                    required: false,
                    schema: json!({"type": "boolean"}),
                    style: ParamStyle::Form,
                    explode: true,
                    content_type: None,
                },
            ],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        }
    }

    fn sample_case() -> Case {
        let mut path_params = IndexMap::new();
        path_params.insert("id".to_string(), json!(42));
        let mut query = IndexMap::new();
        query.insert("verbose".to_string(), json!(true));
        Case {
            operation: "GET /items/{id}".into(),
            path_params,
            query,
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            body: None,
            media_type: None,
            meta: GenerationMeta { phase: Phase::Examples, mode: Mode::Positive, seed: Some(1), description: String::new(), mutation: None },
        }
    }

    #[test]
    fn path_template_substitutes_path_parameter() {
        let operation = sample_operation();
        let case = sample_case();
        let kwargs = as_transport_kwargs(&case, &operation, "http://localhost", "case-1").unwrap();
        assert!(kwargs.url.starts_with("http://localhost/items/42"));
    }

    #[test]
    fn query_parameter_is_appended() {
        let operation = sample_operation();
        let case = sample_case();
        let kwargs = as_transport_kwargs(&case, &operation, "http://localhost", "case-1").unwrap();
        assert!(kwargs.url.contains("verbose=true"));
    }

    #[test]
    fn test_case_id_header_is_always_set() {
        let operation = sample_operation();
        let case = sample_case();
        let kwargs = as_transport_kwargs(&case, &operation, "http://localhost", "case-1").unwrap();
        assert_eq!(kwargs.headers.get(constants::HEADER_TEST_CASE_ID).unwrap(), "case-1");
    }
}
