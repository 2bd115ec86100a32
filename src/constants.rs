//! Centralized string constants.
//!
//! Reduces string duplication between the schema model, transport, and
//! checks, and keeps header/content-type spelling consistent.

// HTTP Headers
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_LOCATION: &str = "Location";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";
pub const HEADER_ALLOW: &str = "Allow";
pub const HEADER_COOKIE: &str = "Cookie";
pub const HEADER_TEST_CASE_ID: &str = "X-Schemathesis-TestCaseId";

// Lowercase header names (for HTTP/2 compatibility and internal use)
pub const HEADER_AUTHORIZATION_LC: &str = "authorization";
pub const HEADER_CONTENT_TYPE_LC: &str = "content-type";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_YAML: &str = "application/yaml";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_GRAPHQL: &str = "application/graphql";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";
pub const CONTENT_TYPE_TEXT_XML: &str = "text/xml";
pub const CONTENT_TYPE_CSV: &str = "text/csv";

// Content type prefixes and identifiers
pub const CONTENT_TYPE_PREFIX_IMAGE: &str = "image/";
pub const CONTENT_TYPE_IDENTIFIER_JSON: &str = "json";
pub const CONTENT_TYPE_IDENTIFIER_YAML: &str = "yaml";
pub const CONTENT_TYPE_IDENTIFIER_XML: &str = "xml";
pub const CONTENT_TYPE_IDENTIFIER_TEXT: &str = "text";

// Authentication Schemes (OpenAPI securityScheme.type / .scheme)
pub const AUTH_SCHEME_BEARER: &str = "bearer";
pub const AUTH_SCHEME_BASIC: &str = "basic";
pub const AUTH_SCHEME_APIKEY: &str = "apiKey";
pub const AUTH_SCHEME_OAUTH2: &str = "oauth2";
pub const AUTH_SCHEME_OPENID: &str = "openidconnect";

// Environment Variables
pub const ENV_BASE_URL: &str = "SCHEMATHESIS_BASE_URL";
pub const ENV_HOOKS: &str = "SCHEMATHESIS_HOOKS";
pub const ENV_LOG: &str = "APITEST_LOG";
pub const ENV_LOG_FORMAT: &str = "APITEST_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "APITEST_LOG_FILE";

// Common Response Messages
pub const EMPTY_RESPONSE: &str = "(empty response)";
pub const NULL_VALUE: &str = "null";

// Error context/suggestion messages
pub const ERR_CONNECTION: &str = "Check that the target server is running and accessible.";
pub const ERR_TIMEOUT: &str = "The target server may be slow or unresponsive.";
pub const ERR_YAML_SYNTAX: &str = "Check that the API document is valid YAML syntax.";
pub const ERR_JSON_SYNTAX: &str = "Check that the API document or payload contains valid JSON.";
pub const ERR_TOML_SYNTAX: &str = "Check that the configuration file is valid TOML syntax.";
pub const ERR_OPENAPI_FORMAT: &str = "Check that the document follows a supported OpenAPI version.";

// Defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;
pub const DEFAULT_MAX_STEPS: usize = 6;
pub const DEFAULT_MAX_EXAMPLES: usize = 100;
pub const MAX_INLINE_DEPTH: usize = 8;

// Schema Types
pub const SCHEMA_TYPE_STRING: &str = "string";
pub const SCHEMA_TYPE_NUMBER: &str = "number";
pub const SCHEMA_TYPE_INTEGER: &str = "integer";
pub const SCHEMA_TYPE_BOOLEAN: &str = "boolean";
pub const SCHEMA_TYPE_ARRAY: &str = "array";
pub const SCHEMA_TYPE_OBJECT: &str = "object";
pub const SCHEMA_TYPE_NULL: &str = "null";

// HTTP Methods
pub const HTTP_METHOD_GET: &str = "GET";
pub const HTTP_METHOD_POST: &str = "POST";
pub const HTTP_METHOD_PUT: &str = "PUT";
pub const HTTP_METHOD_DELETE: &str = "DELETE";
pub const HTTP_METHOD_PATCH: &str = "PATCH";
pub const HTTP_METHOD_HEAD: &str = "HEAD";
pub const HTTP_METHOD_OPTIONS: &str = "OPTIONS";
pub const HTTP_METHOD_TRACE: &str = "TRACE";

pub const ALL_HTTP_METHODS: &[&str] = &[
    HTTP_METHOD_GET,
    HTTP_METHOD_POST,
    HTTP_METHOD_PUT,
    HTTP_METHOD_DELETE,
    HTTP_METHOD_PATCH,
    HTTP_METHOD_HEAD,
    HTTP_METHOD_OPTIONS,
    HTTP_METHOD_TRACE,
];

// Parameter Locations
pub const PARAM_LOCATION_PATH: &str = "path";
pub const PARAM_LOCATION_QUERY: &str = "query";
pub const PARAM_LOCATION_HEADER: &str = "header";
pub const PARAM_LOCATION_COOKIE: &str = "cookie";

// OpenAPI Component Names
pub const COMPONENT_SCHEMAS: &str = "schemas";
pub const COMPONENT_RESPONSES: &str = "responses";
pub const COMPONENT_EXAMPLES: &str = "examples";
pub const COMPONENT_PARAMETERS: &str = "parameters";
pub const COMPONENT_REQUEST_BODIES: &str = "requestBodies";
pub const COMPONENT_HEADERS: &str = "headers";
pub const COMPONENT_SECURITY_SCHEMES: &str = "securitySchemes";
pub const COMPONENT_LINKS: &str = "links";

/// Check if a content type is JSON.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.contains(CONTENT_TYPE_IDENTIFIER_JSON)
}

/// Check if a content type is XML.
#[must_use]
pub fn is_xml_content_type(content_type: &str) -> bool {
    content_type.contains(CONTENT_TYPE_IDENTIFIER_XML)
}

/// Check if a content type is supported for structured body parsing.
#[must_use]
pub fn is_supported_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains(CONTENT_TYPE_IDENTIFIER_JSON)
        || ct.contains(CONTENT_TYPE_IDENTIFIER_YAML)
        || ct.contains(CONTENT_TYPE_IDENTIFIER_XML)
        || ct.contains(CONTENT_TYPE_IDENTIFIER_TEXT)
}
