//! Hierarchical run configuration: CLI overrides > project config file >
//! global defaults, merged into one flat [`RunConfig`] the engine consumes.
//!
//! Project config files are TOML. Values may reference `${NAME}` to pull
//! from the process environment at load time — the braces are scanned the
//! same way a server URL template's `{variable}` placeholders are, just
//! with a leading `$` distinguishing an environment lookup from a literal.

pub mod filter;

use crate::case::{CheckKind, Phase};
use crate::checks::CheckConfig;
use crate::engine::EngineConfig;
use crate::error::Error;
use crate::phases::{CoverageConfig, FuzzingConfig, GenerationMode};
use filter::FilterConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// On-disk project configuration. Every field is optional — absent fields
/// fall through to [`RunConfig::default`] or a CLI-supplied override.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    pub base_url: Option<String>,
    pub workers: Option<usize>,
    pub rate_limit: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub phases: Option<Vec<String>>,
    pub exclude_checks: Option<Vec<String>>,
    pub max_failures: Option<usize>,
    pub continue_on_failure: Option<bool>,
    pub seed: Option<u64>,
    pub max_examples: Option<usize>,
    pub mode: Option<String>,
    pub no_shrink: Option<bool>,
    pub max_response_time_ms: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

/// Flat, engine-ready configuration produced by merging a [`ProjectConfig`]
/// underneath explicit CLI values. Field-by-field, a `Some` CLI value wins;
/// otherwise the project config's value is used; otherwise the default.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub workers: usize,
    pub rate_limit_per_second: Option<u32>,
    pub request_timeout: Duration,
    pub phases: Vec<Phase>,
    pub check_config: CheckConfig,
    pub coverage: CoverageConfig,
    pub fuzzing: FuzzingConfig,
    pub filter: FilterConfig,
    pub max_failures: Option<usize>,
    pub continue_on_failure: bool,
    pub seed: u64,
    pub extra_headers: HashMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            workers: 1,
            rate_limit_per_second: None,
            request_timeout: Duration::from_secs(crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS),
            phases: Phase::ORDER.to_vec(),
            check_config: CheckConfig::default(),
            coverage: CoverageConfig::default(),
            fuzzing: FuzzingConfig::default(),
            filter: FilterConfig::default(),
            max_failures: None,
            continue_on_failure: true,
            seed: 0,
            extra_headers: HashMap::new(),
        }
    }
}

impl RunConfig {
    /// Loads `path` as TOML, substitutes `${NAME}` environment references,
    /// and layers it underneath `self` (an already CLI-populated config).
    ///
    /// # Errors
    /// Returns [`Error::invalid_config`] if `path` can't be read or parsed,
    /// or names a phase/check apitest doesn't recognize.
    pub fn merge_project_file(mut self, path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::invalid_config(format!("reading {}: {e}", path.display())))?;
        let substituted = substitute_env_vars(&raw);
        let project: ProjectConfig = toml::from_str(&substituted).map_err(|e| Error::invalid_config(format!("parsing {}: {e}", path.display())))?;
        self.apply_project(project)?;
        Ok(self)
    }

    fn apply_project(&mut self, project: ProjectConfig) -> Result<(), Error> {
        if self.base_url.is_empty() {
            if let Some(base_url) = project.base_url {
                self.base_url = base_url;
            }
        }
        if let Some(workers) = project.workers {
            self.workers = workers;
        }
        if let Some(rate_limit) = project.rate_limit {
            self.rate_limit_per_second = Some(rate_limit);
        }
        if let Some(secs) = project.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(phases) = project.phases {
            self.phases = phases.iter().map(|p| parse_phase(p)).collect::<Result<_, _>>()?;
        }
        if let Some(checks) = project.exclude_checks {
            self.check_config.disabled = checks.iter().map(|c| parse_check(c)).collect::<Result<_, _>>()?;
        }
        if let Some(max_failures) = project.max_failures {
            self.max_failures = Some(max_failures);
        }
        if let Some(continue_on_failure) = project.continue_on_failure {
            self.continue_on_failure = continue_on_failure;
        }
        if let Some(seed) = project.seed {
            self.seed = seed;
        }
        if let Some(max_examples) = project.max_examples {
            self.fuzzing.max_examples = max_examples;
        }
        if let Some(mode) = project.mode {
            self.fuzzing.mode = parse_mode(&mode)?;
        }
        if let Some(no_shrink) = project.no_shrink {
            self.fuzzing.no_shrink = no_shrink;
        }
        if let Some(ms) = project.max_response_time_ms {
            self.check_config.max_response_time_ms = Some(ms);
        }
        if let Some(headers) = project.headers {
            for (k, v) in headers {
                self.extra_headers.entry(k).or_insert(v);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn into_engine_config(self) -> EngineConfig {
        EngineConfig {
            base_url: self.base_url,
            workers: self.workers,
            rate_limit_per_second: self.rate_limit_per_second,
            phases: self.phases,
            coverage: self.coverage,
            fuzzing: self.fuzzing,
            check_config: self.check_config,
            max_steps: crate::constants::DEFAULT_MAX_STEPS,
            max_failures: self.max_failures,
            continue_on_failure: self.continue_on_failure,
            seed: self.seed,
            fill_missing_examples: true,
            filter: self.filter,
            extra_headers: self.extra_headers,
        }
    }
}

/// Parses a phase name shared by CLI `--phases` and project-file `phases`.
///
/// # Errors
/// Returns [`Error::unknown_setting_key`] if `name` isn't a known phase.
pub fn parse_phase(name: &str) -> Result<Phase, Error> {
    match name {
        "examples" => Ok(Phase::Examples),
        "coverage" => Ok(Phase::Coverage),
        "fuzzing" => Ok(Phase::Fuzzing),
        "stateful" => Ok(Phase::Stateful),
        other => Err(Error::unknown_setting_key(format!("phases: unknown phase '{other}'"))),
    }
}

/// Parses a check name shared by CLI `--checks`/`--exclude-checks` and
/// project-file `exclude_checks`.
///
/// # Errors
/// Returns [`Error::unknown_setting_key`] if `name` isn't a known check.
pub fn parse_check(name: &str) -> Result<CheckKind, Error> {
    match name {
        "server_error" => Ok(CheckKind::ServerError),
        "undocumented_status" => Ok(CheckKind::UndocumentedStatus),
        "undocumented_content_type" => Ok(CheckKind::UndocumentedContentType),
        "malformed_media_type" => Ok(CheckKind::MalformedMediaType),
        "missing_header" => Ok(CheckKind::MissingHeader),
        "header_schema_violation" => Ok(CheckKind::HeaderSchemaViolation),
        "schema_violation" => Ok(CheckKind::SchemaViolation),
        "negative_accepted" => Ok(CheckKind::NegativeAccepted),
        "positive_rejected" => Ok(CheckKind::PositiveRejected),
        "missing_header_not_rejected" => Ok(CheckKind::MissingHeaderNotRejected),
        "method_not_rejected" => Ok(CheckKind::MethodNotRejected),
        "use_after_free" => Ok(CheckKind::UseAfterFree),
        "resource_missing" => Ok(CheckKind::ResourceMissing),
        "auth_ignored" => Ok(CheckKind::AuthIgnored),
        "too_slow" => Ok(CheckKind::TooSlow),
        "transport_error" => Ok(CheckKind::TransportError),
        other => Err(Error::unknown_setting_key(format!("checks: unknown check '{other}'"))),
    }
}

fn parse_mode(name: &str) -> Result<GenerationMode, Error> {
    match name {
        "positive" => Ok(GenerationMode::Positive),
        "negative" => Ok(GenerationMode::Negative),
        "all" => Ok(GenerationMode::All),
        other => Err(Error::unknown_setting_key(format!("mode: unknown mode '{other}'"))),
    }
}

/// Replaces every `${NAME}` occurrence with the value of the `NAME`
/// environment variable, left as-is (braces included) if unset.
#[must_use]
pub fn substitute_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(close) = after_open.find('}') else {
            result.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after_open[..close];
        match std::env::var(name) {
            Ok(value) => result.push_str(&value),
            Err(_) => result.push_str(&rest[start..start + 2 + close + 1]),
        }
        rest = &after_open[close + 1..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_env_var() {
        std::env::set_var("APITEST_CONFIG_TEST_VAR", "resolved");
        let out = substitute_env_vars("base_url = \"${APITEST_CONFIG_TEST_VAR}\"");
        assert_eq!(out, "base_url = \"resolved\"");
    }

    #[test]
    fn leaves_unset_var_untouched() {
        std::env::remove_var("APITEST_CONFIG_UNSET_VAR");
        let out = substitute_env_vars("x = ${APITEST_CONFIG_UNSET_VAR}");
        assert_eq!(out, "x = ${APITEST_CONFIG_UNSET_VAR}");
    }

    #[test]
    fn project_file_values_fill_in_when_cli_left_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apitest.toml");
        std::fs::write(&path, "workers = 4\nseed = 7\n").unwrap();
        let config = RunConfig::default().merge_project_file(&path).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn unknown_phase_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apitest.toml");
        std::fs::write(&path, "phases = [\"not-a-phase\"]\n").unwrap();
        assert!(RunConfig::default().merge_project_file(&path).is_err());
    }
}
