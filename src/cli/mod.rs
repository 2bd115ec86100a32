//! Command-line surface: target, phases, checks, filters, auth/network,
//! generation, and output option groups.

pub mod errors;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationModeArg {
    Positive,
    Negative,
    All,
}

/// `apitest SCHEMA [OPTIONS]` — SCHEMA is a URL or filesystem path to an
/// OpenAPI document.
#[derive(Parser, Debug)]
#[command(author, version, about = "Property-based conformance testing for OpenAPI-described APIs")]
pub struct Cli {
    /// URL or filesystem path to the OpenAPI document.
    pub schema: String,

    // --- Target ---
    /// Base URL of the API under test; defaults to the schema's declared server.
    #[arg(long)]
    pub url: Option<String>,
    /// Seconds to wait for the schema to become reachable before giving up.
    #[arg(long)]
    pub wait_for_schema: Option<u64>,
    /// Number of parallel workers, or `auto` for the host CPU count.
    #[arg(long, default_value = "1")]
    pub workers: String,

    // --- Phases ---
    /// Comma-separated phases to run: examples,coverage,fuzzing,stateful.
    #[arg(long, value_delimiter = ',')]
    pub phases: Option<Vec<String>>,

    // --- Checks ---
    /// Checks to enable; defaults to all.
    #[arg(short = 'c', long = "checks", value_delimiter = ',')]
    pub checks: Option<Vec<String>>,
    /// Checks to exclude.
    #[arg(long, value_delimiter = ',')]
    pub exclude_checks: Option<Vec<String>>,
    /// Stop after this many deduplicated failures.
    #[arg(long)]
    pub max_failures: Option<usize>,
    /// Keep testing an operation after its first failure.
    #[arg(long, default_value_t = false)]
    pub continue_on_failure: bool,
    /// Per-request response time budget in seconds.
    #[arg(long)]
    pub max_response_time: Option<f64>,

    // --- Filters ---
    #[arg(long)]
    pub include_path: Vec<String>,
    #[arg(long)]
    pub exclude_path: Vec<String>,
    #[arg(long)]
    pub include_method: Vec<String>,
    #[arg(long)]
    pub exclude_method: Vec<String>,
    #[arg(long)]
    pub include_tag: Vec<String>,
    #[arg(long)]
    pub exclude_tag: Vec<String>,
    #[arg(long)]
    pub include_operation_id: Vec<String>,
    #[arg(long)]
    pub exclude_operation_id: Vec<String>,
    #[arg(long)]
    pub include_name: Vec<String>,
    #[arg(long)]
    pub exclude_name: Vec<String>,
    /// `JSON_POINTER OP VALUE`, e.g. `/tags/0 == internal`.
    #[arg(long)]
    pub include_by: Vec<String>,
    #[arg(long)]
    pub exclude_by: Vec<String>,
    #[arg(long, default_value_t = false)]
    pub exclude_deprecated: bool,

    // --- Auth & network ---
    /// Extra header, repeatable: `-H 'X-Trace: abc'`.
    #[arg(short = 'H', long = "header")]
    pub header: Vec<String>,
    /// HTTP Basic credentials `USER:PASS`.
    #[arg(short = 'a', long)]
    pub auth: Option<String>,
    #[arg(long)]
    pub proxy: Option<String>,
    #[arg(long, default_value_t = true)]
    pub tls_verify: bool,
    /// `N/SECONDS`, e.g. `10/1` for 10 requests per second.
    #[arg(long)]
    pub rate_limit: Option<String>,
    #[arg(long, default_value_t = 10)]
    pub request_timeout: u64,
    #[arg(long, default_value_t = 10)]
    pub max_redirects: u32,

    // --- Generation ---
    #[arg(short = 'm', long, value_enum, default_value_t = GenerationModeArg::All)]
    pub mode: GenerationModeArg,
    #[arg(short = 'n', long, default_value_t = 100)]
    pub max_examples: usize,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    pub no_shrink: bool,
    #[arg(long)]
    pub generation_database: Option<String>,

    // --- Output ---
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
    /// Structured error output on stderr.
    #[arg(long, default_value_t = false)]
    pub json_errors: bool,
    /// Optional project config file; see [`crate::config::ProjectConfig`].
    #[arg(long)]
    pub config: Option<String>,
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[must_use]
    pub fn parse_workers(&self) -> usize {
        if self.workers.eq_ignore_ascii_case("auto") {
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
        } else {
            self.workers.parse().unwrap_or(1)
        }
    }

    /// Splits `--rate-limit N/SECONDS` into requests-per-second, rounding
    /// down to the nearest whole request. `None` if unset or malformed.
    #[must_use]
    pub fn parse_rate_limit(&self) -> Option<u32> {
        let raw = self.rate_limit.as_ref()?;
        let (count, period) = raw.split_once('/')?;
        let count: f64 = count.parse().ok()?;
        let period: f64 = period.parse().ok()?;
        if period <= 0.0 {
            return None;
        }
        let per_second = count / period;
        if per_second < 1.0 { Some(1) } else { Some(per_second.floor() as u32) }
    }

    /// Splits `-a USER:PASS` into `(user, pass)`.
    #[must_use]
    pub fn parse_basic_auth(&self) -> Option<(String, String)> {
        let raw = self.auth.as_ref()?;
        raw.split_once(':').map(|(u, p)| (u.to_string(), p.to_string()))
    }

    /// Parses every `-H NAME:VALUE` into a name/value pair, skipping any
    /// malformed entry rather than failing the whole run.
    #[must_use]
    pub fn parse_headers(&self) -> Vec<(String, String)> {
        self.header
            .iter()
            .filter_map(|h| h.split_once(':').map(|(n, v)| (n.trim().to_string(), v.trim().to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli::parse_from(["apitest", "openapi.yaml"])
    }

    #[test]
    fn rate_limit_splits_count_over_period() {
        let mut cli = base_cli();
        cli.rate_limit = Some("10/2".to_string());
        assert_eq!(cli.parse_rate_limit(), Some(5));
    }

    #[test]
    fn rate_limit_floors_fractional_rate_to_at_least_one() {
        let mut cli = base_cli();
        cli.rate_limit = Some("1/3".to_string());
        assert_eq!(cli.parse_rate_limit(), Some(1));
    }

    #[test]
    fn basic_auth_splits_on_first_colon() {
        let mut cli = base_cli();
        cli.auth = Some("user:pa:ss".to_string());
        assert_eq!(cli.parse_basic_auth(), Some(("user".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn malformed_header_is_skipped() {
        let mut cli = base_cli();
        cli.header = vec!["not-a-header".to_string(), "X-Trace: abc".to_string()];
        assert_eq!(cli.parse_headers(), vec![("X-Trace".to_string(), "abc".to_string())]);
    }
}
