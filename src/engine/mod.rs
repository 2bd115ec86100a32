//! Per-operation orchestration: filter, plan phases, dispatch work across
//! a bounded worker pool, run checks, deduplicate, and emit an ordered
//! event stream.
//!
//! Concurrency is the same shape as a worker pool bounded by a semaphore
//! with an optional shared token-bucket rate limiter gating each request —
//! adapted from the one used to throttle and bound batch operation
//! concurrency, generalized here to gate individual HTTP calls rather than
//! whole batch items.

pub mod warnings;

use crate::case::{Case, CheckFailure, CheckKind, Event, Phase, ScenarioStats, ScenarioStatus};
use crate::checks::{self, CheckConfig, CheckContext};
use crate::config::filter::FilterConfig;
use crate::database::Database;
use crate::error::Error;
use crate::phases::{self, CoverageConfig, FuzzingConfig};
use crate::schema::model::APISchema;
use crate::transport::{self, NetworkTransport, TransportKwargs};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;

/// Run-wide configuration the engine needs that isn't owned by a single
/// phase or check: concurrency, stop conditions, and which phases run.
#[derive(Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub workers: usize,
    pub rate_limit_per_second: Option<u32>,
    pub phases: Vec<Phase>,
    pub coverage: CoverageConfig,
    pub fuzzing: FuzzingConfig,
    pub check_config: CheckConfig,
    pub max_steps: usize,
    pub max_failures: Option<usize>,
    pub continue_on_failure: bool,
    pub seed: u64,
    pub fill_missing_examples: bool,
    pub filter: FilterConfig,
    /// Headers applied to every outbound request (`-H`/`-a`), layered on
    /// top of whatever the generated case itself supplies.
    pub extra_headers: std::collections::HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            workers: 1,
            rate_limit_per_second: None,
            phases: Phase::ORDER.to_vec(),
            coverage: CoverageConfig::default(),
            fuzzing: FuzzingConfig::default(),
            check_config: CheckConfig::default(),
            max_steps: crate::constants::DEFAULT_MAX_STEPS,
            max_failures: None,
            continue_on_failure: true,
            seed: 0,
            fill_missing_examples: true,
            filter: FilterConfig::default(),
            extra_headers: std::collections::HashMap::new(),
        }
    }
}

struct SharedState {
    config: EngineConfig,
    transport: NetworkTransport,
    database: Option<Database>,
    semaphore: Semaphore,
    rate_limiter: Option<DefaultDirectRateLimiter>,
    dispatched_failures: std::sync::atomic::AtomicUsize,
    cancelled: std::sync::atomic::AtomicBool,
}

/// Runs every selected operation's enabled phases to completion, sending
/// [`Event`]s to `events` as they occur. Operations run concurrently up to
/// `config.workers`; within one operation, phases run in `Phase::ORDER`.
pub async fn run(
    schema: Arc<APISchema>,
    transport: NetworkTransport,
    database: Option<Database>,
    config: EngineConfig,
    events: UnboundedSender<Event>,
) {
    let rate_limiter = config.rate_limit_per_second.map(|n| {
        RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(n).unwrap_or(NonZeroU32::new(1).expect("1 is non-zero")),
        ))
    });

    let state = Arc::new(SharedState {
        semaphore: Semaphore::new(config.workers.max(1)),
        rate_limiter,
        transport,
        database,
        dispatched_failures: std::sync::atomic::AtomicUsize::new(0),
        cancelled: std::sync::atomic::AtomicBool::new(false),
        config,
    });

    let selected = schema.operations.iter().filter(|op| state.config.filter.select(op)).count();
    let _ = events.send(Event::EngineStarted { operations: selected });

    let mut handles = Vec::new();
    for idx in 0..schema.operations.len() {
        let state = state.clone();
        let schema = schema.clone();
        let events = events.clone();
        handles.push(tokio::spawn(async move {
            run_operation(&state, &schema, idx, &events).await;
        }));
    }

    let mut total_failures = 0usize;
    for handle in handles {
        let _ = handle.await;
    }
    total_failures += state.dispatched_failures.load(std::sync::atomic::Ordering::SeqCst);

    let interrupted = state.cancelled.load(std::sync::atomic::Ordering::SeqCst);
    if interrupted {
        let _ = events.send(Event::Interrupted);
    }
    let _ = events.send(Event::EngineFinished {
        total_operations: schema.operations.len(),
        total_failures,
        interrupted,
    });
}

async fn run_operation(state: &Arc<SharedState>, schema: &APISchema, operation_idx: usize, events: &UnboundedSender<Event>) {
    let operation = &schema.operations[operation_idx];
    if !state.config.filter.select(operation) {
        return;
    }
    if operation.invalid.is_some() {
        let _ = events.send(Event::NonFatalError {
            operation: Some(operation.name.clone()),
            message: operation.invalid.clone().unwrap_or_default(),
        });
        return;
    }

    let _ = events.send(Event::ScenarioStarted { operation: operation.name.clone() });

    let mut stats = ScenarioStats::default();
    let mut seen_failures: HashSet<String> = HashSet::new();
    let mut strategy = crate::generators::Strategy::with_seed(state.config.seed);
    let mut operation_failed = false;

    for phase in state.config.phases.clone() {
        if state.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
        if operation_failed && !state.config.continue_on_failure {
            break;
        }

        if phase == Phase::Stateful {
            run_stateful_phase(state, schema, operation_idx, &mut strategy, events, &mut stats, &mut seen_failures, &mut operation_failed).await;
            continue;
        }

        let cases = plan_cases(state, schema, operation_idx, phase, &mut strategy);
        for case in cases {
            if state.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
                break;
            }
            if operation_failed && !state.config.continue_on_failure {
                break;
            }

            let Some((response, checks)) = execute_case(state, operation, &case, false, false).await else { continue };
            stats.total_cases += 1;
            tally(&mut stats, response.as_ref().map(|r| r.status));

            let mut fresh = Vec::new();
            for failure in checks {
                if seen_failures.insert(failure.dedup_key()) {
                    fresh.push(failure);
                }
            }
            if !fresh.is_empty() {
                stats.failures += fresh.len();
                operation_failed = true;
                if let Some(database) = &state.database {
                    let _ = database.store_failure(&case);
                }
                let total = state.dispatched_failures.fetch_add(fresh.len(), std::sync::atomic::Ordering::SeqCst) + fresh.len();
                if let Some(limit) = state.config.max_failures {
                    if total >= limit {
                        state.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                }
            }

            let _ = events.send(Event::StepFinished {
                case: case.clone(),
                status: response.map(|r| r.status),
                checks: fresh,
            });
        }
    }

    let status = if state.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
        ScenarioStatus::Skipped
    } else if stats.failures > 0 {
        ScenarioStatus::Failure
    } else {
        ScenarioStatus::Success
    };
    let _ = events.send(Event::ScenarioFinished { operation: operation.name.clone(), status, stats: stats.clone() });

    for kind in warnings::evaluate(&stats, !operation.security.is_empty()) {
        let _ = events.send(Event::Warning { kind, operation: operation.name.clone(), counters: stats.clone() });
    }
}

fn tally(stats: &mut ScenarioStats, status: Option<u16>) {
    let Some(status) = status else { return };
    if (400..500).contains(&status) {
        stats.status_4xx += 1;
    }
    if status == 401 || status == 403 {
        stats.status_401_403 += 1;
    }
    if status == 404 {
        stats.status_404 += 1;
    }
}

fn plan_cases(state: &Arc<SharedState>, schema: &APISchema, operation_idx: usize, phase: Phase, strategy: &mut crate::generators::Strategy) -> Vec<Case> {
    let operation = &schema.operations[operation_idx];
    match phase {
        Phase::Examples => phases::examples::generate(operation, strategy, state.config.fill_missing_examples),
        Phase::Coverage => phases::coverage::generate(operation, strategy, &state.config.coverage),
        Phase::Fuzzing => phases::fuzzing::generate(operation, strategy, &state.config.fuzzing, state.database.as_ref()),
        // Stateful scenarios can't be planned up front: each step's parameters
        // may depend on the previous step's actual response, so they're walked
        // and executed sequentially by `run_stateful_phase` instead.
        Phase::Stateful => Vec::new(),
    }
}

/// Walks every stateful scenario rooted at `operation_idx`, executing each
/// step in order and threading the prior step's response forward so later
/// steps can bind their parameters from it.
#[allow(clippy::too_many_arguments)]
async fn run_stateful_phase(
    state: &Arc<SharedState>,
    schema: &APISchema,
    operation_idx: usize,
    strategy: &mut crate::generators::Strategy,
    events: &UnboundedSender<Event>,
    stats: &mut ScenarioStats,
    seen_failures: &mut HashSet<String>,
    operation_failed: &mut bool,
) {
    let scenarios = phases::stateful::plan_scenarios(schema, state.config.max_steps);
    for scenario in scenarios.into_iter().filter(|s| s.steps.first().is_some_and(|(idx, _)| *idx == operation_idx)) {
        if state.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
        if *operation_failed && !state.config.continue_on_failure {
            break;
        }
        run_stateful_scenario(state, schema, &scenario, strategy, events, stats, seen_failures, operation_failed).await;
    }
}

/// Executes one scenario's steps in order, capturing each step's response
/// into a [`phases::stateful::expr::StepContext`] so the next step can bind
/// its target parameters (`$response.body#...`, `$response.header...`, etc.)
/// against real runtime state rather than generating them fresh.
#[allow(clippy::too_many_arguments)]
async fn run_stateful_scenario(
    state: &Arc<SharedState>,
    schema: &APISchema,
    scenario: &phases::stateful::machine::Scenario,
    strategy: &mut crate::generators::Strategy,
    events: &UnboundedSender<Event>,
    stats: &mut ScenarioStats,
    seen_failures: &mut HashSet<String>,
    operation_failed: &mut bool,
) {
    let mut prior: Option<phases::stateful::expr::StepContext> = None;
    let mut resource_deleted = false;
    let mut prev_operation_idx: Option<usize> = None;
    let mut prev_status: Option<u16> = None;

    for (operation_idx, link_name) in &scenario.steps {
        if state.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
        if *operation_failed && !state.config.continue_on_failure {
            break;
        }

        let operation = &schema.operations[*operation_idx];
        let link_parameters = link_name
            .as_ref()
            .and_then(|name| prev_operation_idx.map(|prev_idx| (prev_idx, name)))
            .and_then(|(prev_idx, name)| schema.operations[prev_idx].links_out.iter().find(|link| &link.name == name))
            .map_or_else(indexmap::IndexMap::new, |link| link.parameters.clone());

        let case = phases::stateful::bind_step(schema, *operation_idx, &link_parameters, prior.as_ref(), strategy);

        let follows_successful_create = prev_operation_idx
            .is_some_and(|idx| schema.operations[idx].method.eq_ignore_ascii_case("POST"))
            && prev_status.is_some_and(|status| (200..300).contains(&status));

        let Some((response, checks)) = execute_case(state, operation, &case, resource_deleted, follows_successful_create).await else {
            prev_operation_idx = Some(*operation_idx);
            prev_status = None;
            prior = None;
            continue;
        };
        stats.total_cases += 1;
        tally(stats, response.as_ref().map(|r| r.status));

        let mut fresh = Vec::new();
        for failure in checks {
            if seen_failures.insert(failure.dedup_key()) {
                fresh.push(failure);
            }
        }
        if !fresh.is_empty() {
            stats.failures += fresh.len();
            *operation_failed = true;
            if let Some(database) = &state.database {
                let _ = database.store_failure(&case);
            }
            let total = state.dispatched_failures.fetch_add(fresh.len(), std::sync::atomic::Ordering::SeqCst) + fresh.len();
            if let Some(limit) = state.config.max_failures {
                if total >= limit {
                    state.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            }
        }

        let status = response.as_ref().map(|r| r.status);
        if operation.method.eq_ignore_ascii_case("DELETE") && status.is_some_and(|s| (200..300).contains(&s)) {
            resource_deleted = true;
        }

        prior = response.as_ref().map(|response| {
            let snapshot = transport::snapshot(response, 8192);
            phases::stateful::expr::StepContext {
                request_body: case.body.clone(),
                request_path_params: case.path_params.clone(),
                request_query: case.query.clone(),
                response_body: serde_json::from_slice(&response.body).ok(),
                response: snapshot,
            }
        });
        prev_operation_idx = Some(*operation_idx);
        prev_status = status;

        let _ = events.send(Event::StepFinished { case: case.clone(), status, checks: fresh });
    }
}

async fn execute_case(
    state: &Arc<SharedState>,
    operation: &crate::schema::model::APIOperation,
    case: &Case,
    resource_deleted: bool,
    follows_successful_create: bool,
) -> Option<(Option<transport::TransportResponse>, Vec<CheckFailure>)> {
    let _permit = state.semaphore.acquire().await.ok()?;
    if let Some(limiter) = &state.rate_limiter {
        limiter.until_ready().await;
    }

    let test_case_id = case.fingerprint()[..16.min(case.fingerprint().len())].to_string();
    let mut kwargs: TransportKwargs = match transport::as_transport_kwargs(case, operation, &state.config.base_url, &test_case_id) {
        Ok(k) => k,
        Err(e) => return Some((None, vec![transport_error_failure(case, &e)])),
    };
    for (name, value) in &state.config.extra_headers {
        kwargs.headers.insert(name.clone(), value.clone());
    }

    match state.transport.call(&kwargs).await {
        Ok(response) => {
            let snapshot = transport::snapshot(&response, 8192);
            let body = serde_json::from_slice::<serde_json::Value>(&response.body).ok();
            let context = CheckContext {
                operation,
                config: &state.config.check_config,
                resource_deleted,
                follows_successful_create,
            };
            let mut failures = checks::run_all(&context, case, &snapshot, body.as_ref());
            if let Some(extra) = ignored_auth_check(state, operation, case).await {
                failures.push(extra);
            }
            Some((Some(response), failures))
        }
        Err(e) => Some((None, vec![transport_error_failure(case, &e)])),
    }
}

fn transport_error_failure(case: &Case, error: &Error) -> CheckFailure {
    CheckFailure {
        kind: CheckKind::TransportError,
        title: "transport error".to_string(),
        message: error.to_string(),
        context: serde_json::json!({}),
        case: case.clone(),
        response: None,
    }
}

/// `ignored_auth`: an operation that declares a security requirement
/// should reject a request sent without credentials. Unlike the other
/// checks, this needs its own request — it strips `Authorization`/`Cookie`
/// from the case under test and re-sends it, flagging anything but a 401.
async fn ignored_auth_check(
    state: &Arc<SharedState>,
    operation: &crate::schema::model::APIOperation,
    case: &Case,
) -> Option<CheckFailure> {
    if operation.security.is_empty() || !state.config.check_config.ignored_auth_enabled() {
        return None;
    }

    let mut stripped = case.clone();
    stripped.headers.retain(|name, _| !name.eq_ignore_ascii_case(crate::constants::HEADER_AUTHORIZATION));
    stripped.cookies.clear();
    if stripped.headers.len() == case.headers.len() && stripped.cookies.len() == case.cookies.len() {
        return None;
    }

    let test_case_id = format!("{}-noauth", &case.fingerprint()[..12.min(case.fingerprint().len())]);
    let kwargs = transport::as_transport_kwargs(&stripped, operation, &state.config.base_url, &test_case_id).ok()?;
    let response = state.transport.call(&kwargs).await.ok()?;
    if response.status == 401 {
        return None;
    }

    Some(CheckFailure {
        kind: CheckKind::AuthIgnored,
        title: "authentication ignored".to_string(),
        message: format!("request without credentials returned {} instead of 401", response.status),
        context: serde_json::json!({ "status": response.status }),
        case: case.clone(),
        response: Some(transport::snapshot(&response, 8192)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{GenerationMeta as Meta, Mode as CaseMode, Phase as CasePhase};
    use indexmap::IndexMap;

    fn sample_case() -> Case {
        Case {
            operation: "GET /items".into(),
            path_params: IndexMap::new(),
            query: IndexMap::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            body: None,
            media_type: None,
            meta: Meta { phase: CasePhase::Examples, mode: CaseMode::Positive, seed: Some(1), description: String::new(), mutation: None },
        }
    }

    #[test]
    fn tally_counts_401_and_403_together() {
        let mut stats = ScenarioStats::default();
        tally(&mut stats, Some(401));
        tally(&mut stats, Some(403));
        tally(&mut stats, Some(404));
        assert_eq!(stats.status_401_403, 2);
        assert_eq!(stats.status_404, 1);
        assert_eq!(stats.status_4xx, 3);
    }

    #[test]
    fn transport_error_produces_check_failure_with_case_attached() {
        let case = sample_case();
        let failure = transport_error_failure(&case, &Error::transport_timeout("boom"));
        assert_eq!(failure.kind, CheckKind::TransportError);
        assert_eq!(failure.case.operation, "GET /items");
    }
}
