mod cli;

use apitest_engine::config::RunConfig;
use apitest_engine::engine;
use apitest_engine::error::Error;
use apitest_engine::logging;
use apitest_engine::schema::{self, LinkInferenceConfig};
use apitest_engine::transport::{NetworkTransport, TransportConfig};
use apitest_engine::{database::Database, Event};
use cli::errors::print_error_with_json;
use cli::Cli;
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            print_error_with_json(&e, true);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<i32, Error> {
    let bytes = load_schema_bytes(&cli.schema).await?;
    let schema = schema::load_openapi(&bytes, LinkInferenceConfig::default(), true)?;
    let base_url = cli.url.clone().or_else(|| schema.base_url.clone()).unwrap_or_default();
    let schema = Arc::new(schema);

    let mut run_config = RunConfig { base_url, workers: cli.parse_workers(), ..RunConfig::default() };
    run_config.rate_limit_per_second = cli.parse_rate_limit();
    run_config.max_failures = cli.max_failures;
    run_config.continue_on_failure = cli.continue_on_failure;
    if let Some(seed) = cli.seed {
        run_config.seed = seed;
    }
    run_config.fuzzing.max_examples = cli.max_examples;
    run_config.fuzzing.no_shrink = cli.no_shrink;
    run_config.fuzzing.mode = match cli.mode {
        cli::GenerationModeArg::Positive => apitest_engine::phases::GenerationMode::Positive,
        cli::GenerationModeArg::Negative => apitest_engine::phases::GenerationMode::Negative,
        cli::GenerationModeArg::All => apitest_engine::phases::GenerationMode::All,
    };
    run_config.extra_headers = cli.parse_headers().into_iter().collect::<HashMap<_, _>>();
    if let Some((user, pass)) = cli.parse_basic_auth() {
        use base64::Engine;
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        run_config.extra_headers.insert("Authorization".to_string(), format!("Basic {token}"));
    }

    if let Some(phases) = &cli.phases {
        run_config.phases = phases.iter().map(|p| apitest_engine::config::parse_phase(p)).collect::<Result<_, _>>()?;
    }
    if let Some(checks) = &cli.checks {
        let enabled: Vec<_> = checks.iter().map(|c| apitest_engine::config::parse_check(c)).collect::<Result<_, _>>()?;
        run_config.check_config.disabled = apitest_engine::CheckKind::ALL.into_iter().filter(|k| !enabled.contains(k)).collect();
    } else if let Some(excluded) = &cli.exclude_checks {
        run_config.check_config.disabled = excluded.iter().map(|c| apitest_engine::config::parse_check(c)).collect::<Result<_, _>>()?;
    }
    if let Some(seconds) = cli.max_response_time {
        run_config.check_config.max_response_time_ms = Some((seconds * 1000.0) as u64);
    }
    run_config.filter.include_path.exact = cli.include_path.clone();
    run_config.filter.exclude_path.exact = cli.exclude_path.clone();
    run_config.filter.include_method.exact = cli.include_method.clone();
    run_config.filter.exclude_method.exact = cli.exclude_method.clone();
    run_config.filter.include_tag.exact = cli.include_tag.clone();
    run_config.filter.exclude_tag.exact = cli.exclude_tag.clone();
    run_config.filter.include_operation_id.exact = cli.include_operation_id.clone();
    run_config.filter.exclude_operation_id.exact = cli.exclude_operation_id.clone();
    run_config.filter.include_name.exact = cli.include_name.clone();
    run_config.filter.exclude_name.exact = cli.exclude_name.clone();
    run_config.filter.include_by =
        cli.include_by.iter().map(|e| apitest_engine::config::filter::ByExpression::parse(e)).collect::<Result<_, _>>()?;
    run_config.filter.exclude_by =
        cli.exclude_by.iter().map(|e| apitest_engine::config::filter::ByExpression::parse(e)).collect::<Result<_, _>>()?;
    run_config.filter.exclude_deprecated = cli.exclude_deprecated;

    if let Some(config_path) = &cli.config {
        run_config = run_config.merge_project_file(Path::new(config_path))?;
    }

    let transport_config = TransportConfig {
        request_timeout: Duration::from_secs(cli.request_timeout),
        max_redirects: cli.max_redirects as usize,
        tls_verify: cli.tls_verify,
        proxy: cli.proxy.clone(),
        ..TransportConfig::default()
    };
    let transport = NetworkTransport::new(&transport_config)?;

    let database = cli
        .generation_database
        .as_ref()
        .map(|path| Database::open(PathBuf::from(path), &bytes))
        .transpose()?;

    let engine_config = run_config.into_engine_config();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let schema_for_engine = Arc::clone(&schema);
    let engine_handle = tokio::spawn(engine::run(schema_for_engine, transport, database, engine_config, tx));

    let mut failures = 0usize;
    let mut interrupted = false;
    while let Some(event) = rx.recv().await {
        match &event {
            Event::EngineFinished { total_failures, interrupted: was_interrupted, .. } => {
                failures = *total_failures;
                interrupted = *was_interrupted;
            }
            _ => {}
        }
        print_event(&event, matches!(cli.output, cli::OutputFormat::Json));
    }

    let _ = engine_handle.await;

    if interrupted {
        Ok(2)
    } else if failures > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn print_event(event: &Event, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        Event::EngineStarted { operations } => println!("running {operations} operations"),
        Event::ScenarioStarted { operation } => println!("-> {operation}"),
        Event::ScenarioFinished { operation, status, stats } => {
            println!("<- {operation}: {status:?} ({} cases, {} failures)", stats.total_cases, stats.failures);
        }
        Event::StepFinished { case, status, checks } => {
            if !checks.is_empty() {
                println!("   {} {:?} -> {} checks failed", case.operation, status, checks.len());
            }
        }
        Event::NonFatalError { operation, message } => {
            eprintln!("warning: {}: {message}", operation.as_deref().unwrap_or("<schema>"));
        }
        Event::Warning { kind, operation, .. } => println!("warning: {operation}: {kind:?}"),
        Event::Interrupted => eprintln!("run interrupted: max failures reached"),
        Event::EngineFinished { total_operations, total_failures, interrupted } => {
            println!("finished: {total_operations} operations, {total_failures} failures, interrupted={interrupted}");
        }
    }
}

async fn load_schema_bytes(schema: &str) -> Result<Vec<u8>, Error> {
    if schema.starts_with("http://") || schema.starts_with("https://") {
        let response = reqwest::get(schema).await?;
        Ok(response.bytes().await?.to_vec())
    } else {
        std::fs::read(schema).map_err(Error::Io)
    }
}
