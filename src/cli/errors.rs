//! Error display formatting for the CLI.

use apitest_engine::constants;
use apitest_engine::error::Error;

/// Prints an error message, either as structured JSON or a human-readable
/// message with a hint.
pub fn print_error_with_json(error: &Error, json_format: bool) {
    if !json_format {
        print_error(error);
        return;
    }
    let json_error = error.to_json();
    let Ok(json_output) = serde_json::to_string_pretty(&json_error) else {
        print_error(error);
        return;
    };
    eprintln!("{json_output}");
}

/// Prints a user-friendly error message with context and a hint, when one
/// applies.
pub fn print_error(error: &Error) {
    match error {
        Error::Internal { kind, message, context } => {
            eprintln!("{kind}: {message}");
            if let Some(suggestion) = context.as_ref().and_then(|c| c.suggestion.as_ref()) {
                eprintln!("\nHint: {suggestion}");
            }
        }
        Error::Io(io_err) => eprintln!("I/O error\n{io_err}"),
        Error::Network(req_err) => print_network_error(req_err),
        Error::Yaml(yaml_err) => eprintln!("YAML parsing error\n{yaml_err}\n\nHint: {}", constants::ERR_YAML_SYNTAX),
        Error::Json(json_err) => eprintln!("JSON parsing error\n{json_err}\n\nHint: {}", constants::ERR_JSON_SYNTAX),
        Error::Toml(toml_err) => eprintln!("TOML parsing error\n{toml_err}\n\nHint: {}", constants::ERR_TOML_SYNTAX),
        Error::Anyhow(anyhow_err) => eprintln!("Error\n{anyhow_err}"),
    }
}

fn print_network_error(req_err: &reqwest::Error) {
    if req_err.is_connect() {
        eprintln!("Connection error\n{req_err}\n\nHint: {}", constants::ERR_CONNECTION);
        return;
    }
    if req_err.is_timeout() {
        eprintln!("Timeout error\n{req_err}\n\nHint: {}", constants::ERR_TIMEOUT);
        return;
    }
    eprintln!("Network error\n{req_err}");
}
