//! Per-operation threshold warnings, evaluated once a scenario's
//! `ScenarioStats` are final.

use crate::case::{ScenarioStats, WarningKind};

const MISSING_AUTH_RATE: f64 = 0.90;
const MISSING_TEST_DATA_RATE: f64 = 0.10;
const VALIDATION_MISMATCH_RATE: f64 = 0.10;

/// Returns every threshold `stats` crosses. `security_declared` gates
/// `MissingAuth` — a warning about ignored auth only makes sense for an
/// operation that declares a security requirement in the first place.
#[must_use]
pub fn evaluate(stats: &ScenarioStats, security_declared: bool) -> Vec<WarningKind> {
    let mut warnings = Vec::new();
    if stats.total_cases == 0 {
        return warnings;
    }

    let total = stats.total_cases as f64;

    if security_declared && (stats.status_401_403 as f64 / total) >= MISSING_AUTH_RATE {
        warnings.push(WarningKind::MissingAuth);
    }

    if (stats.status_404 as f64 / total) >= MISSING_TEST_DATA_RATE {
        warnings.push(WarningKind::MissingTestData);
    }

    let other_4xx = stats
        .status_4xx
        .saturating_sub(stats.status_401_403)
        .saturating_sub(stats.status_404);
    if (other_4xx as f64 / total) >= VALIDATION_MISMATCH_RATE {
        warnings.push(WarningKind::ValidationMismatch);
    }

    if stats.missing_deserializer > 0 {
        warnings.push(WarningKind::MissingDeserializer);
    }

    warnings
}

/// `unused_openapi_auth`: a security scheme is configured by name but never
/// referenced by any operation in the schema. Evaluated once per run, not
/// per operation, since it's a property of the whole schema.
#[must_use]
pub fn unused_openapi_auth(configured_scheme_names: &[String], schema_scheme_names: &[String]) -> bool {
    configured_scheme_names
        .iter()
        .any(|name| !schema_scheme_names.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_auth_warning_fires_past_ninety_percent() {
        let stats = ScenarioStats { total_cases: 10, status_401_403: 9, ..ScenarioStats::default() };
        assert!(evaluate(&stats, true).contains(&WarningKind::MissingAuth));
    }

    #[test]
    fn missing_auth_warning_requires_declared_security() {
        let stats = ScenarioStats { total_cases: 10, status_401_403: 10, ..ScenarioStats::default() };
        assert!(!evaluate(&stats, false).contains(&WarningKind::MissingAuth));
    }

    #[test]
    fn missing_test_data_warning_fires_past_ten_percent() {
        let stats = ScenarioStats { total_cases: 20, status_404: 3, ..ScenarioStats::default() };
        assert!(evaluate(&stats, false).contains(&WarningKind::MissingTestData));
    }

    #[test]
    fn validation_mismatch_excludes_401_403_and_404() {
        let stats = ScenarioStats {
            total_cases: 10,
            status_4xx: 9,
            status_401_403: 8,
            status_404: 1,
            ..ScenarioStats::default()
        };
        // other_4xx = 9 - 8 - 1 = 0, below threshold
        assert!(!evaluate(&stats, false).contains(&WarningKind::ValidationMismatch));
    }

    #[test]
    fn no_cases_yields_no_warnings() {
        assert!(evaluate(&ScenarioStats::default(), true).is_empty());
    }

    #[test]
    fn unused_scheme_is_detected() {
        let configured = vec!["apiKeyAuth".to_string()];
        let declared = vec!["bearerAuth".to_string()];
        assert!(unused_openapi_auth(&configured, &declared));
    }
}
