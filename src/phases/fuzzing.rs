//! Fuzzing phase: randomized positive/negative generation, shrinking
//! toward a minimal failing input, and replay of previously-failing
//! examples from the database before drawing fresh ones.

use crate::case::{Case, Phase};
use crate::database::Database;
use crate::generators::json_schema::shrink_candidates;
use crate::generators::Strategy;
use crate::schema::model::APIOperation;

#[derive(Debug, Clone, Copy)]
pub enum GenerationMode {
    Positive,
    Negative,
    All,
}

#[derive(Debug, Clone)]
pub struct FuzzingConfig {
    pub max_examples: usize,
    pub mode: GenerationMode,
    pub no_shrink: bool,
}

impl Default for FuzzingConfig {
    fn default() -> Self {
        Self { max_examples: 100, mode: GenerationMode::All, no_shrink: false }
    }
}

/// Split `max_examples` across the enabled modes roughly equally, with a
/// floor of 1 per enabled mode.
fn budget_per_mode(config: &FuzzingConfig) -> (usize, usize) {
    match config.mode {
        GenerationMode::Positive => (config.max_examples.max(1), 0),
        GenerationMode::Negative => (0, config.max_examples.max(1)),
        GenerationMode::All => {
            let half = (config.max_examples / 2).max(1);
            (half, config.max_examples.saturating_sub(half).max(1))
        }
    }
}

/// Generate this operation's replay-then-fresh Fuzzing case stream.
/// `database` supplies previously-minimized failing examples to retry
/// first; freshly-generated cases follow until the budget is exhausted.
#[must_use]
pub fn generate(
    operation: &APIOperation,
    strategy: &mut Strategy,
    config: &FuzzingConfig,
    database: Option<&Database>,
) -> Vec<Case> {
    let mut cases = Vec::new();

    if let Some(db) = database {
        for replay in db.replay_candidates(&operation.name) {
            cases.push(replay);
        }
    }

    let (positive_budget, negative_budget) = budget_per_mode(config);

    for _ in 0..positive_budget {
        let parts = strategy.generate_positive_case(operation, Phase::Fuzzing);
        cases.push(parts.into_case(operation.name.clone()));
    }

    for _ in 0..negative_budget {
        if let Ok(parts) = strategy.generate_negative_case(operation, Phase::Fuzzing) {
            cases.push(parts.into_case(operation.name.clone()));
        }
    }

    cases
}

/// Shrink a failing `case`'s body toward a minimal reproduction by trying
/// progressively simpler candidates and keeping the simplest one the
/// caller confirms still fails (via `still_fails`).
pub fn shrink(case: &Case, still_fails: impl Fn(&Case) -> bool) -> Case {
    let Some(body) = &case.body else { return case.clone() };

    let mut current = case.clone();
    let mut frontier = vec![body.clone()];

    while let Some(value) = frontier.pop() {
        for candidate in shrink_candidates(&value) {
            let mut trial = current.clone();
            trial.body = Some(candidate.clone());
            if still_fails(&trial) {
                current = trial;
                frontier.push(candidate);
            }
        }
    }

    current
}
