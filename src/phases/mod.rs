//! The four generation phases, dispatched per-operation in the canonical
//! order [`crate::case::Phase::ORDER`].

pub mod coverage;
pub mod examples;
pub mod fuzzing;
pub mod stateful;

pub use coverage::CoverageConfig;
pub use fuzzing::{FuzzingConfig, GenerationMode};
