//! Property-based, schema-driven API conformance test engine.
//!
//! [`schema`] parses an OpenAPI document into a typed [`schema::model::APISchema`];
//! [`generators`] turns a parameter/body schema into concrete positive or
//! negative JSON values; [`phases`] sequences those generators into the
//! four generation phases (examples, coverage, fuzzing, stateful);
//! [`transport`] turns a generated [`case::Case`] into a wire request;
//! [`checks`] inspects the response; and [`engine`] ties all of the above
//! together into a concurrent, event-emitting run.

pub mod atomic;
pub mod cache;
pub mod case;
pub mod checks;
pub mod config;
pub mod constants;
pub mod database;
pub mod duration;
pub mod engine;
pub mod error;
pub mod generators;
pub mod logging;
pub mod phases;
pub mod schema;
pub mod transport;

pub use case::{Case, CheckFailure, CheckKind, Event};
pub use error::Error;
