//! Value generation: JSON-Schema-driven strategies, built-in string
//! formats, and wire serialization.

pub mod formats;
pub mod json_schema;
pub mod serialize;

use crate::case::{GenerationMeta, Mode, Mutation, Phase};
use crate::error::Error;
use crate::schema::model::{APIOperation, ParamLocation};
use indexmap::IndexMap;
use json_schema::NegationTarget;
use serde_json::Value;

/// A reproducible source of generated values for one operation, seeded
/// once per worker per spec's per-worker-determinism requirement; splitting
/// the top-level seed per call keeps unrelated parameters independent
/// without sharing mutable RNG state across them.
pub struct Strategy {
    seed: u64,
    rng: fastrand::Rng,
}

impl Strategy {
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, rng: fastrand::Rng::with_seed(seed) }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Split off an independent child RNG so sibling generation calls
    /// (e.g. each parameter of an operation) don't perturb each other's
    /// sequence when new generation steps are added upstream.
    fn child_rng(&mut self) -> fastrand::Rng {
        let child_seed = self.rng.u64(..);
        fastrand::Rng::with_seed(child_seed)
    }

    /// Generate one positive-mode `Case` for `operation`: every parameter
    /// and body satisfies its schema.
    #[must_use]
    pub fn generate_positive_case(&mut self, operation: &APIOperation, phase: Phase) -> CaseParts {
        let mut rng = self.child_rng();
        let path_params = collect_location(operation, ParamLocation::Path, &mut rng);
        let query = collect_location(operation, ParamLocation::Query, &mut rng);
        let headers = collect_location(operation, ParamLocation::Header, &mut rng);
        let cookies = collect_location(operation, ParamLocation::Cookie, &mut rng);
        let (body, media_type) = operation
            .bodies
            .first()
            .map(|b| (Some(json_schema::generate_positive(&b.schema, &mut rng)), Some(b.media_type.clone())))
            .unwrap_or((None, None));

        CaseParts {
            path_params,
            query,
            headers,
            cookies,
            body,
            media_type,
            meta: GenerationMeta {
                phase,
                mode: Mode::Positive,
                seed: Some(self.seed),
                description: format!("positive {} {}", operation.method, operation.path),
                mutation: None,
            },
        }
    }

    /// Generate one negative-mode `Case`, violating exactly one keyword of
    /// one parameter or the body.
    ///
    /// # Errors
    /// Returns [`Error::unsatisfiable_negative`] when `operation` has no
    /// negatable constraint at all (an all-permissive schema).
    pub fn generate_negative_case(
        &mut self,
        operation: &APIOperation,
        phase: Phase,
    ) -> Result<CaseParts, Error> {
        let mut rng = self.child_rng();

        let mut targets: Vec<(MutationSite, NegationTarget)> = Vec::new();
        for param in &operation.parameters {
            for target in json_schema::negatable_keywords(&param.schema) {
                targets.push((MutationSite::Parameter(param.location, param.name.clone()), target));
            }
        }
        for body in &operation.bodies {
            for target in json_schema::negatable_keywords(&body.schema) {
                targets.push((MutationSite::Body, target));
            }
        }

        if targets.is_empty() {
            return Err(Error::unsatisfiable_negative(operation.name.clone(), "any"));
        }

        let (site, target) = &targets[rng.usize(..targets.len())];

        let mut path_params = collect_location(operation, ParamLocation::Path, &mut rng);
        let mut query = collect_location(operation, ParamLocation::Query, &mut rng);
        let mut headers = collect_location(operation, ParamLocation::Header, &mut rng);
        let mut cookies = collect_location(operation, ParamLocation::Cookie, &mut rng);
        let (mut body, media_type) = operation
            .bodies
            .first()
            .map(|b| (Some(json_schema::generate_positive(&b.schema, &mut rng)), Some(b.media_type.clone())))
            .unwrap_or((None, None));

        match site {
            MutationSite::Parameter(location, name) => {
                let param = operation
                    .parameters
                    .iter()
                    .find(|p| p.location == *location && &p.name == name)
                    .expect("target drawn from this operation's own parameters");
                let negated = json_schema::generate_negative(&param.schema, target, &mut rng)?;
                let bucket = match location {
                    ParamLocation::Path => &mut path_params,
                    ParamLocation::Query => &mut query,
                    ParamLocation::Header => &mut headers,
                    ParamLocation::Cookie => &mut cookies,
                };
                bucket.insert(name.clone(), negated);
            }
            MutationSite::Body => {
                let schema = &operation.bodies[0].schema;
                body = Some(json_schema::generate_negative(schema, target, &mut rng)?);
            }
        }

        Ok(CaseParts {
            path_params,
            query,
            headers,
            cookies,
            body,
            media_type,
            meta: GenerationMeta {
                phase,
                mode: Mode::Negative,
                seed: Some(self.seed),
                description: format!("negative {} on {}", target.keyword(), operation.name),
                mutation: Some(Mutation {
                    location: site.location_label(),
                    name: site.name_label(),
                    keyword: target.keyword(),
                }),
            },
        })
    }
}

enum MutationSite {
    Parameter(ParamLocation, String),
    Body,
}

impl MutationSite {
    fn location_label(&self) -> String {
        match self {
            Self::Parameter(loc, _) => loc.as_str().to_string(),
            Self::Body => "body".to_string(),
        }
    }

    fn name_label(&self) -> String {
        match self {
            Self::Parameter(_, name) => name.clone(),
            Self::Body => "$".to_string(),
        }
    }
}

/// The pieces of a `Case` that generation is responsible for; the caller
/// (a phase driver) fills in the operation reference and stamps the final
/// `Case`.
pub struct CaseParts {
    pub path_params: IndexMap<String, Value>,
    pub query: IndexMap<String, Value>,
    pub headers: IndexMap<String, Value>,
    pub cookies: IndexMap<String, Value>,
    pub body: Option<Value>,
    pub media_type: Option<String>,
    pub meta: GenerationMeta,
}

impl CaseParts {
    /// Stamp these generated pieces into a wire-ready `Case` for `operation`.
    #[must_use]
    pub fn into_case(self, operation: String) -> crate::case::Case {
        crate::case::Case {
            operation,
            path_params: self.path_params,
            query: self.query,
            headers: stringify_map(self.headers),
            cookies: stringify_map(self.cookies),
            body: self.body,
            media_type: self.media_type,
            meta: self.meta,
        }
    }
}

fn stringify_map(map: IndexMap<String, Value>) -> IndexMap<String, String> {
    map.into_iter()
        .map(|(k, v)| (k, v.as_str().map_or_else(|| v.to_string(), ToString::to_string)))
        .collect()
}

fn collect_location(
    operation: &APIOperation,
    location: ParamLocation,
    rng: &mut fastrand::Rng,
) -> IndexMap<String, Value> {
    let selected: Vec<_> = operation
        .parameters
        .iter()
        .filter(|p| p.location == location)
        .filter(|p| p.required || rng.bool())
        .collect();
    selected
        .into_iter()
        .map(|p| (p.name.clone(), json_schema::generate_positive(&p.schema, rng)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{APIOperation, ParamStyle, Parameter};
    use serde_json::json;

    fn sample_operation() -> APIOperation {
        APIOperation {
            name: "GET /items/{id}".into(),
            method: "GET".into(),
            path: "/items/{id}".into(),
            operation_id: Some("getItem".into()),
            tags: vec![],
            deprecated: false,
            parameters: vec![Parameter {
                location: ParamLocation::Path,
                name: "id".into(),
                required: true,
                schema: json!({"type": "integer", "minimum": 1}),
                style: ParamStyle::Simple,
                explode: false,
                content_type: None,
            }],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out: vec![],
            invalid: None,
        }
    }

    #[test]
    fn positive_case_includes_required_path_parameter() {
        let operation = sample_operation();
        let mut strategy = Strategy::with_seed(42);
        let parts = strategy.generate_positive_case(&operation, Phase::Examples);
        assert!(parts.path_params.contains_key("id"));
        assert!(parts.path_params["id"].as_i64().unwrap() >= 1);
    }

    #[test]
    fn negative_case_records_mutation_metadata() {
        let operation = sample_operation();
        let mut strategy = Strategy::with_seed(7);
        let parts = strategy.generate_negative_case(&operation, Phase::Fuzzing).unwrap();
        let mutation = parts.meta.mutation.expect("negative case must record its mutation");
        assert_eq!(mutation.name, "id");
    }

    #[test]
    fn same_seed_is_deterministic() {
        let operation = sample_operation();
        let mut a = Strategy::with_seed(99);
        let mut b = Strategy::with_seed(99);
        let parts_a = a.generate_positive_case(&operation, Phase::Examples);
        let parts_b = b.generate_positive_case(&operation, Phase::Examples);
        assert_eq!(parts_a.path_params, parts_b.path_params);
    }
}
