//! Scenario construction for the Stateful phase.
//!
//! Operations are nodes; [`Link`]s are edges (`source` must run before
//! `target`). A scenario is one walk along these edges up to a configured
//! step cap. Building the graph reuses the same topological validation
//! shape as a task scheduler: collect edges, detect cycles, and only ever
//! walk forward through them — a stateful scenario never revisits an
//! operation it has already chained from, so a cycle in the link graph is
//! a configuration error rather than a runtime concern.

use crate::error::Error;
use crate::schema::model::APISchema;
use std::collections::{HashMap, HashSet, VecDeque};

/// One edge in the link graph: `from` operation index, to `to` operation
/// index, driven by the named link.
#[derive(Debug, Clone)]
pub struct LinkEdge {
    pub from: usize,
    pub to: usize,
    pub link_name: String,
}

/// Build the full link-derived edge set for a schema, resolving each
/// operation's declared `links_out` (explicit plus inferred) to arena
/// indices.
#[must_use]
pub fn build_edges(schema: &APISchema) -> Vec<LinkEdge> {
    let mut edges = Vec::new();
    for (from_idx, operation) in schema.operations.iter().enumerate() {
        for link in &operation.links_out {
            if let Some(target) = schema.resolve_link_target(link) {
                let to_idx = schema
                    .by_method_path
                    .get(&(target.method.clone(), target.path.clone()))
                    .copied();
                if let Some(to_idx) = to_idx {
                    edges.push(LinkEdge { from: from_idx, to: to_idx, link_name: link.name.clone() });
                }
            }
        }
    }
    edges
}

/// Detect whether the link graph contains a cycle reachable from `start`,
/// which would make an unbounded scenario walk unsafe without a step cap.
///
/// # Errors
/// Returns [`Error::stateful_cycle_unsafe`] if a cycle back to `start` is
/// found within `max_steps` hops (the scenario could loop forever without
/// the cap, so the caller must always apply one regardless).
pub fn check_reachable_cycle(edges: &[LinkEdge], start: usize, max_steps: usize) -> Result<(), Error> {
    let mut adjacency: HashMap<usize, Vec<&LinkEdge>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from).or_default().push(edge);
    }

    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize));
    let mut visited = HashSet::new();

    while let Some((node, depth)) = queue.pop_front() {
        if depth > max_steps {
            continue;
        }
        if depth > 0 && node == start {
            return Err(Error::stateful_cycle_unsafe(format!(
                "link graph cycles back to the starting operation within {depth} steps"
            )));
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(out) = adjacency.get(&node) {
            for edge in out {
                queue.push_back((edge.to, depth + 1));
            }
        }
    }

    Ok(())
}

/// One linear scenario: an ordered walk of operation indices connected by
/// link edges, each entry pairing the target operation with the link that
/// produced it (`None` for the scenario's root).
#[derive(Debug, Clone)]
pub struct Scenario {
    pub steps: Vec<(usize, Option<String>)>,
}

/// Enumerate scenarios rooted at every operation that has at least one
/// outgoing link, each walked greedily (first edge at each hop) up to
/// `max_steps`.
#[must_use]
pub fn build_scenarios(schema: &APISchema, edges: &[LinkEdge], max_steps: usize) -> Vec<Scenario> {
    let mut adjacency: HashMap<usize, Vec<&LinkEdge>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from).or_default().push(edge);
    }

    let mut scenarios = Vec::new();
    for root in 0..schema.operations.len() {
        if !adjacency.contains_key(&root) {
            continue;
        }
        let mut steps = vec![(root, None)];
        let mut current = root;
        let mut visited_in_walk = HashSet::from([root]);
        for _ in 0..max_steps {
            let Some(out) = adjacency.get(&current) else { break };
            let Some(edge) = out.first() else { break };
            if !visited_in_walk.insert(edge.to) {
                break;
            }
            steps.push((edge.to, Some(edge.link_name.clone())));
            current = edge.to;
        }
        if steps.len() > 1 {
            scenarios.push(Scenario { steps });
        }
    }
    scenarios
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{APIOperation, Link, StatusPattern};
    use crate::schema::resolver::Resolver;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    fn op(name: &str, method: &str, path: &str, links_out: Vec<Link>) -> APIOperation {
        APIOperation {
            name: name.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            operation_id: None,
            tags: vec![],
            deprecated: false,
            parameters: vec![],
            bodies: vec![],
            responses: IndexMap::new(),
            security: vec![],
            links_out,
            invalid: None,
        }
    }

    fn link(name: &str, target: &str) -> Link {
        Link {
            name: name.to_string(),
            source_status: StatusPattern::Exact(201),
            target_operation: target.to_string(),
            parameters: IndexMap::new(),
            request_body: None,
            inferred: false,
        }
    }

    #[test]
    fn builds_linear_scenario_from_edges() {
        let create = op("create", "POST", "/users", vec![link("getUser", "GET /users/{id}")]);
        let get = op("get", "GET", "/users/{id}", vec![]);
        let resolver = Arc::new(Resolver::new(json!({})));
        let schema = APISchema::new(vec![create, get], resolver, json!({}));

        let edges = build_edges(&schema);
        assert_eq!(edges.len(), 1);

        let scenarios = build_scenarios(&schema, &edges, 6);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].steps.len(), 2);
    }

    #[test]
    fn cycle_within_step_cap_is_rejected() {
        let a = op("a", "POST", "/a", vec![link("toB", "GET /b")]);
        let b = op("b", "GET", "/b", vec![link("toA", "POST /a")]);
        let resolver = Arc::new(Resolver::new(json!({})));
        let schema = APISchema::new(vec![a, b], resolver, json!({}));

        let edges = build_edges(&schema);
        assert!(check_reachable_cycle(&edges, 0, 6).is_err());
    }

    #[test]
    fn acyclic_graph_passes_check() {
        let create = op("create", "POST", "/users", vec![link("getUser", "GET /users/{id}")]);
        let get = op("get", "GET", "/users/{id}", vec![]);
        let resolver = Arc::new(Resolver::new(json!({})));
        let schema = APISchema::new(vec![create, get], resolver, json!({}));

        let edges = build_edges(&schema);
        assert!(check_reachable_cycle(&edges, 0, 6).is_ok());
    }
}
