//! Query helpers over a built graph
//!
//! Dependency/dependent lookups, path finding and attribute-based filters.

use super::{GraphError, ResourceGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Nodes reachable from `id` by following outgoing edges, up to `max_depth`
/// hops (`None` for unbounded). The starting node itself is excluded.
pub fn find_dependencies(
    graph: &ResourceGraph,
    id: &str,
    max_depth: Option<usize>,
) -> Result<Vec<String>, GraphError> {
    walk(graph, id, max_depth, Direction::Forward)
}

/// Nodes that can reach `id` by following edges forward, up to `max_depth`
/// hops. The starting node itself is excluded.
pub fn find_dependents(
    graph: &ResourceGraph,
    id: &str,
    max_depth: Option<usize>,
) -> Result<Vec<String>, GraphError> {
    walk(graph, id, max_depth, Direction::Reverse)
}

enum Direction {
    Forward,
    Reverse,
}

fn walk(
    graph: &ResourceGraph,
    start: &str,
    max_depth: Option<usize>,
    direction: Direction,
) -> Result<Vec<String>, GraphError> {
    if !graph.has_node(start) {
        return Err(GraphError::NodeNotFound(start.to_string()));
    }

    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start.to_string(), 0)]);
    let mut found = Vec::new();

    while let Some((id, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        let neighbors: Vec<&str> = match direction {
            Direction::Forward => graph.successors(&id).map(|e| e.target.as_str()).collect(),
            Direction::Reverse => graph.predecessors(&id).map(|e| e.source.as_str()).collect(),
        };
        for neighbor in neighbors {
            if visited.insert(neighbor.to_string()) {
                found.push(neighbor.to_string());
                queue.push_back((neighbor.to_string(), depth + 1));
            }
        }
    }

    Ok(found)
}

/// Shortest path from `source` to `target` following edge direction, or
/// `None` if no path exists.
pub fn find_path(
    graph: &ResourceGraph,
    source: &str,
    target: &str,
) -> Result<Option<Vec<String>>, GraphError> {
    for id in [source, target] {
        if !graph.has_node(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
    }

    let mut parent: HashMap<String, String> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::from([source.to_string()]);
    let mut queue = VecDeque::from([source.to_string()]);

    while let Some(id) = queue.pop_front() {
        if id == target {
            let mut path = vec![id.clone()];
            let mut current = id;
            while let Some(prev) = parent.get(&current) {
                path.push(prev.clone());
                current = prev.clone();
            }
            path.reverse();
            return Ok(Some(path));
        }
        for edge in graph.successors(&id) {
            if visited.insert(edge.target.clone()) {
                parent.insert(edge.target.clone(), id.clone());
                queue.push_back(edge.target.clone());
            }
        }
    }

    Ok(None)
}

/// Node IDs whose `kind` attribute matches
pub fn find_by_kind(graph: &ResourceGraph, kind: &str) -> Vec<String> {
    graph
        .nodes
        .iter()
        .filter(|n| n.kind() == Some(kind))
        .map(|n| n.id.clone())
        .collect()
}

/// Node IDs whose `namespace` attribute matches
pub fn find_by_namespace(graph: &ResourceGraph, namespace: &str) -> Vec<String> {
    graph
        .nodes
        .iter()
        .filter(|n| n.namespace() == Some(namespace))
        .map(|n| n.id.clone())
        .collect()
}

/// Node IDs carrying the given label key/value
pub fn find_by_label(graph: &ResourceGraph, key: &str, value: &str) -> Vec<String> {
    graph
        .nodes
        .iter()
        .filter(|n| {
            n.attrs
                .get("labels")
                .and_then(|l| l.get(key))
                .and_then(|v| v.as_str())
                == Some(value)
        })
        .map(|n| n.id.clone())
        .collect()
}

/// Extract the subgraph induced by the given node IDs.
///
/// Keeps every listed node that exists plus all edges between them.
pub fn extract_subgraph(graph: &ResourceGraph, ids: &[&str]) -> ResourceGraph {
    let keep: HashSet<&str> = ids.iter().copied().collect();
    let mut sub = ResourceGraph::new();

    for node in &graph.nodes {
        if keep.contains(node.id.as_str()) {
            sub.add_node(node.id.clone(), node.attrs.clone());
        }
    }
    for edge in &graph.edges {
        if keep.contains(edge.source.as_str()) && keep.contains(edge.target.as_str()) {
            sub.add_edge(
                edge.source.clone(),
                edge.target.clone(),
                edge.relationship_type,
                edge.details.clone(),
            );
        }
    }

    sub
}
