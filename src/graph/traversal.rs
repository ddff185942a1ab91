//! Graph traversal helpers
//!
//! Order-level views over a built graph: breadth/depth-first walks, root and
//! leaf detection, topological ordering and dependency levels.

use super::{GraphError, ResourceGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Breadth-first traversal from a starting node, following edge direction.
///
/// Returns visited node IDs in BFS order; the start node comes first.
pub fn traverse_bfs(graph: &ResourceGraph, start: &str) -> Result<Vec<String>, GraphError> {
    if !graph.has_node(start) {
        return Err(GraphError::NodeNotFound(start.to_string()));
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    visited.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(id) = queue.pop_front() {
        for edge in graph.successors(&id) {
            if visited.insert(edge.target.clone()) {
                queue.push_back(edge.target.clone());
            }
        }
        order.push(id);
    }

    Ok(order)
}

/// Depth-first traversal from a starting node, following edge direction.
pub fn traverse_dfs(graph: &ResourceGraph, start: &str) -> Result<Vec<String>, GraphError> {
    if !graph.has_node(start) {
        return Err(GraphError::NodeNotFound(start.to_string()));
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![start.to_string()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        for edge in graph.successors(&id) {
            if !visited.contains(&edge.target) {
                stack.push(edge.target.clone());
            }
        }
        order.push(id);
    }

    Ok(order)
}

/// Nodes with no incoming edges
pub fn get_roots(graph: &ResourceGraph) -> Vec<String> {
    let targets: HashSet<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
    graph
        .node_ids()
        .filter(|id| !targets.contains(id))
        .map(|id| id.to_string())
        .collect()
}

/// Nodes with no outgoing edges
pub fn get_leaves(graph: &ResourceGraph) -> Vec<String> {
    let sources: HashSet<&str> = graph.edges.iter().map(|e| e.source.as_str()).collect();
    graph
        .node_ids()
        .filter(|id| !sources.contains(id))
        .map(|id| id.to_string())
        .collect()
}

/// Topological ordering of the graph (Kahn's algorithm).
///
/// Fails with [`GraphError::Cycle`] if the graph is not a DAG.
pub fn topological_order(graph: &ResourceGraph) -> Result<Vec<String>, GraphError> {
    let mut in_degree: HashMap<&str, usize> =
        graph.node_ids().map(|id| (id, 0)).collect();
    for edge in &graph.edges {
        if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
            *count += 1;
        }
    }

    let mut ready: VecDeque<&str> = in_degree
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::new();

    while let Some(id) = ready.pop_front() {
        order.push(id.to_string());
        for edge in graph.successors(id) {
            if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(edge.target.as_str());
                }
            }
        }
    }

    if order.len() != graph.node_count() {
        return Err(GraphError::Cycle);
    }
    Ok(order)
}

/// Depth of each node measured from the roots.
///
/// Roots are level 0; every other node sits one past its deepest predecessor.
/// Fails with [`GraphError::Cycle`] on cyclic graphs.
pub fn dependency_levels(graph: &ResourceGraph) -> Result<HashMap<String, usize>, GraphError> {
    let order = topological_order(graph)?;
    let mut levels: HashMap<String, usize> = HashMap::new();

    for id in order {
        let level = graph
            .predecessors(&id)
            .filter_map(|e| levels.get(&e.source))
            .map(|&l| l + 1)
            .max()
            .unwrap_or(0);
        levels.insert(id, level);
    }

    Ok(levels)
}
