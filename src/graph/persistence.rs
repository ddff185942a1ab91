//! Graph persistence and export
//!
//! Saves graphs as a node/edge JSON document with a lossless round trip,
//! plus a read-only DOT export for graph tooling.

use super::{GraphEdge, GraphNode, ResourceGraph};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized form of a [`ResourceGraph`]
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Convert a graph to its serializable document form
pub fn to_document(graph: &ResourceGraph) -> GraphDocument {
    GraphDocument {
        nodes: graph.nodes.clone(),
        edges: graph.edges.clone(),
        generated_at: Some(chrono::Utc::now()),
    }
}

/// Rebuild a graph from its document form
pub fn from_document(document: GraphDocument) -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    for node in document.nodes {
        graph.add_node(node.id, node.attrs);
    }
    for edge in document.edges {
        graph.add_edge(edge.source, edge.target, edge.relationship_type, edge.details);
    }
    graph
}

/// Save a graph to a JSON file
pub fn save_graph(graph: &ResourceGraph, path: &Path) -> Result<()> {
    let document = to_document(graph);
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize graph")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write graph to {}", path.display()))?;

    tracing::debug!(
        "Saved graph with {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

/// Load a graph from a JSON file
pub fn load_graph(path: &Path) -> Result<ResourceGraph> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph from {}", path.display()))?;
    let document: GraphDocument =
        serde_json::from_str(&json).context("Failed to parse graph document")?;
    Ok(from_document(document))
}

/// Render a graph in Graphviz DOT format (export only, not loadable)
pub fn to_dot(graph: &ResourceGraph) -> String {
    let mut out = String::from("digraph resources {\n  rankdir=TB;\n  node [shape=box];\n");

    for node in &graph.nodes {
        let label = match (node.kind(), node.name()) {
            (Some(kind), Some(name)) => format!("{kind}\\n{name}"),
            _ => node.id.clone(),
        };
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\"];\n",
            escape_dot(&node.id),
            escape_dot(&label)
        ));
    }

    for edge in &graph.edges {
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape_dot(&edge.source),
            escape_dot(&edge.target),
            edge.relationship_type
        ));
    }

    out.push_str("}\n");
    out
}

fn escape_dot(s: &str) -> String {
    s.replace('"', "\\\"")
}
