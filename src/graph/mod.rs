//! Graph data structures for resource relationships
//!
//! A simple directed graph: nodes are keyed by derived node identity strings
//! and carry a flat attribute bag, edges are keyed by their (source, target)
//! pair so re-discovering a relationship overwrites instead of duplicating.

pub mod persistence;
pub mod query;
pub mod traversal;

use crate::models::RelationshipType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Errors from graph algorithms
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("graph contains a cycle")]
    Cycle,
}

/// A node in the resource graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier for the node (e.g. `Deployment:default:nginx`)
    pub id: String,
    /// Flat attribute bag: kind, name, namespace, labels, status fields, ...
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl GraphNode {
    fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn kind(&self) -> Option<&str> {
        self.attr_str("kind")
    }

    pub fn name(&self) -> Option<&str> {
        self.attr_str("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.attr_str("namespace")
    }
}

/// An edge representing a relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node ID
    pub source: String,
    /// Target node ID
    pub target: String,
    /// Relationship type
    pub relationship_type: RelationshipType,
    /// Human-readable context
    pub details: String,
}

/// A directed graph of resources and their relationships
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// All nodes in the graph
    pub nodes: Vec<GraphNode>,
    /// All edges in the graph
    pub edges: Vec<GraphEdge>,
    /// Map from node ID to index in the nodes vector
    node_index: HashMap<String, usize>,
    /// Map from (source, target) to index in the edges vector
    edge_index: HashMap<(String, String), usize>,
}

impl ResourceGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Add a node with the given attributes.
    ///
    /// If the node already exists its attributes are replaced.
    pub fn add_node(&mut self, id: impl Into<String>, attrs: Map<String, Value>) {
        let id = id.into();
        match self.node_index.get(&id) {
            Some(&idx) => self.nodes[idx].attrs = attrs,
            None => {
                self.node_index.insert(id.clone(), self.nodes.len());
                self.nodes.push(GraphNode { id, attrs });
            }
        }
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edge_index
            .contains_key(&(source.to_string(), target.to_string()))
    }

    pub fn get_edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edge_index
            .get(&(source.to_string(), target.to_string()))
            .map(|&idx| &self.edges[idx])
    }

    /// Add an edge between two nodes.
    ///
    /// At most one edge exists per ordered (source, target) pair: adding the
    /// same pair again overwrites the relationship type and details.
    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        relationship_type: RelationshipType,
        details: impl Into<String>,
    ) {
        let source = source.into();
        let target = target.into();
        let key = (source.clone(), target.clone());

        match self.edge_index.get(&key) {
            Some(&idx) => {
                self.edges[idx].relationship_type = relationship_type;
                self.edges[idx].details = details.into();
            }
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(GraphEdge {
                    source,
                    target,
                    relationship_type,
                    details: details.into(),
                });
            }
        }
    }

    /// Edges leaving the given node
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Edges entering the given node
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// All node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }
}

impl PartialEq for ResourceGraph {
    /// Graphs are equal on their node and edge sets, ignoring insertion order.
    fn eq(&self, other: &Self) -> bool {
        if self.node_count() != other.node_count() || self.edge_count() != other.edge_count() {
            return false;
        }
        self.nodes
            .iter()
            .all(|n| other.get_node(&n.id).map(|o| o.attrs == n.attrs).unwrap_or(false))
            && self.edges.iter().all(|e| {
                other
                    .get_edge(&e.source, &e.target)
                    .map(|o| o.relationship_type == e.relationship_type && o.details == e.details)
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(kind: &str, name: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("kind".to_string(), json!(kind));
        map.insert("name".to_string(), json!(name));
        map
    }

    #[test]
    fn test_graph_creation() {
        let graph = ResourceGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_node() {
        let mut graph = ResourceGraph::new();
        graph.add_node("Pod:default:nginx", attrs("Pod", "nginx"));

        assert_eq!(graph.node_count(), 1);
        assert!(graph.has_node("Pod:default:nginx"));
        assert_eq!(
            graph.get_node("Pod:default:nginx").unwrap().kind(),
            Some("Pod")
        );
    }

    #[test]
    fn test_add_node_twice_replaces_attributes() {
        let mut graph = ResourceGraph::new();
        graph.add_node("Pod:default:nginx", attrs("Pod", "nginx"));

        let mut richer = attrs("Pod", "nginx");
        richer.insert("phase".to_string(), json!("Running"));
        graph.add_node("Pod:default:nginx", richer);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.get_node("Pod:default:nginx").unwrap().attrs["phase"],
            json!("Running")
        );
    }

    #[test]
    fn test_edge_insertion_is_idempotent() {
        let mut graph = ResourceGraph::new();
        graph.add_node("Service:default:web", attrs("Service", "web"));
        graph.add_node("Pod:default:web", attrs("Pod", "web"));

        graph.add_edge(
            "Service:default:web",
            "Pod:default:web",
            RelationshipType::LabelSelector,
            "app=web",
        );
        graph.add_edge(
            "Service:default:web",
            "Pod:default:web",
            RelationshipType::LabelSelector,
            "app=web",
        );

        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_edge_overwrite_updates_attributes() {
        let mut graph = ResourceGraph::new();
        graph.add_edge("a", "b", RelationshipType::Owner, "first");
        graph.add_edge("a", "b", RelationshipType::Owned, "second");

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.get_edge("a", "b").unwrap();
        assert_eq!(edge.relationship_type, RelationshipType::Owned);
        assert_eq!(edge.details, "second");
    }

    #[test]
    fn test_successors_and_predecessors() {
        let mut graph = ResourceGraph::new();
        graph.add_edge("a", "b", RelationshipType::Owned, "");
        graph.add_edge("a", "c", RelationshipType::Volume, "");
        graph.add_edge("d", "a", RelationshipType::Owner, "");

        assert_eq!(graph.successors("a").count(), 2);
        assert_eq!(graph.predecessors("a").count(), 1);
    }

    #[test]
    fn test_graph_equality_ignores_order() {
        let mut g1 = ResourceGraph::new();
        g1.add_node("a", attrs("Pod", "a"));
        g1.add_node("b", attrs("Pod", "b"));
        g1.add_edge("a", "b", RelationshipType::Owned, "x");

        let mut g2 = ResourceGraph::new();
        g2.add_node("b", attrs("Pod", "b"));
        g2.add_node("a", attrs("Pod", "a"));
        g2.add_edge("a", "b", RelationshipType::Owned, "x");

        assert_eq!(g1, g2);
    }
}
