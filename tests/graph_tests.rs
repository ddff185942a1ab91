//! Graph structure, traversal and query tests

mod common;

use kubegraph::graph::{ResourceGraph, query, traversal};
use kubegraph::models::RelationshipType;
use serde_json::{Map, Value, json};

fn attrs(kind: &str, name: &str, namespace: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("kind".to_string(), json!(kind));
    map.insert("name".to_string(), json!(name));
    map.insert("namespace".to_string(), json!(namespace));
    map
}

/// Deployment -> ReplicaSet -> Pod -> ConfigMap ownership/use chain
fn chain_graph() -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    graph.add_node(
        "Deployment:default:web",
        attrs("Deployment", "web", "default"),
    );
    graph.add_node(
        "ReplicaSet:default:web:abc",
        attrs("ReplicaSet", "web-abc", "default"),
    );
    graph.add_node(
        "Pod:default:ReplicaSet-web-abc:abc",
        attrs("Pod", "web-abc-x", "default"),
    );
    graph.add_node("ConfigMap:default:conf", attrs("ConfigMap", "conf", "default"));

    graph.add_edge(
        "Deployment:default:web",
        "ReplicaSet:default:web:abc",
        RelationshipType::Owned,
        "Deployment owns ReplicaSet",
    );
    graph.add_edge(
        "ReplicaSet:default:web:abc",
        "Pod:default:ReplicaSet-web-abc:abc",
        RelationshipType::Owned,
        "ReplicaSet owns Pod",
    );
    graph.add_edge(
        "Pod:default:ReplicaSet-web-abc:abc",
        "ConfigMap:default:conf",
        RelationshipType::Volume,
        "Mounts ConfigMap",
    );
    graph
}

#[test]
fn test_idempotent_edge_insertion() {
    let mut graph = chain_graph();
    let before = graph.edge_count();

    graph.add_edge(
        "Deployment:default:web",
        "ReplicaSet:default:web:abc",
        RelationshipType::Owned,
        "Deployment owns ReplicaSet",
    );

    assert_eq!(graph.edge_count(), before);
}

#[test]
fn test_node_accessors() {
    let graph = chain_graph();
    let node = graph.get_node("Deployment:default:web").unwrap();

    assert_eq!(node.kind(), Some("Deployment"));
    assert_eq!(node.name(), Some("web"));
    assert_eq!(node.namespace(), Some("default"));
}

#[test]
fn test_topological_order_on_ownership_chain() {
    let graph = chain_graph();
    let order = traversal::topological_order(&graph).unwrap();

    let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
    assert!(pos("Deployment:default:web") < pos("ReplicaSet:default:web:abc"));
    assert!(pos("ReplicaSet:default:web:abc") < pos("Pod:default:ReplicaSet-web-abc:abc"));
    assert!(pos("Pod:default:ReplicaSet-web-abc:abc") < pos("ConfigMap:default:conf"));
}

#[test]
fn test_bfs_from_root_covers_chain() {
    let graph = chain_graph();
    let order = traversal::traverse_bfs(&graph, "Deployment:default:web").unwrap();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], "Deployment:default:web");
}

#[test]
fn test_roots_and_leaves() {
    let graph = chain_graph();
    assert_eq!(
        traversal::get_roots(&graph),
        vec!["Deployment:default:web".to_string()]
    );
    assert_eq!(
        traversal::get_leaves(&graph),
        vec!["ConfigMap:default:conf".to_string()]
    );
}

#[test]
fn test_dependencies_and_dependents_are_symmetric() {
    let graph = chain_graph();

    let deps = query::find_dependencies(&graph, "Deployment:default:web", None).unwrap();
    assert!(deps.contains(&"ConfigMap:default:conf".to_string()));

    let dependents = query::find_dependents(&graph, "ConfigMap:default:conf", None).unwrap();
    assert!(dependents.contains(&"Deployment:default:web".to_string()));

    assert_eq!(deps.len(), 3);
    assert_eq!(dependents.len(), 3);
}

#[test]
fn test_find_path_through_chain() {
    let graph = chain_graph();
    let path = query::find_path(&graph, "Deployment:default:web", "ConfigMap:default:conf")
        .unwrap()
        .expect("path must exist");
    assert_eq!(path.len(), 4);

    let reverse = query::find_path(&graph, "ConfigMap:default:conf", "Deployment:default:web")
        .unwrap();
    assert!(reverse.is_none());
}

#[test]
fn test_find_by_kind() {
    let graph = chain_graph();
    assert_eq!(
        query::find_by_kind(&graph, "Pod"),
        vec!["Pod:default:ReplicaSet-web-abc:abc".to_string()]
    );
    assert!(query::find_by_kind(&graph, "Job").is_empty());
}

#[test]
fn test_subgraph_extraction() {
    let graph = chain_graph();
    let sub = query::extract_subgraph(
        &graph,
        &["Deployment:default:web", "ReplicaSet:default:web:abc"],
    );

    assert_eq!(sub.node_count(), 2);
    assert_eq!(sub.edge_count(), 1);
}
