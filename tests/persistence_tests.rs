//! Persistence round-trip and export tests

mod common;

use common::*;
use kubegraph::graph::persistence;
use kubegraph::{BuildOptions, GraphBuilder, ResourceIdentifier};
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[test]
fn test_round_trip_with_awkward_attributes() {
    let mut graph = kubegraph::ResourceGraph::new();

    let mut attrs = Map::new();
    attrs.insert("kind".to_string(), json!("Pod"));
    attrs.insert("name".to_string(), json!("wörker-pod-日本"));
    attrs.insert("namespace".to_string(), json!("default"));
    attrs.insert("node_name".to_string(), Value::Null);
    attrs.insert("labels".to_string(), json!({"app": "wörker"}));
    graph.add_node("Pod:default:wörker-pod-日本", attrs);

    let mut svc_attrs = Map::new();
    svc_attrs.insert("kind".to_string(), json!("Service"));
    svc_attrs.insert("name".to_string(), json!("svc"));
    graph.add_node("Service:default:svc", svc_attrs);

    graph.add_edge(
        "Service:default:svc",
        "Pod:default:wörker-pod-日本",
        kubegraph::RelationshipType::LabelSelector,
        "app=wörker",
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    persistence::save_graph(&graph, &path).unwrap();
    let loaded = persistence::load_graph(&path).unwrap();

    assert_eq!(loaded, graph);
    let pod = loaded.get_node("Pod:default:wörker-pod-日本").unwrap();
    assert_eq!(pod.attrs["node_name"], Value::Null);
    assert_eq!(pod.attrs["labels"], json!({"app": "wörker"}));
}

#[tokio::test]
async fn test_built_graph_round_trips() {
    let client = MockClient::new();
    client.add(sample_deployment());
    client.add(sample_replicaset());
    client.add(sample_pod());
    let mut builder = GraphBuilder::with_defaults(Arc::new(client));

    let resource_id =
        ResourceIdentifier::new("Deployment", "nginx-deployment", Some("default")).unwrap();
    let graph = builder
        .build_from_resource(&resource_id, 2, &BuildOptions::default())
        .await
        .unwrap();
    assert!(graph.node_count() > 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("built.json");
    persistence::save_graph(&graph, &path).unwrap();
    let loaded = persistence::load_graph(&path).unwrap();

    assert_eq!(loaded, graph);
}

#[test]
fn test_document_wire_shape() {
    let mut graph = kubegraph::ResourceGraph::new();
    let mut attrs = Map::new();
    attrs.insert("kind".to_string(), json!("Pod"));
    attrs.insert("name".to_string(), json!("p"));
    graph.add_node("Pod:default:p", attrs);
    graph.add_edge("Pod:default:p", "ConfigMap:default:c", kubegraph::RelationshipType::Volume, "v");

    let value = serde_json::to_value(persistence::to_document(&graph)).unwrap();
    assert_eq!(value["nodes"][0]["id"], "Pod:default:p");
    assert_eq!(value["nodes"][0]["kind"], "Pod");
    assert_eq!(value["edges"][0]["source"], "Pod:default:p");
    assert_eq!(value["edges"][0]["relationship_type"], "volume");
}

#[test]
fn test_dot_export_lists_every_node() {
    let mut graph = kubegraph::ResourceGraph::new();
    for id in ["a", "b", "c"] {
        let mut attrs = Map::new();
        attrs.insert("kind".to_string(), json!("Pod"));
        attrs.insert("name".to_string(), json!(id));
        graph.add_node(id, attrs);
    }
    graph.add_edge("a", "b", kubegraph::RelationshipType::Owned, "");

    let dot = persistence::to_dot(&graph);
    for id in ["a", "b", "c"] {
        assert!(dot.contains(&format!("\"{id}\"")), "missing node {id} in DOT");
    }
    assert!(dot.contains("\"a\" -> \"b\""));
}
