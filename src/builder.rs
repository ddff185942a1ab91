//! Graph builder
//!
//! Orchestrates the whole assembly: fetch resources, discover their
//! relationships, fold them into a graph, and expand bidirectionally from
//! every newly discovered endpoint. Expansion is an explicit work-list over
//! (resource, depth) pairs, bounded by depth, the node ceiling and a visited
//! set. The builder holds no cross-call state beyond its collaborators.

use crate::discover::{DiscovererRegistry, DiscoveryStats, UnifiedDiscoverer};
use crate::graph::ResourceGraph;
use crate::identity;
use crate::kube::ResourceClient;
use crate::models::{BuildOptions, DiscoveryOptions, ResourceIdentifier};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Namespaced kinds listed when building a whole-namespace graph
const NAMESPACE_KINDS: &[&str] = &[
    "Pod",
    "Service",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "Job",
    "CronJob",
    "ConfigMap",
    "Secret",
    "PersistentVolumeClaim",
    "ServiceAccount",
    "HorizontalPodAutoscaler",
    "PodDisruptionBudget",
    "ResourceQuota",
    "LimitRange",
    "Endpoints",
];

/// One sampled pod template
#[derive(Debug, Clone, Serialize)]
pub struct PodTemplateRecord {
    pub node_id: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
}

/// Pod sampling summary for one build call
#[derive(Debug, Clone, Serialize)]
pub struct PodSamplingInfo {
    /// Number of distinct pod templates admitted
    pub sampled_count: usize,
    /// Rough estimate of pods represented (sampled_count * 3); a placeholder
    /// multiplier, not a census
    pub total_count: usize,
    pub templates: Vec<PodTemplateRecord>,
}

/// Builds resource graphs from a cluster snapshot.
///
/// Fresh per-call state, bidirectional depth-bounded expansion, pod template
/// sampling, a hard node ceiling, and graceful handling of permission
/// failures. Partial graphs are an expected outcome, never an error.
pub struct GraphBuilder {
    client: Arc<dyn ResourceClient>,
    unified_discoverer: UnifiedDiscoverer,
    permission_errors: Vec<String>,
    pod_templates: HashMap<String, PodTemplateRecord>,
}

impl GraphBuilder {
    pub fn new(client: Arc<dyn ResourceClient>, registry: Arc<DiscovererRegistry>) -> Self {
        let unified_discoverer = UnifiedDiscoverer::new(client.clone(), registry);
        Self {
            client,
            unified_discoverer,
            permission_errors: Vec::new(),
            pod_templates: HashMap::new(),
        }
    }

    /// Construct a builder with its own registry of all built-in discoverers.
    pub fn with_defaults(client: Arc<dyn ResourceClient>) -> Self {
        Self::new(client, Arc::new(DiscovererRegistry::with_defaults()))
    }

    /// Build a graph starting from one resource, expanding bidirectionally
    /// for `depth` levels. A missing seed yields an empty graph.
    pub async fn build_from_resource(
        &mut self,
        resource_id: &ResourceIdentifier,
        depth: u32,
        options: &BuildOptions,
    ) -> Result<ResourceGraph> {
        options.validate().context("invalid build options")?;
        self.reset();

        let mut graph = ResourceGraph::new();
        let mut visited = HashSet::new();

        let resource = match self.client.get_resource(resource_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                tracing::warn!("Starting resource not found: {}", resource_id);
                return Ok(graph);
            }
            Err(e) => {
                self.record_fetch_error(resource_id, &e);
                return Ok(graph);
            }
        };

        self.expand(&mut graph, resource, depth, &mut visited, options)
            .await;

        tracing::info!(
            "Built graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Build a graph covering a whole namespace: list the well-known kinds
    /// (plus RBAC/network kinds when enabled) and expand from each resource.
    pub async fn build_namespace_graph(
        &mut self,
        namespace: &str,
        depth: u32,
        options: &BuildOptions,
    ) -> Result<ResourceGraph> {
        options.validate().context("invalid build options")?;
        self.reset();

        let mut graph = ResourceGraph::new();
        let mut visited = HashSet::new();

        let mut kinds: Vec<&str> = NAMESPACE_KINDS.to_vec();
        if options.include_rbac {
            kinds.extend(["Role", "RoleBinding"]);
        }
        if options.include_network {
            kinds.extend(["NetworkPolicy", "Ingress"]);
        }

        for kind in kinds {
            if graph.node_count() >= options.max_nodes {
                tracing::warn!("Reached max_nodes limit of {}", options.max_nodes);
                break;
            }

            let page = match self.client.list_resources(kind, Some(namespace), None).await {
                Ok(page) => page,
                Err(e) => {
                    if e.is_permission_denied() {
                        self.permission_errors.push(format!("list {kind}: {e}"));
                    }
                    tracing::warn!("Failed to list {kind} in {namespace}: {e}");
                    continue;
                }
            };

            for resource in page.items {
                if graph.node_count() >= options.max_nodes {
                    break;
                }
                self.expand(&mut graph, resource, depth, &mut visited, options)
                    .await;
            }
        }

        tracing::info!(
            "Built namespace graph for '{}' with {} nodes and {} edges",
            namespace,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Work-list expansion from one seed resource.
    ///
    /// Each entry is a fetched resource body plus its remaining depth. A node
    /// is discovered at most once (the visited set); re-encountering it from
    /// another direction still records the edge but does not re-expand.
    async fn expand(
        &mut self,
        graph: &mut ResourceGraph,
        seed: Value,
        depth: u32,
        visited: &mut HashSet<String>,
        options: &BuildOptions,
    ) {
        let discovery_options = DiscoveryOptions::from(options);
        let mut work: Vec<(Value, u32)> = vec![(seed, depth)];

        while let Some((resource, depth_remaining)) = work.pop() {
            let node_id = match identity::get_node_id(&resource) {
                Ok(node_id) => node_id,
                Err(e) => {
                    tracing::warn!("Skipping resource without identity: {}", e);
                    continue;
                }
            };

            // Ceiling check before insertion; existing nodes may still expand
            if !graph.has_node(&node_id) && graph.node_count() >= options.max_nodes {
                tracing::debug!("Reached max_nodes limit of {}", options.max_nodes);
                continue;
            }

            if self.should_sample_pod(&resource, &node_id) {
                continue;
            }

            // Full attributes replace any placeholder left by an earlier edge
            let attrs = identity::extract_node_attributes(&resource);
            tracing::debug!(
                "Added node: {}/{} (namespace: {})",
                attrs.get("kind").and_then(|v| v.as_str()).unwrap_or("?"),
                attrs.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
                attrs.get("namespace").and_then(|v| v.as_str()).unwrap_or("-"),
            );
            graph.add_node(node_id.clone(), attrs);

            let already_visited = !visited.insert(node_id.clone());
            if depth_remaining == 0 || already_visited {
                continue;
            }

            let relationships = self
                .unified_discoverer
                .discover_all_relationships(&resource, &discovery_options)
                .await;

            for rel in relationships {
                let (source_id, source_body) = self.resolve_endpoint(&rel.source, &node_id).await;
                let (target_id, target_body) = self.resolve_endpoint(&rel.target, &node_id).await;

                self.ensure_placeholder(graph, &target_id, &rel.target, options);
                if source_id != node_id {
                    self.ensure_placeholder(graph, &source_id, &rel.source, options);
                }

                // The ceiling may have kept an endpoint out; no dangling edges
                if graph.has_node(&source_id) && graph.has_node(&target_id) {
                    graph.add_edge(
                        source_id.clone(),
                        target_id.clone(),
                        rel.relationship_type,
                        rel.details.clone(),
                    );
                    tracing::debug!(
                        "Added edge: {} --[{}]--> {}",
                        source_id,
                        rel.relationship_type,
                        target_id
                    );
                }

                // Both endpoints join the frontier: expanding the target
                // follows what this resource uses, expanding the source
                // surfaces what refers back to it.
                if let Some(target) = target_body {
                    if !visited.contains(&target_id) && graph.node_count() < options.max_nodes {
                        work.push((target, depth_remaining - 1));
                    }
                }
                if let Some(source) = source_body {
                    if source_id != node_id
                        && !visited.contains(&source_id)
                        && graph.node_count() < options.max_nodes
                    {
                        work.push((source, depth_remaining - 1));
                    }
                }
            }
        }
    }

    /// Resolve a relationship endpoint to its node id, fetching the full body
    /// where possible so replica pods key on their collapsed identity.
    ///
    /// Wildcard selector targets stay lazy: they are never fetched or
    /// resolved to concrete pods here.
    async fn resolve_endpoint(
        &mut self,
        identifier: &ResourceIdentifier,
        current_node_id: &str,
    ) -> (String, Option<Value>) {
        let identifier_id = node_id_from_identifier(identifier);
        if identifier_id == current_node_id || identifier.name.starts_with("*[") {
            return (identifier_id, None);
        }

        match self.client.get_resource(identifier).await {
            Ok(Some(body)) => match identity::get_node_id(&body) {
                Ok(node_id) => (node_id, Some(body)),
                Err(_) => (identifier_id, None),
            },
            Ok(None) => (identifier_id, None),
            Err(e) => {
                self.record_fetch_error(identifier, &e);
                (identifier_id, None)
            }
        }
    }

    /// Insert a minimal kind/name/namespace node for an endpoint whose full
    /// body is not available, subject to the ceiling.
    fn ensure_placeholder(
        &self,
        graph: &mut ResourceGraph,
        node_id: &str,
        identifier: &ResourceIdentifier,
        options: &BuildOptions,
    ) {
        if graph.has_node(node_id) || graph.node_count() >= options.max_nodes {
            return;
        }

        let mut attrs = Map::new();
        attrs.insert("kind".to_string(), Value::String(identifier.kind.clone()));
        attrs.insert("name".to_string(), Value::String(identifier.name.clone()));
        attrs.insert(
            "namespace".to_string(),
            identifier
                .namespace
                .as_ref()
                .map(|ns| Value::String(ns.clone()))
                .unwrap_or(Value::Null),
        );
        graph.add_node(node_id.to_string(), attrs);
    }

    fn record_fetch_error(
        &mut self,
        identifier: &ResourceIdentifier,
        error: &crate::kube::FetchError,
    ) {
        if error.is_permission_denied() {
            self.permission_errors.push(format!("{identifier}: {error}"));
        }
        tracing::warn!("Failed to fetch {}: {}", identifier, error);
    }

    /// Whether this pod should be skipped because its template already has a
    /// representative node in the graph.
    fn should_sample_pod(&mut self, resource: &Value, node_id: &str) -> bool {
        if resource.get("kind").and_then(|k| k.as_str()) != Some("Pod") {
            return false;
        }
        let Some(template_id) = identity::get_pod_template_id(resource) else {
            return false;
        };

        if self.pod_templates.contains_key(&template_id) {
            tracing::debug!(
                "Sampling pod {} (template: {})",
                resource
                    .get("metadata")
                    .and_then(|m| m.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("unknown"),
                template_id
            );
            return true;
        }

        let metadata = resource.get("metadata");
        self.pod_templates.insert(
            template_id,
            PodTemplateRecord {
                node_id: node_id.to_string(),
                name: metadata
                    .and_then(|m| m.get("name"))
                    .and_then(|n| n.as_str())
                    .map(|n| n.to_string()),
                namespace: metadata
                    .and_then(|m| m.get("namespace"))
                    .and_then(|n| n.as_str())
                    .map(|n| n.to_string()),
            },
        );
        false
    }

    fn reset(&mut self) {
        self.permission_errors.clear();
        self.pod_templates.clear();
        self.unified_discoverer.reset_stats();
    }

    /// Resources that could not be accessed due to permissions during the
    /// last build call.
    pub fn get_permission_errors(&self) -> Vec<String> {
        self.permission_errors.clone()
    }

    /// Aggregate discovery counters for the last build call.
    pub fn get_discovery_stats(&self) -> DiscoveryStats {
        self.unified_discoverer.stats()
    }

    /// Pod template sampling summary for the last build call.
    pub fn get_pod_sampling_info(&self) -> PodSamplingInfo {
        let templates: Vec<PodTemplateRecord> = self.pod_templates.values().cloned().collect();
        PodSamplingInfo {
            sampled_count: templates.len(),
            total_count: templates.len() * 3,
            templates,
        }
    }
}

/// Node id for a relationship endpoint that may not have been fetched.
///
/// Wildcard selector names pass through as-is; they key their own node.
fn node_id_from_identifier(identifier: &ResourceIdentifier) -> String {
    let namespace = identifier.namespace.as_deref().unwrap_or("cluster");
    format!("{}:{}:{}", identifier.kind, namespace, identifier.name)
}
