//! Core value types for resource identity and discovered relationships
//!
//! These types are shared by every discoverer and by the graph builder:
//! identifiers address resources for fetching, relationships are directed
//! edge proposals between two identifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Validation errors for value type construction
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("kind must not be empty")]
    EmptyKind,

    #[error("kind must start with an uppercase letter: {0}")]
    LowercaseKind(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("max_nodes must be between 1 and 10000, got {0}")]
    MaxNodesOutOfRange(usize),

    #[error("resource is missing field: {0}")]
    MissingField(&'static str),
}

/// Identifies a single Kubernetes resource (or a wildcard selector over resources).
///
/// `namespace: None` denotes a cluster-scoped resource. The name may be a
/// synthetic wildcard selector string such as `*[app=nginx]`, standing for
/// "all pods matching this label selector" rather than one concrete object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl ResourceIdentifier {
    /// Create a namespaced (or cluster-scoped, when `namespace` is None) identifier.
    ///
    /// Kind naming follows the API convention: non-empty, uppercase first letter.
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let kind = kind.into();
        let name = name.into();

        if kind.is_empty() {
            return Err(ValidationError::EmptyKind);
        }
        if !kind.chars().next().is_some_and(|c| c.is_uppercase()) {
            return Err(ValidationError::LowercaseKind(kind));
        }
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Ok(Self {
            kind,
            name,
            namespace: namespace.map(|s| s.to_string()),
            api_version: None,
        })
    }

    /// Create a cluster-scoped identifier.
    pub fn cluster_scoped(
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(kind, name, None)
    }

    /// Attach an apiVersion to disambiguate same-kind-different-group cases.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Extract an identifier from a resource body (kind + metadata.name/namespace).
    pub fn from_resource(resource: &Value) -> Result<Self, ValidationError> {
        let kind = resource
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(ValidationError::MissingField("kind"))?;
        let metadata = resource.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .ok_or(ValidationError::MissingField("metadata.name"))?;
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(|n| n.as_str());

        let mut id = Self::new(kind, name, namespace)?;
        if let Some(api_version) = resource.get("apiVersion").and_then(|v| v.as_str()) {
            id = id.with_api_version(api_version);
        }
        Ok(id)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} (ns: {})", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Typed kind of a discovered relationship.
///
/// Direction is carried by the relationship's source/target: the source
/// owns/uses/manages the target (parent owns child, consumer uses config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Owner,
    Owned,
    LabelSelector,
    Volume,
    EnvFrom,
    EnvVar,
    ServiceAccount,
    IngressBackend,
    Pvc,
    Pv,
    StorageClass,
    NetworkPolicy,
    NetworkPolicyIngress,
    NetworkPolicyEgress,
    RbacBinding,
    RbacSubject,
    HelmManaged,
    ArgocdManaged,
    ArgoWorkflowSpawned,
    AirflowTask,
    FluxManaged,
    KnativeServes,
    IstioRoute,
    CertIssued,
    TektonRun,
    PrometheusMonitor,
    KedaScale,
    VeleroBackup,
    SparkDriver,
    SparkExecutor,
    CrossplaneProvision,
    TemporalWorker,
    TemporalSchedule,
    TemporalWorkflow,
    Managed,
}

impl RelationshipType {
    /// The wire/persistence string for this relationship type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Owned => "owned",
            Self::LabelSelector => "label_selector",
            Self::Volume => "volume",
            Self::EnvFrom => "env_from",
            Self::EnvVar => "env_var",
            Self::ServiceAccount => "service_account",
            Self::IngressBackend => "ingress_backend",
            Self::Pvc => "pvc",
            Self::Pv => "pv",
            Self::StorageClass => "storage_class",
            Self::NetworkPolicy => "network_policy",
            Self::NetworkPolicyIngress => "network_policy_ingress",
            Self::NetworkPolicyEgress => "network_policy_egress",
            Self::RbacBinding => "rbac_binding",
            Self::RbacSubject => "rbac_subject",
            Self::HelmManaged => "helm_managed",
            Self::ArgocdManaged => "argocd_managed",
            Self::ArgoWorkflowSpawned => "argo_workflow_spawned",
            Self::AirflowTask => "airflow_task",
            Self::FluxManaged => "flux_managed",
            Self::KnativeServes => "knative_serves",
            Self::IstioRoute => "istio_route",
            Self::CertIssued => "cert_issued",
            Self::TektonRun => "tekton_run",
            Self::PrometheusMonitor => "prometheus_monitor",
            Self::KedaScale => "keda_scale",
            Self::VeleroBackup => "velero_backup",
            Self::SparkDriver => "spark_driver",
            Self::SparkExecutor => "spark_executor",
            Self::CrossplaneProvision => "crossplane_provision",
            Self::TemporalWorker => "temporal_worker",
            Self::TemporalSchedule => "temporal_schedule",
            Self::TemporalWorkflow => "temporal_workflow",
            Self::Managed => "managed",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge proposal between two resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelationship {
    pub source: ResourceIdentifier,
    pub target: ResourceIdentifier,
    pub relationship_type: RelationshipType,
    /// Human-readable context, never used for logic.
    pub details: String,
}

impl ResourceRelationship {
    pub fn new(
        source: ResourceIdentifier,
        target: ResourceIdentifier,
        relationship_type: RelationshipType,
        details: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            relationship_type,
            details: details.into(),
        }
    }
}

/// Capability category of a discoverer, gated by [`DiscoveryOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscovererCategory {
    Native,
    Rbac,
    Network,
    Crd,
}

/// Configuration for a graph build call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    pub include_rbac: bool,
    pub include_network: bool,
    pub include_crds: bool,
    /// Hard ceiling on graph size; expansion checks it before each insertion.
    pub max_nodes: usize,
    pub cluster_id: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_rbac: true,
            include_network: true,
            include_crds: true,
            max_nodes: 500,
            cluster_id: None,
        }
    }
}

impl BuildOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nodes == 0 || self.max_nodes > 10_000 {
            return Err(ValidationError::MaxNodesOutOfRange(self.max_nodes));
        }
        Ok(())
    }
}

/// Category toggles threaded into the unified discoverer per expansion step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub include_rbac: bool,
    pub include_network: bool,
    pub include_crds: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            include_rbac: true,
            include_network: true,
            include_crds: true,
        }
    }
}

impl From<&BuildOptions> for DiscoveryOptions {
    fn from(options: &BuildOptions) -> Self {
        Self {
            include_rbac: options.include_rbac,
            include_network: options.include_network,
            include_crds: options.include_crds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_creation() {
        let rid = ResourceIdentifier::new("Pod", "nginx", Some("default")).unwrap();
        assert_eq!(rid.kind, "Pod");
        assert_eq!(rid.name, "nginx");
        assert_eq!(rid.namespace.as_deref(), Some("default"));
        assert!(rid.api_version.is_none());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(matches!(
            ResourceIdentifier::new("", "nginx", None),
            Err(ValidationError::EmptyKind)
        ));
        assert!(matches!(
            ResourceIdentifier::new("pod", "nginx", None),
            Err(ValidationError::LowercaseKind(_))
        ));
        assert!(matches!(
            ResourceIdentifier::new("Pod", "", None),
            Err(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn test_identifier_display() {
        let rid = ResourceIdentifier::new("Pod", "nginx", Some("default")).unwrap();
        assert_eq!(rid.to_string(), "Pod/nginx (ns: default)");

        let cluster = ResourceIdentifier::cluster_scoped("Node", "node-1").unwrap();
        assert_eq!(cluster.to_string(), "Node/node-1");
    }

    #[test]
    fn test_identifier_from_resource() {
        let resource = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "prod"},
        });
        let rid = ResourceIdentifier::from_resource(&resource).unwrap();
        assert_eq!(rid.kind, "Deployment");
        assert_eq!(rid.name, "web");
        assert_eq!(rid.namespace.as_deref(), Some("prod"));
        assert_eq!(rid.api_version.as_deref(), Some("apps/v1"));
    }

    #[test]
    fn test_identifier_from_resource_missing_name() {
        let resource = json!({"kind": "Pod", "metadata": {}});
        assert!(ResourceIdentifier::from_resource(&resource).is_err());
    }

    #[test]
    fn test_wildcard_name_is_valid() {
        let rid = ResourceIdentifier::new("Pod", "*[app=nginx]", Some("default")).unwrap();
        assert_eq!(rid.name, "*[app=nginx]");
    }

    #[test]
    fn test_relationship_type_wire_values() {
        assert_eq!(RelationshipType::Owner.as_str(), "owner");
        assert_eq!(RelationshipType::Owned.as_str(), "owned");
        assert_eq!(RelationshipType::LabelSelector.as_str(), "label_selector");

        let serialized = serde_json::to_string(&RelationshipType::HelmManaged).unwrap();
        assert_eq!(serialized, "\"helm_managed\"");
        let parsed: RelationshipType = serde_json::from_str("\"keda_scale\"").unwrap();
        assert_eq!(parsed, RelationshipType::KedaScale);
    }

    #[test]
    fn test_relationship_creation() {
        let source = ResourceIdentifier::new("Service", "web", Some("default")).unwrap();
        let target = ResourceIdentifier::new("Pod", "web-pod", Some("default")).unwrap();

        let rel = ResourceRelationship::new(
            source.clone(),
            target.clone(),
            RelationshipType::LabelSelector,
            "Selects pods with app=web",
        );

        assert_eq!(rel.source, source);
        assert_eq!(rel.target, target);
        assert_eq!(rel.relationship_type, RelationshipType::LabelSelector);
        assert_eq!(rel.details, "Selects pods with app=web");
    }

    #[test]
    fn test_build_options_defaults() {
        let options = BuildOptions::default();
        assert!(options.include_rbac);
        assert!(options.include_network);
        assert!(options.include_crds);
        assert_eq!(options.max_nodes, 500);
        assert!(options.cluster_id.is_none());
    }

    #[test]
    fn test_build_options_validation() {
        let mut options = BuildOptions::default();
        options.max_nodes = 0;
        assert!(options.validate().is_err());

        options.max_nodes = 20_000;
        assert!(options.validate().is_err());

        options.max_nodes = 100;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_discovery_options_from_build_options() {
        let mut build = BuildOptions::default();
        build.include_rbac = false;

        let discovery = DiscoveryOptions::from(&build);
        assert!(!discovery.include_rbac);
        assert!(discovery.include_network);
        assert!(discovery.include_crds);
    }
}
