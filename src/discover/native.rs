//! Native resource relationship discovery
//!
//! Translates well-known fields of core Kubernetes resources into
//! relationships: owner references, Service label selectors, Pod
//! volume/env/service-account references, Ingress backends and PV/PVC
//! bindings. Applies to every kind (it is the kind-agnostic fallback).

use super::{Discoverer, DiscoveryError, label_selector_string, selector_pairs};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

/// Discoverer for native Kubernetes resource relationships
pub struct NativeResourceDiscoverer;

#[async_trait]
impl Discoverer for NativeResourceDiscoverer {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supports(&self, _resource: &Value) -> bool {
        true
    }

    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let Some(kind) = resource.get("kind").and_then(|k| k.as_str()) else {
            return Ok(relationships);
        };

        relationships.extend(discover_owner_references(resource));

        match kind {
            "Service" => relationships.extend(discover_service_selector(resource)),
            "Pod" => relationships.extend(discover_pod_references(resource)),
            "Ingress" => relationships.extend(discover_ingress_backends(resource)),
            "PersistentVolumeClaim" => relationships.extend(discover_pvc_bindings(resource)),
            "PersistentVolume" => relationships.extend(discover_pv_bindings(resource)),
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => {
                relationships.extend(discover_workload_references(resource));
                relationships.extend(discover_owned_children(resource, client).await);
            }
            _ => {}
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Native
    }
}

/// Owner references, emitted parent -> child so traversal from a controller
/// naturally reaches its replicas and pods.
fn discover_owner_references(resource: &Value) -> Vec<ResourceRelationship> {
    let mut relationships = Vec::new();

    let Ok(child) = ResourceIdentifier::from_resource(resource) else {
        return relationships;
    };
    let Some(owner_refs) = resource
        .get("metadata")
        .and_then(|m| m.get("ownerReferences"))
        .and_then(|o| o.as_array())
    else {
        return relationships;
    };

    for owner_ref in owner_refs {
        let Some(owner_kind) = owner_ref.get("kind").and_then(|k| k.as_str()) else {
            continue;
        };
        let Some(owner_name) = owner_ref.get("name").and_then(|n| n.as_str()) else {
            continue;
        };

        let Ok(mut owner) =
            ResourceIdentifier::new(owner_kind, owner_name, child.namespace.as_deref())
        else {
            continue;
        };
        if let Some(api_version) = owner_ref.get("apiVersion").and_then(|v| v.as_str()) {
            owner = owner.with_api_version(api_version);
        }

        relationships.push(ResourceRelationship::new(
            owner,
            child.clone(),
            RelationshipType::Owned,
            format!("{} owns {}", owner_kind, child.kind),
        ));
    }

    relationships
}

/// Service selectors become a lazy wildcard target (`Pod:*[app=nginx]`)
/// rather than being resolved to concrete pods here; the builder decides
/// whether and when to expand them.
fn discover_service_selector(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };

    let pairs = resource
        .get("spec")
        .and_then(|s| s.get("selector"))
        .map(selector_pairs)
        .unwrap_or_default();
    if pairs.is_empty() {
        return Vec::new();
    }

    let selector = label_selector_string(&pairs);
    let Ok(target) = ResourceIdentifier::new(
        "Pod",
        format!("*[{selector}]"),
        source.namespace.as_deref(),
    ) else {
        return Vec::new();
    };

    vec![ResourceRelationship::new(
        source,
        target,
        RelationshipType::LabelSelector,
        format!("Selects pods with labels: {selector}"),
    )]
}

fn discover_pod_references(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };
    let mut relationships = Vec::new();
    let spec = resource.get("spec");

    let service_account = spec
        .and_then(|s| s.get("serviceAccountName").or_else(|| s.get("serviceAccount")))
        .and_then(|sa| sa.as_str());
    if let Some(sa_name) = service_account {
        if let Ok(target) =
            ResourceIdentifier::new("ServiceAccount", sa_name, source.namespace.as_deref())
        {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::ServiceAccount,
                "Pod uses ServiceAccount",
            ));
        }
    }

    relationships.extend(discover_volumes(spec, &source));

    let containers = all_containers(spec);
    relationships.extend(discover_env_references(&containers, &source));

    relationships
}

/// Volume references to ConfigMaps, Secrets and PVCs.
///
/// Null volume lists occur in practice and must not fail.
fn discover_volumes(spec: Option<&Value>, source: &ResourceIdentifier) -> Vec<ResourceRelationship> {
    let mut relationships = Vec::new();
    let volumes = spec
        .and_then(|s| s.get("volumes"))
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or_default();

    for volume in volumes {
        let volume_name = volume.get("name").and_then(|n| n.as_str()).unwrap_or("");

        if let Some(cm_name) = volume
            .get("configMap")
            .and_then(|cm| cm.get("name"))
            .and_then(|n| n.as_str())
        {
            if let Ok(target) =
                ResourceIdentifier::new("ConfigMap", cm_name, source.namespace.as_deref())
            {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::Volume,
                    format!("Mounts ConfigMap as volume '{volume_name}'"),
                ));
            }
        }

        if let Some(secret_name) = volume
            .get("secret")
            .and_then(|s| s.get("secretName"))
            .and_then(|n| n.as_str())
        {
            if let Ok(target) =
                ResourceIdentifier::new("Secret", secret_name, source.namespace.as_deref())
            {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::Volume,
                    format!("Mounts Secret as volume '{volume_name}'"),
                ));
            }
        }

        if let Some(claim_name) = volume
            .get("persistentVolumeClaim")
            .and_then(|p| p.get("claimName"))
            .and_then(|n| n.as_str())
        {
            if let Ok(target) = ResourceIdentifier::new(
                "PersistentVolumeClaim",
                claim_name,
                source.namespace.as_deref(),
            ) {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::Pvc,
                    format!("Uses PVC '{claim_name}'"),
                ));
            }
        }
    }

    relationships
}

/// ConfigMap/Secret references from envFrom and env valueFrom
fn discover_env_references(
    containers: &[&Value],
    source: &ResourceIdentifier,
) -> Vec<ResourceRelationship> {
    let mut relationships = Vec::new();

    for container in containers {
        let container_name = container.get("name").and_then(|n| n.as_str()).unwrap_or("");

        let env_from = container
            .get("envFrom")
            .and_then(|e| e.as_array())
            .map(|e| e.as_slice())
            .unwrap_or_default();
        for env_source in env_from {
            if let Some(cm_name) = env_source
                .get("configMapRef")
                .and_then(|r| r.get("name"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) =
                    ResourceIdentifier::new("ConfigMap", cm_name, source.namespace.as_deref())
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::EnvFrom,
                        format!("Container '{container_name}' uses ConfigMap for env"),
                    ));
                }
            }
            if let Some(secret_name) = env_source
                .get("secretRef")
                .and_then(|r| r.get("name"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) =
                    ResourceIdentifier::new("Secret", secret_name, source.namespace.as_deref())
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::EnvFrom,
                        format!("Container '{container_name}' uses Secret for env"),
                    ));
                }
            }
        }

        let env = container
            .get("env")
            .and_then(|e| e.as_array())
            .map(|e| e.as_slice())
            .unwrap_or_default();
        for env_var in env {
            let value_from = env_var.get("valueFrom");
            if let Some(cm_name) = value_from
                .and_then(|v| v.get("configMapKeyRef"))
                .and_then(|r| r.get("name"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) =
                    ResourceIdentifier::new("ConfigMap", cm_name, source.namespace.as_deref())
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::EnvVar,
                        format!("Container '{container_name}' uses ConfigMap key for env var"),
                    ));
                }
            }
            if let Some(secret_name) = value_from
                .and_then(|v| v.get("secretKeyRef"))
                .and_then(|r| r.get("name"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) =
                    ResourceIdentifier::new("Secret", secret_name, source.namespace.as_deref())
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::EnvVar,
                        format!("Container '{container_name}' uses Secret key for env var"),
                    ));
                }
            }
        }
    }

    relationships
}

fn discover_ingress_backends(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };
    let mut relationships = Vec::new();
    let spec = resource.get("spec");

    if let Some(service_name) = spec
        .and_then(|s| s.get("defaultBackend"))
        .and_then(|b| b.get("service"))
        .and_then(|svc| svc.get("name"))
        .and_then(|n| n.as_str())
    {
        if let Ok(target) =
            ResourceIdentifier::new("Service", service_name, source.namespace.as_deref())
        {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::IngressBackend,
                "Default backend service",
            ));
        }
    }

    let rules = spec
        .and_then(|s| s.get("rules"))
        .and_then(|r| r.as_array())
        .map(|r| r.as_slice())
        .unwrap_or_default();
    for rule in rules {
        let paths = rule
            .get("http")
            .and_then(|h| h.get("paths"))
            .and_then(|p| p.as_array())
            .map(|p| p.as_slice())
            .unwrap_or_default();
        for path in paths {
            let Some(service_name) = path
                .get("backend")
                .and_then(|b| b.get("service"))
                .and_then(|svc| svc.get("name"))
                .and_then(|n| n.as_str())
            else {
                continue;
            };
            let Ok(target) =
                ResourceIdentifier::new("Service", service_name, source.namespace.as_deref())
            else {
                continue;
            };
            let path_value = path.get("path").and_then(|p| p.as_str()).unwrap_or("/");
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::IngressBackend,
                format!("Backend service for path '{path_value}'"),
            ));
        }
    }

    relationships
}

fn discover_pvc_bindings(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };
    let mut relationships = Vec::new();

    if let Some(storage_class) = resource
        .get("spec")
        .and_then(|s| s.get("storageClassName"))
        .and_then(|n| n.as_str())
    {
        if let Ok(target) = ResourceIdentifier::cluster_scoped("StorageClass", storage_class) {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::StorageClass,
                "Uses StorageClass",
            ));
        }
    }

    if let Some(volume_name) = resource
        .get("status")
        .and_then(|s| s.get("volumeName"))
        .and_then(|n| n.as_str())
    {
        if let Ok(target) = ResourceIdentifier::cluster_scoped("PersistentVolume", volume_name) {
            relationships.push(ResourceRelationship::new(
                source,
                target,
                RelationshipType::Pv,
                "Bound to PersistentVolume",
            ));
        }
    }

    relationships
}

fn discover_pv_bindings(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };
    let mut relationships = Vec::new();
    let spec = resource.get("spec");

    if let Some(claim_ref) = spec.and_then(|s| s.get("claimRef")) {
        let pvc_name = claim_ref.get("name").and_then(|n| n.as_str());
        let pvc_namespace = claim_ref.get("namespace").and_then(|n| n.as_str());
        if let Some(pvc_name) = pvc_name {
            if let Ok(target) =
                ResourceIdentifier::new("PersistentVolumeClaim", pvc_name, pvc_namespace)
            {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::Pvc,
                    "Bound to PVC",
                ));
            }
        }
    }

    if let Some(storage_class) = spec
        .and_then(|s| s.get("storageClassName"))
        .and_then(|n| n.as_str())
    {
        if let Ok(target) = ResourceIdentifier::cluster_scoped("StorageClass", storage_class) {
            relationships.push(ResourceRelationship::new(
                source,
                target,
                RelationshipType::StorageClass,
                "Uses StorageClass",
            ));
        }
    }

    relationships
}

/// Service account reference from a workload's pod template
fn discover_workload_references(resource: &Value) -> Vec<ResourceRelationship> {
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };

    let template_spec = resource
        .get("spec")
        .and_then(|s| s.get("template"))
        .and_then(|t| t.get("spec"));
    let service_account = template_spec
        .and_then(|s| s.get("serviceAccountName").or_else(|| s.get("serviceAccount")))
        .and_then(|sa| sa.as_str());

    let Some(sa_name) = service_account else {
        return Vec::new();
    };
    let Ok(target) =
        ResourceIdentifier::new("ServiceAccount", sa_name, source.namespace.as_deref())
    else {
        return Vec::new();
    };

    vec![ResourceRelationship::new(
        source.clone(),
        target,
        RelationshipType::ServiceAccount,
        format!("{} uses ServiceAccount", source.kind),
    )]
}

/// List + owner-reference matching to find the children a controller owns.
/// Requires the client; without one this contributes nothing.
async fn discover_owned_children(
    resource: &Value,
    client: Option<&dyn ResourceClient>,
) -> Vec<ResourceRelationship> {
    let Some(client) = client else {
        return Vec::new();
    };
    let Ok(source) = ResourceIdentifier::from_resource(resource) else {
        return Vec::new();
    };

    let owned_kind = match source.kind.as_str() {
        "Deployment" => "ReplicaSet",
        "StatefulSet" | "DaemonSet" | "ReplicaSet" => "Pod",
        _ => return Vec::new(),
    };

    let page = match client
        .list_resources(owned_kind, source.namespace.as_deref(), None)
        .await
    {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!(
                "Error discovering owned resources for {}/{}: {}",
                source.kind,
                source.name,
                e
            );
            return Vec::new();
        }
    };

    let mut relationships = Vec::new();
    for owned in &page.items {
        let owner_refs = owned
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(|o| o.as_array())
            .map(|o| o.as_slice())
            .unwrap_or_default();
        let is_ours = owner_refs.iter().any(|r| {
            r.get("name").and_then(|n| n.as_str()) == Some(source.name.as_str())
                && r.get("kind").and_then(|k| k.as_str()) == Some(source.kind.as_str())
        });
        if !is_ours {
            continue;
        }

        if let Ok(target) = ResourceIdentifier::from_resource(owned) {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::Owned,
                format!("{} owns {owned_kind}", source.kind),
            ));
        }
    }

    relationships
}

fn all_containers(spec: Option<&Value>) -> Vec<&Value> {
    let mut containers = Vec::new();
    for key in ["containers", "initContainers"] {
        if let Some(list) = spec.and_then(|s| s.get(key)).and_then(|c| c.as_array()) {
            containers.extend(list.iter());
        }
    }
    containers
}
