//! Stable node identity derivation
//!
//! Maps a resource body to the string identity that graph nodes key on.
//! Replica pods sharing a controller and pod-template hash collapse to one
//! identity, so rebuilt graphs stay stable while individual pod names churn.

use serde_json::{Map, Value};

/// A resource lacks the fields required to compute a node identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("resource has no kind")]
    MissingKind,

    #[error("{0} resource has no metadata.name")]
    MissingName(String),
}

const TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

/// Derive the graph node id for a resource.
///
/// Namespaced resources map to `Kind:namespace:name`, cluster-scoped ones to
/// `Kind:cluster:name`. Pods owned by a controller and carrying a
/// `pod-template-hash` label use `Pod:ns:OwnerKind-OwnerName:hash` instead,
/// so all replicas of one template share a single node. ReplicaSets get the
/// analogous `ReplicaSet:ns:OwnerName:hash` treatment: their generated names
/// embed the template hash and would otherwise churn on every rollout.
pub fn get_node_id(resource: &Value) -> Result<String, IdentityError> {
    let kind = resource
        .get("kind")
        .and_then(|k| k.as_str())
        .ok_or(IdentityError::MissingKind)?;

    let metadata = resource.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| IdentityError::MissingName(kind.to_string()))?;
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str())
        .unwrap_or("cluster");

    if kind == "Pod" {
        if let (Some((owner_kind, owner_name)), Some(hash)) =
            (first_owner(resource), template_hash(resource))
        {
            return Ok(format!(
                "Pod:{namespace}:{owner_kind}-{owner_name}:{hash}"
            ));
        }
    } else if kind == "ReplicaSet" {
        if let (Some((_, owner_name)), Some(hash)) = (first_owner(resource), template_hash(resource))
        {
            return Ok(format!("ReplicaSet:{namespace}:{owner_name}:{hash}"));
        }
    }

    Ok(format!("{kind}:{namespace}:{name}"))
}

/// Compute the template identity for a pod, used by the builder for sampling.
///
/// Returns `namespace:OwnerKind:OwnerName:hash` when the pod has both an
/// owning controller reference and a template-hash label, `None` otherwise
/// (including for non-pod resources).
pub fn get_pod_template_id(resource: &Value) -> Option<String> {
    if resource.get("kind").and_then(|k| k.as_str()) != Some("Pod") {
        return None;
    }

    let (owner_kind, owner_name) = first_owner(resource)?;
    let hash = template_hash(resource)?;
    let namespace = resource
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str())
        .unwrap_or("cluster");

    Some(format!("{namespace}:{owner_kind}:{owner_name}:{hash}"))
}

/// Flatten a resource into the attribute bag attached to its graph node.
///
/// Always includes kind/name/namespace/labels/annotations; adds kind-specific
/// status fields where they exist. Tolerates missing or null nested fields.
pub fn extract_node_attributes(resource: &Value) -> Map<String, Value> {
    let mut attrs = Map::new();
    let metadata = resource.get("metadata");

    attrs.insert(
        "kind".to_string(),
        resource.get("kind").cloned().unwrap_or(Value::Null),
    );
    attrs.insert(
        "name".to_string(),
        metadata
            .and_then(|m| m.get("name"))
            .cloned()
            .unwrap_or(Value::Null),
    );
    attrs.insert(
        "namespace".to_string(),
        metadata
            .and_then(|m| m.get("namespace"))
            .cloned()
            .unwrap_or(Value::Null),
    );
    attrs.insert(
        "labels".to_string(),
        metadata
            .and_then(|m| m.get("labels"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    attrs.insert(
        "annotations".to_string(),
        metadata
            .and_then(|m| m.get("annotations"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );

    let status = resource.get("status");
    match resource.get("kind").and_then(|k| k.as_str()) {
        Some("Pod") => {
            if let Some(phase) = status.and_then(|s| s.get("phase")) {
                attrs.insert("phase".to_string(), phase.clone());
            }
            if let Some(pod_ip) = status.and_then(|s| s.get("podIP")) {
                attrs.insert("pod_ip".to_string(), pod_ip.clone());
            }
        }
        Some("Deployment") | Some("StatefulSet") | Some("ReplicaSet") => {
            if let Some(replicas) = status.and_then(|s| s.get("replicas")) {
                attrs.insert("replicas".to_string(), replicas.clone());
            }
            if let Some(ready) = status.and_then(|s| s.get("readyReplicas")) {
                attrs.insert("ready_replicas".to_string(), ready.clone());
            }
        }
        Some("DaemonSet") => {
            if let Some(desired) = status.and_then(|s| s.get("desiredNumberScheduled")) {
                attrs.insert("desired_scheduled".to_string(), desired.clone());
            }
            if let Some(ready) = status.and_then(|s| s.get("numberReady")) {
                attrs.insert("ready".to_string(), ready.clone());
            }
        }
        Some("Service") => {
            let spec = resource.get("spec");
            if let Some(svc_type) = spec.and_then(|s| s.get("type")) {
                attrs.insert("service_type".to_string(), svc_type.clone());
            }
            if let Some(cluster_ip) = spec.and_then(|s| s.get("clusterIP")) {
                attrs.insert("cluster_ip".to_string(), cluster_ip.clone());
            }
        }
        _ => {}
    }

    attrs
}

fn first_owner(resource: &Value) -> Option<(&str, &str)> {
    let owner = resource
        .get("metadata")?
        .get("ownerReferences")?
        .as_array()?
        .first()?;
    Some((
        owner.get("kind")?.as_str()?,
        owner.get("name")?.as_str()?,
    ))
}

fn template_hash(resource: &Value) -> Option<&str> {
    resource
        .get("metadata")?
        .get("labels")?
        .get(TEMPLATE_HASH_LABEL)?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_pod() -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "nginx-deployment-abc123-xyz",
                "namespace": "default",
                "labels": {"app": "nginx", "pod-template-hash": "abc123"},
                "ownerReferences": [
                    {"kind": "ReplicaSet", "name": "nginx-deployment-abc123"}
                ],
            },
            "status": {"phase": "Running", "podIP": "10.0.0.1"},
        })
    }

    #[test]
    fn test_standard_resource_node_id() {
        let deployment = json!({
            "kind": "Deployment",
            "metadata": {"name": "nginx-deployment", "namespace": "default"},
        });
        assert_eq!(
            get_node_id(&deployment).unwrap(),
            "Deployment:default:nginx-deployment"
        );
    }

    #[test]
    fn test_pod_with_template_hash_collapses() {
        assert_eq!(
            get_node_id(&sample_pod()).unwrap(),
            "Pod:default:ReplicaSet-nginx-deployment-abc123:abc123"
        );

        // A sibling replica with a different generated name maps to the same id
        let mut sibling = sample_pod();
        sibling["metadata"]["name"] = json!("nginx-deployment-abc123-qrs");
        assert_eq!(
            get_node_id(&sibling).unwrap(),
            get_node_id(&sample_pod()).unwrap()
        );
    }

    #[test]
    fn test_pod_without_template_hash_keeps_name() {
        let pod = json!({
            "kind": "Pod",
            "metadata": {"name": "standalone", "namespace": "default"},
        });
        assert_eq!(get_node_id(&pod).unwrap(), "Pod:default:standalone");
    }

    #[test]
    fn test_replicaset_with_template_hash() {
        let rs = json!({
            "kind": "ReplicaSet",
            "metadata": {
                "name": "nginx-deployment-abc123",
                "namespace": "default",
                "labels": {"pod-template-hash": "abc123"},
                "ownerReferences": [{"kind": "Deployment", "name": "nginx-deployment"}],
            },
        });
        assert_eq!(
            get_node_id(&rs).unwrap(),
            "ReplicaSet:default:nginx-deployment:abc123"
        );
    }

    #[test]
    fn test_cluster_scoped_node_id() {
        let node = json!({"kind": "Node", "metadata": {"name": "node-1"}});
        assert_eq!(get_node_id(&node).unwrap(), "Node:cluster:node-1");
    }

    #[test]
    fn test_missing_name_is_error() {
        let broken = json!({"kind": "Pod", "metadata": {"namespace": "default"}});
        assert!(matches!(
            get_node_id(&broken),
            Err(IdentityError::MissingName(_))
        ));
    }

    #[test]
    fn test_pod_template_id() {
        assert_eq!(
            get_pod_template_id(&sample_pod()).as_deref(),
            Some("default:ReplicaSet:nginx-deployment-abc123:abc123")
        );
    }

    #[test]
    fn test_pod_template_id_non_pod() {
        let deployment = json!({
            "kind": "Deployment",
            "metadata": {"name": "nginx", "namespace": "default"},
        });
        assert_eq!(get_pod_template_id(&deployment), None);
    }

    #[test]
    fn test_extract_node_attributes() {
        let attrs = extract_node_attributes(&sample_pod());

        assert_eq!(attrs["kind"], json!("Pod"));
        assert_eq!(attrs["name"], json!("nginx-deployment-abc123-xyz"));
        assert_eq!(attrs["namespace"], json!("default"));
        assert_eq!(attrs["phase"], json!("Running"));
        assert_eq!(attrs["pod_ip"], json!("10.0.0.1"));
        assert!(attrs.contains_key("labels"));
    }

    #[test]
    fn test_extract_node_attributes_tolerates_missing_fields() {
        let bare = json!({"kind": "ConfigMap"});
        let attrs = extract_node_attributes(&bare);

        assert_eq!(attrs["kind"], json!("ConfigMap"));
        assert_eq!(attrs["name"], Value::Null);
        assert_eq!(attrs["labels"], json!({}));
    }
}
