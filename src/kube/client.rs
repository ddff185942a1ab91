//! Kubernetes API adapter
//!
//! Implements [`ResourceClient`] on top of kube-rs dynamic objects, resolving
//! kinds to API groups via a native-kind table, the CRD registry, and a
//! guessed-plural fallback for unknown kinds.

use super::crd_registry::CrdRegistry;
use super::{FetchError, ListPage, ResourceClient};
use crate::models::ResourceIdentifier;
use async_trait::async_trait;
use kube::Api;
use kube::api::ListParams;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::Value;
use std::sync::Arc;

/// Native kinds and their API addressing: (kind, group, version, plural)
const NATIVE_KINDS: &[(&str, &str, &str, &str)] = &[
    ("Pod", "", "v1", "pods"),
    ("Service", "", "v1", "services"),
    ("ConfigMap", "", "v1", "configmaps"),
    ("Secret", "", "v1", "secrets"),
    ("ServiceAccount", "", "v1", "serviceaccounts"),
    ("PersistentVolumeClaim", "", "v1", "persistentvolumeclaims"),
    ("PersistentVolume", "", "v1", "persistentvolumes"),
    ("Namespace", "", "v1", "namespaces"),
    ("Node", "", "v1", "nodes"),
    ("Endpoints", "", "v1", "endpoints"),
    ("ResourceQuota", "", "v1", "resourcequotas"),
    ("LimitRange", "", "v1", "limitranges"),
    ("Deployment", "apps", "v1", "deployments"),
    ("StatefulSet", "apps", "v1", "statefulsets"),
    ("DaemonSet", "apps", "v1", "daemonsets"),
    ("ReplicaSet", "apps", "v1", "replicasets"),
    ("Job", "batch", "v1", "jobs"),
    ("CronJob", "batch", "v1", "cronjobs"),
    ("HorizontalPodAutoscaler", "autoscaling", "v2", "horizontalpodautoscalers"),
    ("PodDisruptionBudget", "policy", "v1", "poddisruptionbudgets"),
    ("Role", "rbac.authorization.k8s.io", "v1", "roles"),
    ("RoleBinding", "rbac.authorization.k8s.io", "v1", "rolebindings"),
    ("ClusterRole", "rbac.authorization.k8s.io", "v1", "clusterroles"),
    ("ClusterRoleBinding", "rbac.authorization.k8s.io", "v1", "clusterrolebindings"),
    ("NetworkPolicy", "networking.k8s.io", "v1", "networkpolicies"),
    ("Ingress", "networking.k8s.io", "v1", "ingresses"),
    ("IngressClass", "networking.k8s.io", "v1", "ingressclasses"),
    ("StorageClass", "storage.k8s.io", "v1", "storageclasses"),
];

/// Kinds that are never namespace-scoped
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "PersistentVolume",
    "Namespace",
    "Node",
    "StorageClass",
    "IngressClass",
    "ClusterRole",
    "ClusterRoleBinding",
    "ClusterIssuer",
];

/// [`ResourceClient`] backed by a live cluster connection
#[derive(Clone)]
pub struct KubernetesClient {
    client: kube::Client,
    crd_registry: Arc<CrdRegistry>,
}

impl KubernetesClient {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            crd_registry: CrdRegistry::get_global(),
        }
    }

    pub fn with_crd_registry(client: kube::Client, crd_registry: Arc<CrdRegistry>) -> Self {
        Self {
            client,
            crd_registry,
        }
    }

    /// Connect using the ambient kubeconfig/in-cluster configuration.
    pub async fn try_default() -> anyhow::Result<Self> {
        let client = kube::Client::try_default().await?;
        Ok(Self::new(client))
    }

    /// Resolve the ApiResource for a kind.
    ///
    /// Resolution order: explicit apiVersion on the identifier, the native
    /// kind table, the CRD registry, then a lowercased-plural guess so that
    /// unknown-but-real kinds still produce a well-formed request.
    fn api_resource_for(&self, kind: &str, api_version: Option<&str>) -> ApiResource {
        if let Some(api_version) = api_version {
            let (group, version) = match api_version.split_once('/') {
                Some((group, version)) => (group, version),
                None => ("", api_version),
            };
            let gvk = GroupVersionKind::gvk(group, version, kind);
            return ApiResource::from_gvk_with_plural(&gvk, &guess_plural(kind));
        }

        if let Some((_, group, version, plural)) =
            NATIVE_KINDS.iter().find(|(k, _, _, _)| *k == kind)
        {
            let gvk = GroupVersionKind::gvk(group, version, kind);
            return ApiResource::from_gvk_with_plural(&gvk, plural);
        }

        if let Some(info) = self.crd_registry.get_crd_info(kind) {
            let gvk = GroupVersionKind::gvk(&info.group, &info.version, kind);
            return ApiResource::from_gvk_with_plural(&gvk, &info.plural);
        }

        tracing::debug!("Unknown kind {}, guessing plural form", kind);
        let gvk = GroupVersionKind::gvk("", "v1", kind);
        ApiResource::from_gvk_with_plural(&gvk, &guess_plural(kind))
    }

    fn api_for(
        &self,
        kind: &str,
        namespace: Option<&str>,
        api_version: Option<&str>,
    ) -> Api<DynamicObject> {
        let resource = self.api_resource_for(kind, api_version);
        match namespace {
            Some(ns) if !CLUSTER_SCOPED_KINDS.contains(&kind) => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[async_trait]
impl ResourceClient for KubernetesClient {
    async fn get_resource(&self, id: &ResourceIdentifier) -> Result<Option<Value>, FetchError> {
        // Wildcard selector identifiers stand for a set of resources, not one
        // object: there is nothing to GET.
        if id.name.starts_with("*[") {
            return Ok(None);
        }

        let api = self.api_for(&id.kind, id.namespace.as_deref(), id.api_version.as_deref());

        match api.get_opt(&id.name).await {
            Ok(Some(obj)) => {
                let mut value = serde_json::to_value(&obj)?;
                ensure_type_meta(&mut value, &id.kind);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(classify(e, &format!("{id}"))),
        }
    }

    async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<ListPage, FetchError> {
        let api = self.api_for(kind, namespace, None);

        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        match api.list(&params).await {
            Ok(list) => {
                let resource_version = list.metadata.resource_version.clone();
                let mut items = Vec::with_capacity(list.items.len());
                for obj in &list.items {
                    let mut value = serde_json::to_value(obj)?;
                    ensure_type_meta(&mut value, kind);
                    items.push(value);
                }
                Ok(ListPage {
                    items,
                    resource_version,
                })
            }
            // A kind that isn't installed in the cluster lists as 404; treat
            // it as an empty result rather than a failure.
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(ListPage::default()),
            Err(e) => Err(classify(e, kind)),
        }
    }
}

fn classify(error: kube::Error, what: &str) -> FetchError {
    match &error {
        kube::Error::Api(ae) if ae.code == 403 => {
            FetchError::Forbidden(format!("{what}: {}", ae.message))
        }
        _ => FetchError::Api(error),
    }
}

/// List responses omit per-item TypeMeta; put the kind back so discoverers
/// and identity derivation always see it.
fn ensure_type_meta(value: &mut Value, kind: &str) {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("kind").or_insert_with(|| Value::String(kind.to_string()));
    }
}

fn guess_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') {
        format!("{lower}es")
    } else if let Some(stem) = lower.strip_suffix('y') {
        format!("{stem}ies")
    } else {
        format!("{lower}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_kind_resolution() {
        let table = NATIVE_KINDS
            .iter()
            .find(|(k, _, _, _)| *k == "Deployment")
            .unwrap();
        assert_eq!(table.1, "apps");
        assert_eq!(table.3, "deployments");
    }

    #[test]
    fn test_guess_plural() {
        assert_eq!(guess_plural("Workflow"), "workflows");
        assert_eq!(guess_plural("NetworkPolicy"), "networkpolicies");
        assert_eq!(guess_plural("Ingress"), "ingresses");
    }

    #[test]
    fn test_cluster_scoped_kinds() {
        assert!(CLUSTER_SCOPED_KINDS.contains(&"StorageClass"));
        assert!(!CLUSTER_SCOPED_KINDS.contains(&"Pod"));
    }

    #[test]
    fn test_ensure_type_meta() {
        let mut value = serde_json::json!({"metadata": {"name": "x"}});
        ensure_type_meta(&mut value, "Pod");
        assert_eq!(value["kind"], "Pod");

        let mut typed = serde_json::json!({"kind": "Service"});
        ensure_type_meta(&mut typed, "Pod");
        assert_eq!(typed["kind"], "Service");
    }
}
