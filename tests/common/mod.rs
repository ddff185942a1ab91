//! Shared test fixtures: an in-memory ResourceClient and sample resources
#![allow(dead_code)]

use async_trait::async_trait;
use kubegraph::kube::{FetchError, ListPage, ResourceClient};
use kubegraph::models::ResourceIdentifier;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory mock client keyed on (kind, namespace, name)
#[derive(Default)]
pub struct MockClient {
    resources: Mutex<HashMap<(String, Option<String>, String), Value>>,
    forbidden_kinds: Mutex<HashSet<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the mock cluster
    pub fn add(&self, resource: Value) {
        let kind = resource
            .get("kind")
            .and_then(|k| k.as_str())
            .expect("fixture needs a kind")
            .to_string();
        let metadata = resource.get("metadata").cloned().unwrap_or(Value::Null);
        let name = metadata
            .get("name")
            .and_then(|n| n.as_str())
            .expect("fixture needs a name")
            .to_string();
        let namespace = metadata
            .get("namespace")
            .and_then(|n| n.as_str())
            .map(|n| n.to_string());

        self.resources
            .lock()
            .unwrap()
            .insert((kind, namespace, name), resource);
    }

    /// Make every access to a kind fail with a permission error
    pub fn deny_kind(&self, kind: &str) {
        self.forbidden_kinds.lock().unwrap().insert(kind.to_string());
    }

    fn check_denied(&self, kind: &str) -> Result<(), FetchError> {
        if self.forbidden_kinds.lock().unwrap().contains(kind) {
            return Err(FetchError::Forbidden(format!(
                "{kind} is forbidden: User cannot list resource"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    async fn get_resource(&self, id: &ResourceIdentifier) -> Result<Option<Value>, FetchError> {
        self.check_denied(&id.kind)?;
        let key = (id.kind.clone(), id.namespace.clone(), id.name.clone());
        Ok(self.resources.lock().unwrap().get(&key).cloned())
    }

    async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<ListPage, FetchError> {
        self.check_denied(kind)?;

        let items = self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|((res_kind, res_ns, _), _)| {
                res_kind == kind
                    && namespace.is_none_or(|ns| res_ns.as_deref() == Some(ns))
            })
            .map(|(_, resource)| resource.clone())
            .filter(|resource| matches_selector(resource, label_selector))
            .collect();

        Ok(ListPage {
            items,
            resource_version: Some("12345".to_string()),
        })
    }
}

fn matches_selector(resource: &Value, label_selector: Option<&str>) -> bool {
    let Some(selector) = label_selector else {
        return true;
    };
    let labels = resource
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .cloned()
        .unwrap_or(json!({}));

    selector.split(',').all(|part| match part.split_once('=') {
        Some((key, value)) => labels.get(key).and_then(|v| v.as_str()) == Some(value),
        None => true,
    })
}

pub fn sample_pod() -> Value {
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
        "spec": {
            "containers": [
                {
                    "name": "nginx",
                    "image": "nginx:1.14.2",
                    "env": [
                        {
                            "name": "CONFIG_KEY",
                            "valueFrom": {"configMapKeyRef": {"name": "app-config", "key": "key1"}},
                        }
                    ],
                    "envFrom": [{"configMapRef": {"name": "app-config"}}],
                }
            ],
            "volumes": [
                {"name": "config-volume", "configMap": {"name": "app-config"}},
                {"name": "secret-volume", "secret": {"secretName": "app-secret"}},
            ],
            "serviceAccountName": "default",
        },
        "status": {"phase": "Running", "podIP": "10.0.0.1"},
    })
}

pub fn sample_deployment() -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "nginx-deployment",
            "namespace": "default",
            "labels": {"app": "nginx"},
        },
        "spec": {
            "replicas": 3,
            "selector": {"matchLabels": {"app": "nginx"}},
            "template": {
                "metadata": {"labels": {"app": "nginx"}},
                "spec": {
                    "containers": [{"name": "nginx", "image": "nginx:1.14.2"}],
                },
            },
        },
        "status": {"replicas": 3, "readyReplicas": 3},
    })
}

pub fn sample_replicaset() -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "ReplicaSet",
        "metadata": {
            "name": "nginx-deployment-abc123",
            "namespace": "default",
            "labels": {"app": "nginx", "pod-template-hash": "abc123"},
            "ownerReferences": [
                {"kind": "Deployment", "name": "nginx-deployment"}
            ],
        },
        "spec": {
            "replicas": 3,
            "selector": {"matchLabels": {"app": "nginx", "pod-template-hash": "abc123"}},
        },
        "status": {"replicas": 3, "readyReplicas": 3},
    })
}

/// A replica pod with a generated name, owned by the sample ReplicaSet
pub fn replica_pod(suffix: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": format!("nginx-deployment-abc123-{suffix}"),
            "namespace": "default",
            "labels": {"app": "nginx", "pod-template-hash": "abc123"},
            "ownerReferences": [
                {"kind": "ReplicaSet", "name": "nginx-deployment-abc123"}
            ],
        },
        "spec": {
            "containers": [{"name": "nginx", "image": "nginx:1.14.2"}],
        },
        "status": {"phase": "Running"},
    })
}

pub fn sample_service() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": "nginx-service",
            "namespace": "default",
        },
        "spec": {
            "type": "ClusterIP",
            "clusterIP": "10.96.0.1",
            "selector": {"app": "nginx"},
            "ports": [{"port": 80, "targetPort": 80, "protocol": "TCP"}],
        },
    })
}

pub fn sample_configmap() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "app-config", "namespace": "default"},
        "data": {"key1": "value1", "key2": "value2"},
    })
}

pub fn sample_secret() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {"name": "app-secret", "namespace": "default"},
        "type": "Opaque",
        "data": {"username": "YWRtaW4=", "password": "cGFzc3dvcmQ="},
    })
}

pub fn sample_ingress() -> Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {"name": "nginx-ingress", "namespace": "default"},
        "spec": {
            "rules": [
                {
                    "host": "example.com",
                    "http": {
                        "paths": [
                            {
                                "path": "/",
                                "pathType": "Prefix",
                                "backend": {
                                    "service": {"name": "nginx-service", "port": {"number": 80}}
                                },
                            }
                        ]
                    },
                }
            ]
        },
    })
}

pub fn sample_network_policy() -> Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": {"name": "nginx-network-policy", "namespace": "default"},
        "spec": {
            "podSelector": {"matchLabels": {"app": "nginx"}},
            "policyTypes": ["Ingress", "Egress"],
            "ingress": [{"from": [{"podSelector": {"matchLabels": {"app": "frontend"}}}]}],
            "egress": [{"to": [{"podSelector": {"matchLabels": {"app": "backend"}}}]}],
        },
    })
}
