//! Discoverer registry resolution tests

mod common;

use async_trait::async_trait;
use kubegraph::discover::{Discoverer, DiscovererRegistry, DiscoveryError};
use kubegraph::kube::ResourceClient;
use kubegraph::models::{DiscovererCategory, ResourceRelationship};
use serde_json::{Value, json};
use std::sync::Arc;

struct NamedDiscoverer {
    name: &'static str,
    priority: i32,
}

#[async_trait]
impl Discoverer for NamedDiscoverer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, _resource: &Value) -> bool {
        true
    }

    async fn discover(
        &self,
        _resource: &Value,
        _client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        Ok(Vec::new())
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}

fn named(name: &'static str, priority: i32) -> Arc<dyn Discoverer> {
    Arc::new(NamedDiscoverer { name, priority })
}

#[test]
fn test_priority_descending_resolution() {
    let registry = DiscovererRegistry::new();
    registry.register(named("ten", 10), Some("Pod"));
    registry.register(named("hundred", 100), Some("Pod"));
    registry.register(named("fifty", 50), Some("Pod"));

    let resolved = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
    let priorities: Vec<i32> = resolved.iter().map(|d| d.priority()).collect();
    assert_eq!(priorities, vec![100, 50, 10]);
}

#[test]
fn test_general_and_override_union() {
    let registry = DiscovererRegistry::new();
    registry.register(named("general", 50), None);
    registry.register(named("pod-override", 90), Some("Pod"));

    let resolved = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
    let names: Vec<&str> = resolved.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["pod-override", "general"]);

    let resolved = registry.get_discoverers_for_resource(&json!({"kind": "Service"}));
    let names: Vec<&str> = resolved.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["general"]);
}

#[test]
fn test_defaults_include_builtin_discoverers() {
    let registry = DiscovererRegistry::with_defaults();
    let info = registry.list_discoverers();

    for expected in ["native", "rbac", "network", "helm", "keda", "temporal"] {
        assert!(
            info.iter().any(|i| i.name == expected),
            "missing built-in discoverer {expected}"
        );
    }
}

#[test]
fn test_default_resolution_for_keda_object() {
    let registry = DiscovererRegistry::with_defaults();
    let scaled_object = json!({
        "apiVersion": "keda.sh/v1alpha1",
        "kind": "ScaledObject",
        "metadata": {"name": "scaler", "namespace": "default"},
    });

    let resolved = registry.get_discoverers_for_resource(&scaled_object);
    let names: Vec<&str> = resolved.iter().map(|d| d.name()).collect();

    // The kind-agnostic native discoverer plus the KEDA handler
    assert!(names.contains(&"native"));
    assert!(names.contains(&"keda"));
    assert!(!names.contains(&"rbac"));
}

#[test]
fn test_clear_empties_registry() {
    let registry = DiscovererRegistry::new();
    registry.register(named("a", 50), None);
    registry.register(named("b", 50), Some("Pod"));

    registry.clear();

    assert!(registry.list_discoverers().is_empty());
    assert!(
        registry
            .get_discoverers_for_resource(&json!({"kind": "Pod"}))
            .is_empty()
    );
}

#[test]
fn test_global_registry_is_shared() {
    let a = DiscovererRegistry::get_global();
    let b = DiscovererRegistry::get_global();
    assert!(Arc::ptr_eq(&a, &b));
}
