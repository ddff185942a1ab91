//! Discoverer registry
//!
//! Holds the available discoverer plugins and resolves, per resource, the
//! ordered subset that applies. Discoverers register either as general
//! (applicability decided by their own `supports` predicate) or as overrides
//! for one specific kind.

use super::Discoverer;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Descriptor of one registered discoverer, for introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscovererInfo {
    pub name: &'static str,
    pub priority: i32,
    /// "general" or "override"
    pub registration: &'static str,
    /// The kind an override is registered for
    pub kind: Option<String>,
}

#[derive(Default)]
struct Inner {
    general: Vec<Arc<dyn Discoverer>>,
    overrides: HashMap<String, Vec<Arc<dyn Discoverer>>>,
}

/// Registry of discoverer plugins.
///
/// Read-mostly after setup: register everything before builds start, share
/// the registry across builders via `Arc`. Concurrent registration while
/// builds are in flight is not a supported scenario.
#[derive(Default)]
pub struct DiscovererRegistry {
    inner: RwLock<Inner>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<DiscovererRegistry>> = OnceLock::new();

impl DiscovererRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in discoverer registered:
    /// native, RBAC, network, and all operator handlers.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(super::NativeResourceDiscoverer), None);
        registry.register(Arc::new(super::RbacDiscoverer), None);
        registry.register(Arc::new(super::NetworkPolicyDiscoverer), None);
        for handler in super::handlers::all_handlers() {
            registry.register(handler, None);
        }
        registry
    }

    /// Shared process-wide registry, populated with the built-ins on first
    /// access. Prefer constructing and threading an explicit registry; use
    /// this only where several independent builders must share one set.
    pub fn get_global() -> Arc<DiscovererRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::with_defaults()))
            .clone()
    }

    /// Register a discoverer, either generally or as a kind-specific override.
    pub fn register(&self, discoverer: Arc<dyn Discoverer>, resource_kind: Option<&str>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        match resource_kind {
            Some(kind) => {
                tracing::debug!(
                    "Registered override discoverer {} for kind {}",
                    discoverer.name(),
                    kind
                );
                inner
                    .overrides
                    .entry(kind.to_string())
                    .or_default()
                    .push(discoverer);
            }
            None => {
                tracing::debug!("Registered general discoverer {}", discoverer.name());
                inner.general.push(discoverer);
            }
        }
    }

    /// Resolve the ordered list of discoverers applicable to a resource.
    ///
    /// Returns the union of general discoverers whose `supports` is true and
    /// override discoverers registered for the resource's kind, sorted by
    /// priority descending; ties keep registration order. Higher priority is
    /// reported first, so a consumer can treat the first hit as authoritative
    /// while still collecting all matches.
    pub fn get_discoverers_for_resource(&self, resource: &Value) -> Vec<Arc<dyn Discoverer>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let kind = resource.get("kind").and_then(|k| k.as_str());

        let mut applicable: Vec<Arc<dyn Discoverer>> = Vec::new();
        for discoverer in &inner.general {
            if discoverer.supports(resource) {
                applicable.push(discoverer.clone());
            }
        }
        if let Some(kind) = kind {
            for discoverer in inner.overrides.get(kind).into_iter().flatten() {
                if discoverer.supports(resource) {
                    applicable.push(discoverer.clone());
                }
            }
        }

        applicable.sort_by_key(|d| std::cmp::Reverse(d.priority()));
        applicable
    }

    /// Descriptors of every registered discoverer.
    pub fn list_discoverers(&self) -> Vec<DiscovererInfo> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut info: Vec<DiscovererInfo> = inner
            .general
            .iter()
            .map(|d| DiscovererInfo {
                name: d.name(),
                priority: d.priority(),
                registration: "general",
                kind: None,
            })
            .collect();

        for (kind, discoverers) in &inner.overrides {
            for d in discoverers {
                info.push(DiscovererInfo {
                    name: d.name(),
                    priority: d.priority(),
                    registration: "override",
                    kind: Some(kind.clone()),
                });
            }
        }

        info
    }

    /// Remove every registered discoverer.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.general.clear();
        inner.overrides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::DiscoveryError;
    use crate::kube::ResourceClient;
    use crate::models::{DiscovererCategory, ResourceRelationship};
    use async_trait::async_trait;
    use serde_json::json;

    struct StubDiscoverer {
        name: &'static str,
        kind: Option<&'static str>,
        priority: i32,
    }

    #[async_trait]
    impl Discoverer for StubDiscoverer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn supports(&self, resource: &Value) -> bool {
            match self.kind {
                Some(kind) => resource.get("kind").and_then(|k| k.as_str()) == Some(kind),
                None => true,
            }
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
            DiscovererCategory::Native
        }
    }

    fn stub(name: &'static str, kind: Option<&'static str>, priority: i32) -> Arc<dyn Discoverer> {
        Arc::new(StubDiscoverer {
            name,
            kind,
            priority,
        })
    }

    #[test]
    fn test_registration_and_resolution() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("general", None, 50), None);

        let discoverers = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
        assert_eq!(discoverers.len(), 1);
        assert_eq!(discoverers[0].name(), "general");
    }

    #[test]
    fn test_priority_ordering() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("low", None, 10), None);
        registry.register(stub("high", None, 100), None);
        registry.register(stub("mid", None, 50), None);

        let discoverers = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
        let names: Vec<&str> = discoverers.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_stable_order_on_priority_ties() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("first", None, 50), None);
        registry.register(stub("second", None, 50), None);

        let discoverers = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
        let names: Vec<&str> = discoverers.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_override_joins_general() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("general", Some("Pod"), 50), None);
        registry.register(stub("override", Some("Pod"), 100), Some("Pod"));

        let discoverers = registry.get_discoverers_for_resource(&json!({"kind": "Pod"}));
        let names: Vec<&str> = discoverers.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["override", "general"]);

        // The override does not apply to other kinds
        let other = registry.get_discoverers_for_resource(&json!({"kind": "Service"}));
        assert!(other.is_empty());
    }

    #[test]
    fn test_unsupported_resource_excluded() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("pods-only", Some("Pod"), 50), None);

        let discoverers = registry.get_discoverers_for_resource(&json!({"kind": "Service"}));
        assert!(discoverers.is_empty());
    }

    #[test]
    fn test_list_discoverers() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("general", None, 50), None);
        registry.register(stub("override", None, 100), Some("Pod"));

        let info = registry.list_discoverers();
        assert_eq!(info.len(), 2);
        assert!(info.iter().any(|i| i.registration == "general"));
        assert!(
            info.iter()
                .any(|i| i.registration == "override" && i.kind.as_deref() == Some("Pod"))
        );
    }

    #[test]
    fn test_clear() {
        let registry = DiscovererRegistry::new();
        registry.register(stub("general", None, 50), None);
        registry.clear();

        assert!(
            registry
                .get_discoverers_for_resource(&json!({"kind": "Pod"}))
                .is_empty()
        );
    }

    #[test]
    fn test_global_is_shared() {
        let a = DiscovererRegistry::get_global();
        let b = DiscovererRegistry::get_global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
