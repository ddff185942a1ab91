//! Unified discovery
//!
//! Runs every registry-resolved discoverer for one resource, merges their
//! relationship lists, and tracks aggregate statistics. A failing discoverer
//! is counted and logged, never propagated: its siblings still run.

use super::DiscovererRegistry;
use crate::kube::ResourceClient;
use crate::models::{DiscovererCategory, DiscoveryOptions, ResourceRelationship};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Aggregate discovery counters for one build invocation
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DiscoveryStats {
    /// Discoverer invocations attempted
    pub discoveries: u64,
    /// Discoverer-level errors swallowed
    pub errors: u64,
    /// Relationships returned across all invocations
    pub total_relationships: u64,
}

/// Runs all applicable discoverers for a resource and merges the results
pub struct UnifiedDiscoverer {
    client: Arc<dyn ResourceClient>,
    registry: Arc<DiscovererRegistry>,
    stats: DiscoveryStats,
}

impl UnifiedDiscoverer {
    pub fn new(client: Arc<dyn ResourceClient>, registry: Arc<DiscovererRegistry>) -> Self {
        Self {
            client,
            registry,
            stats: DiscoveryStats::default(),
        }
    }

    /// Discover all relationships for a resource.
    ///
    /// Resolves applicable discoverers, filters by the enabled categories,
    /// invokes each in priority order and concatenates results. Deduplication
    /// happens at graph-insertion time, not here.
    pub async fn discover_all_relationships(
        &mut self,
        resource: &Value,
        options: &DiscoveryOptions,
    ) -> Vec<ResourceRelationship> {
        let mut relationships = Vec::new();

        for discoverer in self.registry.get_discoverers_for_resource(resource) {
            if !category_enabled(discoverer.category(), options) {
                continue;
            }

            self.stats.discoveries += 1;
            match discoverer.discover(resource, Some(self.client.as_ref())).await {
                Ok(mut found) => {
                    self.stats.total_relationships += found.len() as u64;
                    relationships.append(&mut found);
                }
                Err(e) => {
                    self.stats.errors += 1;
                    tracing::warn!(
                        "Discoverer {} failed for {}: {}",
                        discoverer.name(),
                        resource.get("kind").and_then(|k| k.as_str()).unwrap_or("?"),
                        e
                    );
                }
            }
        }

        relationships
    }

    /// Counters accumulated since the last reset
    pub fn stats(&self) -> DiscoveryStats {
        self.stats
    }

    /// Reset counters at the start of a build invocation
    pub fn reset_stats(&mut self) {
        self.stats = DiscoveryStats::default();
    }
}

fn category_enabled(category: DiscovererCategory, options: &DiscoveryOptions) -> bool {
    match category {
        DiscovererCategory::Native => true,
        DiscovererCategory::Rbac => options.include_rbac,
        DiscovererCategory::Network => options.include_network,
        DiscovererCategory::Crd => options.include_crds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{Discoverer, DiscoveryError};
    use crate::kube::{FetchError, ListPage};
    use crate::models::{RelationshipType, ResourceIdentifier, ResourceRelationship};
    use async_trait::async_trait;
    use serde_json::json;

    struct NullClient;

    #[async_trait]
    impl ResourceClient for NullClient {
        async fn get_resource(
            &self,
            _id: &ResourceIdentifier,
        ) -> Result<Option<Value>, FetchError> {
            Ok(None)
        }

        async fn list_resources(
            &self,
            _kind: &str,
            _namespace: Option<&str>,
            _label_selector: Option<&str>,
        ) -> Result<ListPage, FetchError> {
            Ok(ListPage::default())
        }
    }

    struct FixedDiscoverer {
        category: DiscovererCategory,
        fail: bool,
    }

    #[async_trait]
    impl Discoverer for FixedDiscoverer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn supports(&self, _resource: &Value) -> bool {
            true
        }

        async fn discover(
            &self,
            _resource: &Value,
            _client: Option<&dyn ResourceClient>,
        ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
            if self.fail {
                return Err(DiscoveryError::Invalid(
                    crate::models::ValidationError::EmptyKind,
                ));
            }
            Ok(vec![ResourceRelationship::new(
                ResourceIdentifier::new("Pod", "a", Some("default")).unwrap(),
                ResourceIdentifier::new("ConfigMap", "b", Some("default")).unwrap(),
                RelationshipType::Volume,
                "test",
            )])
        }

        fn category(&self) -> DiscovererCategory {
            self.category
        }
    }

    fn unified_with(discoverers: Vec<Arc<dyn Discoverer>>) -> UnifiedDiscoverer {
        let registry = Arc::new(DiscovererRegistry::new());
        for d in discoverers {
            registry.register(d, None);
        }
        UnifiedDiscoverer::new(Arc::new(NullClient), registry)
    }

    #[tokio::test]
    async fn test_merges_results_and_counts() {
        let mut unified = unified_with(vec![
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Native,
                fail: false,
            }),
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Native,
                fail: false,
            }),
        ]);

        let rels = unified
            .discover_all_relationships(&json!({"kind": "Pod"}), &DiscoveryOptions::default())
            .await;

        assert_eq!(rels.len(), 2);
        let stats = unified.stats();
        assert_eq!(stats.discoveries, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.total_relationships, 2);
    }

    #[tokio::test]
    async fn test_error_isolation() {
        let mut unified = unified_with(vec![
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Native,
                fail: true,
            }),
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Native,
                fail: false,
            }),
        ]);

        let rels = unified
            .discover_all_relationships(&json!({"kind": "Pod"}), &DiscoveryOptions::default())
            .await;

        // The failing discoverer does not abort the healthy one
        assert_eq!(rels.len(), 1);
        let stats = unified.stats();
        assert_eq!(stats.discoveries, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_relationships, 1);
    }

    #[tokio::test]
    async fn test_category_gating() {
        let mut unified = unified_with(vec![
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Rbac,
                fail: false,
            }),
            Arc::new(FixedDiscoverer {
                category: DiscovererCategory::Crd,
                fail: false,
            }),
        ]);

        let options = DiscoveryOptions {
            include_rbac: false,
            include_network: true,
            include_crds: false,
        };
        let rels = unified
            .discover_all_relationships(&json!({"kind": "Pod"}), &options)
            .await;

        assert!(rels.is_empty());
        assert_eq!(unified.stats().discoveries, 0);
    }

    #[tokio::test]
    async fn test_stats_accumulate_until_reset() {
        let mut unified = unified_with(vec![Arc::new(FixedDiscoverer {
            category: DiscovererCategory::Native,
            fail: false,
        })]);

        let resource = json!({"kind": "Pod"});
        let options = DiscoveryOptions::default();
        unified.discover_all_relationships(&resource, &options).await;
        unified.discover_all_relationships(&resource, &options).await;
        assert_eq!(unified.stats().discoveries, 2);

        unified.reset_stats();
        assert_eq!(unified.stats().discoveries, 0);
    }
}
