//! NetworkPolicy discovery
//!
//! Turns a NetworkPolicy's pod selectors into wildcard edges: the policy's
//! own podSelector, plus the peer selectors of each ingress/egress rule.

use super::{Discoverer, DiscoveryError, label_selector_string, selector_pairs};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

/// Discoverer for NetworkPolicy relationships
pub struct NetworkPolicyDiscoverer;

#[async_trait]
impl Discoverer for NetworkPolicyDiscoverer {
    fn name(&self) -> &'static str {
        "network"
    }

    fn supports(&self, resource: &Value) -> bool {
        resource.get("kind").and_then(|k| k.as_str()) == Some("NetworkPolicy")
    }

    async fn discover(
        &self,
        resource: &Value,
        _client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let Ok(source) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };
        let spec = resource.get("spec");

        if let Some(target) = wildcard_target(
            spec.and_then(|s| s.get("podSelector")),
            source.namespace.as_deref(),
        ) {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::NetworkPolicy,
                "Policy applies to selected pods",
            ));
        }

        // ingress/egress lists can be null in real manifests
        for rule in rules(spec, "ingress") {
            for peer in peers(rule, "from") {
                if let Some(target) = wildcard_target(
                    peer.get("podSelector"),
                    source.namespace.as_deref(),
                ) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::NetworkPolicyIngress,
                        "Allows ingress from selected pods",
                    ));
                }
            }
        }
        for rule in rules(spec, "egress") {
            for peer in peers(rule, "to") {
                if let Some(target) = wildcard_target(
                    peer.get("podSelector"),
                    source.namespace.as_deref(),
                ) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::NetworkPolicyEgress,
                        "Allows egress to selected pods",
                    ));
                }
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Network
    }
}

fn rules<'a>(spec: Option<&'a Value>, key: &str) -> Vec<&'a Value> {
    spec.and_then(|s| s.get(key))
        .and_then(|r| r.as_array())
        .map(|r| r.iter().collect())
        .unwrap_or_default()
}

fn peers<'a>(rule: &'a Value, key: &str) -> Vec<&'a Value> {
    rule.get(key)
        .and_then(|p| p.as_array())
        .map(|p| p.iter().collect())
        .unwrap_or_default()
}

/// Build a `Pod:*[k=v,...]` wildcard identifier from a selector's matchLabels
/// (or direct label map).
fn wildcard_target(selector: Option<&Value>, namespace: Option<&str>) -> Option<ResourceIdentifier> {
    let selector = selector?;
    let labels = selector.get("matchLabels").unwrap_or(selector);
    let pairs = selector_pairs(labels);
    if pairs.is_empty() {
        return None;
    }

    ResourceIdentifier::new(
        "Pod",
        format!("*[{}]", label_selector_string(&pairs)),
        namespace,
    )
    .ok()
}
