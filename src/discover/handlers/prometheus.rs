//! Prometheus operator handler
//!
//! ServiceMonitors and PodMonitors select their scrape targets with
//! matchLabels selectors; a Prometheus instance selects ServiceMonitors the
//! same way.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::selector_pairs;
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct PrometheusHandler;

#[async_trait]
impl Discoverer for PrometheusHandler {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("ServiceMonitor") | Some("PodMonitor") | Some("PrometheusRule")
                | Some("Prometheus")
        ) && api_version_of(resource).contains("monitoring.coreos.com")
    }

    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let Ok(source) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };
        let namespace = namespace_of(resource);
        let spec = resource.get("spec");

        let (selector_field, target_kind, details) = match kind_of(resource) {
            Some("ServiceMonitor") => ("selector", "Service", "ServiceMonitor monitors Service"),
            Some("PodMonitor") => ("selector", "Pod", "PodMonitor monitors Pod"),
            Some("Prometheus") => (
                "serviceMonitorSelector",
                "ServiceMonitor",
                "Prometheus scrapes ServiceMonitor",
            ),
            _ => return Ok(relationships),
        };

        let match_labels = spec
            .and_then(|s| s.get(selector_field))
            .and_then(|s| s.get("matchLabels"));
        let Some(match_labels) = match_labels else {
            return Ok(relationships);
        };
        let pairs = selector_pairs(match_labels);
        if pairs.is_empty() {
            return Ok(relationships);
        }

        for res in find_resources_by_label(client, target_kind, namespace, &pairs).await {
            let Some(res_name) = name_of(&res) else { continue };
            let res_namespace = namespace_of(&res).or(namespace);
            if let Ok(target) = ResourceIdentifier::new(target_kind, res_name, res_namespace) {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::PrometheusMonitor,
                    details,
                ));
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }

    fn crd_kinds(&self) -> &'static [&'static str] {
        &["ServiceMonitor", "PodMonitor", "PrometheusRule"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "ServiceMonitor" => Some(CrdInfo::new(
                "monitoring.coreos.com",
                "v1",
                "servicemonitors",
            )),
            "PodMonitor" => Some(CrdInfo::new("monitoring.coreos.com", "v1", "podmonitors")),
            "PrometheusRule" => Some(CrdInfo::new(
                "monitoring.coreos.com",
                "v1",
                "prometheusrules",
            )),
            _ => None,
        }
    }
}
