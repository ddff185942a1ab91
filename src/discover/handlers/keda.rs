//! KEDA handler
//!
//! A ScaledObject points at its scale target via `spec.scaleTargetRef` and
//! its triggers reference ConfigMaps/Secrets for connection metadata.

use super::{api_version_of, kind_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct KedaHandler;

#[async_trait]
impl Discoverer for KedaHandler {
    fn name(&self) -> &'static str {
        "keda"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(kind_of(resource), Some("ScaledObject") | Some("ScaledJob"))
            && api_version_of(resource).contains("keda.sh")
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

        let scale_target = spec.and_then(|s| s.get("scaleTargetRef"));
        let target_kind = scale_target
            .and_then(|t| t.get("kind"))
            .and_then(|k| k.as_str())
            .unwrap_or("Deployment");
        let target_name = scale_target
            .and_then(|t| t.get("name"))
            .and_then(|n| n.as_str());

        if let (Some(target_name), Some(client)) = (target_name, client) {
            if let Ok(lookup) = ResourceIdentifier::new(target_kind, target_name, namespace) {
                match client.get_resource(&lookup).await {
                    Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                        source.clone(),
                        lookup,
                        RelationshipType::KedaScale,
                        format!("KEDA scales {target_kind}"),
                    )),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!("Error finding scale target {target_kind}/{target_name}: {e}")
                    }
                }
            }
        }

        let triggers = spec
            .and_then(|s| s.get("triggers"))
            .and_then(|t| t.as_array())
            .map(|t| t.as_slice())
            .unwrap_or_default();
        for trigger in triggers {
            let metadata = trigger.get("metadata");
            if let Some(cm_name) = metadata
                .and_then(|m| m.get("configMapName"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) = ResourceIdentifier::new("ConfigMap", cm_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Managed,
                        "KEDA trigger config",
                    ));
                }
            }
            if let Some(secret_name) = metadata
                .and_then(|m| m.get("secretName"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) = ResourceIdentifier::new("Secret", secret_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Managed,
                        "KEDA trigger credentials",
                    ));
                }
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }

    fn crd_kinds(&self) -> &'static [&'static str] {
        &["ScaledObject", "ScaledJob"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "ScaledObject" => Some(CrdInfo::new("keda.sh", "v1alpha1", "scaledobjects")),
            "ScaledJob" => Some(CrdInfo::new("keda.sh", "v1alpha1", "scaledjobs")),
            _ => None,
        }
    }
}
