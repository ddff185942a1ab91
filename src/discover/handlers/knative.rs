//! Knative handler
//!
//! Knative Serving chains Service -> Configuration -> Revision; Revisions
//! serve traffic through a Deployment labeled `serving.knative.dev/revision`,
//! and Routes split traffic across named Revisions.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct KnativeHandler;

#[async_trait]
impl Discoverer for KnativeHandler {
    fn name(&self) -> &'static str {
        "knative"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("Service") | Some("Route") | Some("Configuration") | Some("Revision")
        ) && api_version_of(resource).contains("knative.dev")
    }

    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let Ok(subject) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };
        let kind = kind_of(resource).unwrap_or_default();
        let namespace = namespace_of(resource);
        let name = name_of(resource).unwrap_or_default();

        // Knative owner chain: the owning Service/Configuration is the source
        let owner_refs = resource
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(|o| o.as_array())
            .map(|o| o.as_slice())
            .unwrap_or_default();
        for owner_ref in owner_refs {
            let owner_kind = owner_ref.get("kind").and_then(|k| k.as_str());
            let owner_name = owner_ref.get("name").and_then(|n| n.as_str());
            if !matches!(owner_kind, Some("Service") | Some("Configuration")) {
                continue;
            }
            if let (Some(owner_kind), Some(owner_name)) = (owner_kind, owner_name) {
                if let Ok(owner) = ResourceIdentifier::new(owner_kind, owner_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        owner,
                        subject.clone(),
                        RelationshipType::Owned,
                        format!("{owner_kind} owns {kind}"),
                    ));
                }
            }
        }

        if kind == "Revision" && namespace.is_some() {
            for deployment in find_resources_by_label(
                client,
                "Deployment",
                namespace,
                &[("serving.knative.dev/revision", name)],
            )
            .await
            {
                let Some(deploy_name) = name_of(&deployment) else { continue };
                if let Ok(target) = ResourceIdentifier::new("Deployment", deploy_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        subject.clone(),
                        target,
                        RelationshipType::KnativeServes,
                        "Knative Revision serves traffic via Deployment",
                    ));
                }
            }
        } else if kind == "Route" {
            let traffic = resource
                .get("spec")
                .and_then(|s| s.get("traffic"))
                .and_then(|t| t.as_array())
                .map(|t| t.as_slice())
                .unwrap_or_default();
            for traffic_target in traffic {
                let Some(revision_name) = traffic_target
                    .get("revisionName")
                    .and_then(|n| n.as_str())
                else {
                    continue;
                };
                let Some(client) = client else { continue };
                let Ok(lookup) = ResourceIdentifier::new("Revision", revision_name, namespace)
                else {
                    continue;
                };
                match client.get_resource(&lookup).await {
                    Ok(Some(_)) => {
                        let percent = traffic_target
                            .get("percent")
                            .and_then(|p| p.as_i64())
                            .unwrap_or(100);
                        relationships.push(ResourceRelationship::new(
                            subject.clone(),
                            lookup,
                            RelationshipType::KnativeServes,
                            format!("Route traffic to Revision (weight: {percent}%)"),
                        ));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Error finding Revision {revision_name}: {e}"),
                }
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}
