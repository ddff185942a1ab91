//! Crossplane handler
//!
//! Crossplane is annotation-driven: provisioned resources carry
//! `crossplane.io/claim-name`/`claim-namespace` pointing back at their
//! claim, and Composition output carries composition annotations/labels.

use super::{annotation_value, api_version_of, kind_of, label_value, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct CrossplaneHandler;

#[async_trait]
impl Discoverer for CrossplaneHandler {
    fn name(&self) -> &'static str {
        "crossplane"
    }

    fn supports(&self, resource: &Value) -> bool {
        let is_crossplane_kind = matches!(
            kind_of(resource),
            Some("Composition") | Some("CompositeResourceDefinition")
        ) && api_version_of(resource).contains("crossplane.io");

        is_crossplane_kind
            || annotation_value(resource, "crossplane.io/claim-name").is_some()
            || annotation_value(resource, "crossplane.io/claim-namespace").is_some()
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

        let claim_name = annotation_value(resource, "crossplane.io/claim-name");
        let claim_namespace = annotation_value(resource, "crossplane.io/claim-namespace");

        // A provisioned resource points back at its claim
        if let (Some(claim_name), Some(claim_namespace), Some(client)) =
            (claim_name, claim_namespace, client)
        {
            match client.list_resources(kind, Some(claim_namespace), None).await {
                Ok(page) => {
                    let claim_exists = page
                        .items
                        .iter()
                        .any(|res| name_of(res) == Some(claim_name));
                    if claim_exists {
                        if let Ok(claim) =
                            ResourceIdentifier::new(kind, claim_name, Some(claim_namespace))
                        {
                            relationships.push(ResourceRelationship::new(
                                claim,
                                subject.clone(),
                                RelationshipType::CrossplaneProvision,
                                "Crossplane claim provisions resource",
                            ));
                        }
                    }
                }
                Err(e) => tracing::debug!("Error finding Crossplane claim: {e}"),
            }
        }

        // Compositions stamp their output with composition markers
        if kind == "Composition" {
            if let Some(client) = client {
                for res_kind in ["Deployment", "Service", "ConfigMap", "Secret", "StatefulSet"] {
                    let page = match client.list_resources(res_kind, namespace, None).await {
                        Ok(page) => page,
                        Err(e) => {
                            tracing::debug!("Error finding Crossplane managed resources: {e}");
                            continue;
                        }
                    };
                    for res in &page.items {
                        let provisioned = annotation_value(
                            res,
                            "crossplane.io/composition-resource-name",
                        )
                        .is_some()
                            || label_value(res, "crossplane.io/composite").is_some();
                        if !provisioned {
                            continue;
                        }
                        let Some(res_name) = name_of(res) else { continue };
                        if let Ok(target) =
                            ResourceIdentifier::new(res_kind, res_name, namespace)
                        {
                            relationships.push(ResourceRelationship::new(
                                subject.clone(),
                                target,
                                RelationshipType::CrossplaneProvision,
                                "Composition provisions resource",
                            ));
                        }
                    }
                }
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }

    fn crd_kinds(&self) -> &'static [&'static str] {
        &["Composition", "CompositeResourceDefinition"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "Composition" => Some(CrdInfo::new(
                "apiextensions.crossplane.io",
                "v1",
                "compositions",
            )),
            "CompositeResourceDefinition" => Some(CrdInfo::new(
                "apiextensions.crossplane.io",
                "v1",
                "compositeresourcedefinitions",
            )),
            _ => None,
        }
    }
}
