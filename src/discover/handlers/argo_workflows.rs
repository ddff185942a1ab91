//! Argo Workflows handler
//!
//! Workflows label their spawned pods with `workflows.argoproj.io/workflow`;
//! CronWorkflows label the Workflows they create. Workflow specs also embed
//! volume and service-account references.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct ArgoWorkflowsHandler;

#[async_trait]
impl Discoverer for ArgoWorkflowsHandler {
    fn name(&self) -> &'static str {
        "argo-workflows"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("Workflow") | Some("CronWorkflow") | Some("WorkflowTemplate")
        ) && api_version_of(resource).starts_with("argoproj.io/")
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
        let kind = kind_of(resource);
        let namespace = namespace_of(resource);
        let name = name_of(resource).unwrap_or_default();
        let spec = resource.get("spec");

        if kind == Some("Workflow") && namespace.is_some() && !name.is_empty() {
            for pod in find_resources_by_label(
                client,
                "Pod",
                namespace,
                &[("workflows.argoproj.io/workflow", name)],
            )
            .await
            {
                let Some(pod_name) = name_of(&pod) else { continue };
                if let Ok(target) = ResourceIdentifier::new("Pod", pod_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::ArgoWorkflowSpawned,
                        "Workflow spawned pod",
                    ));
                }
            }
        } else if kind == Some("CronWorkflow") && namespace.is_some() {
            for workflow in find_resources_by_label(
                client,
                "Workflow",
                namespace,
                &[("workflows.argoproj.io/cron-workflow", name)],
            )
            .await
            {
                let Some(wf_name) = name_of(&workflow) else { continue };
                if let Ok(target) = ResourceIdentifier::new("Workflow", wf_name, namespace) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Owned,
                        "CronWorkflow created this Workflow",
                    ));
                }
            }
        }

        // CronWorkflows nest the actual workflow under spec.workflowSpec
        let workflow_spec = spec.and_then(|s| s.get("workflowSpec")).or(spec);

        let templates = workflow_spec
            .and_then(|ws| ws.get("templates"))
            .and_then(|t| t.as_array())
            .map(|t| t.as_slice())
            .unwrap_or_default();
        for template in templates {
            let volumes = template
                .get("volumes")
                .and_then(|v| v.as_array())
                .map(|v| v.as_slice())
                .unwrap_or_default();
            for volume in volumes {
                if let Some(cm_name) = volume
                    .get("configMap")
                    .and_then(|cm| cm.get("name"))
                    .and_then(|n| n.as_str())
                {
                    if let Ok(target) = ResourceIdentifier::new("ConfigMap", cm_name, namespace) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::Volume,
                            "Volume mounted from ConfigMap",
                        ));
                    }
                }
                if let Some(secret_name) = volume
                    .get("secret")
                    .and_then(|s| s.get("secretName"))
                    .and_then(|n| n.as_str())
                {
                    if let Ok(target) = ResourceIdentifier::new("Secret", secret_name, namespace) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::Volume,
                            "Volume mounted from Secret",
                        ));
                    }
                }
            }
        }

        if let Some(sa_name) = workflow_spec
            .and_then(|ws| ws.get("serviceAccountName"))
            .and_then(|sa| sa.as_str())
        {
            if let Ok(target) = ResourceIdentifier::new("ServiceAccount", sa_name, namespace) {
                relationships.push(ResourceRelationship::new(
                    source,
                    target,
                    RelationshipType::ServiceAccount,
                    "Workflow uses ServiceAccount",
                ));
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}
