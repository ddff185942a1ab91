//! Tekton handler
//!
//! PipelineRuns execute a Pipeline and spawn TaskRuns (labeled
//! `tekton.dev/pipelineRun`); TaskRuns execute a Task, spawn Pods (labeled
//! `tekton.dev/taskRun`) and mount workspace PVCs.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct TektonHandler;

#[async_trait]
impl Discoverer for TektonHandler {
    fn name(&self) -> &'static str {
        "tekton"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("Pipeline") | Some("PipelineRun") | Some("Task") | Some("TaskRun")
        ) && api_version_of(resource).contains("tekton.dev")
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
        let name = name_of(resource).unwrap_or_default();
        let spec = resource.get("spec");

        match kind_of(resource) {
            Some("PipelineRun") => {
                let pipeline_name = spec
                    .and_then(|s| s.get("pipelineRef"))
                    .and_then(|r| r.get("name"))
                    .and_then(|n| n.as_str());
                if let (Some(pipeline_name), Some(client)) = (pipeline_name, client) {
                    if let Ok(lookup) =
                        ResourceIdentifier::new("Pipeline", pipeline_name, namespace)
                    {
                        match client.get_resource(&lookup).await {
                            Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                                source.clone(),
                                lookup,
                                RelationshipType::Managed,
                                "PipelineRun executes Pipeline",
                            )),
                            Ok(None) => {}
                            Err(e) => {
                                tracing::debug!("Error finding Pipeline {pipeline_name}: {e}")
                            }
                        }
                    }
                }

                for task_run in find_resources_by_label(
                    client,
                    "TaskRun",
                    namespace,
                    &[("tekton.dev/pipelineRun", name)],
                )
                .await
                {
                    let Some(tr_name) = name_of(&task_run) else { continue };
                    if let Ok(target) = ResourceIdentifier::new("TaskRun", tr_name, namespace) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::TektonRun,
                            "PipelineRun created TaskRun",
                        ));
                    }
                }
            }
            Some("TaskRun") => {
                let task_name = spec
                    .and_then(|s| s.get("taskRef"))
                    .and_then(|r| r.get("name"))
                    .and_then(|n| n.as_str());
                if let (Some(task_name), Some(client)) = (task_name, client) {
                    if let Ok(lookup) = ResourceIdentifier::new("Task", task_name, namespace) {
                        match client.get_resource(&lookup).await {
                            Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                                source.clone(),
                                lookup,
                                RelationshipType::Managed,
                                "TaskRun executes Task",
                            )),
                            Ok(None) => {}
                            Err(e) => tracing::debug!("Error finding Task {task_name}: {e}"),
                        }
                    }
                }

                for pod in find_resources_by_label(
                    client,
                    "Pod",
                    namespace,
                    &[("tekton.dev/taskRun", name)],
                )
                .await
                {
                    let Some(pod_name) = name_of(&pod) else { continue };
                    if let Ok(target) = ResourceIdentifier::new("Pod", pod_name, namespace) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::TektonRun,
                            "TaskRun created Pod",
                        ));
                    }
                }

                let workspaces = spec
                    .and_then(|s| s.get("workspaces"))
                    .and_then(|w| w.as_array())
                    .map(|w| w.as_slice())
                    .unwrap_or_default();
                for workspace in workspaces {
                    let Some(claim_name) = workspace
                        .get("persistentVolumeClaim")
                        .and_then(|p| p.get("claimName"))
                        .and_then(|n| n.as_str())
                    else {
                        continue;
                    };
                    if let Ok(target) =
                        ResourceIdentifier::new("PersistentVolumeClaim", claim_name, namespace)
                    {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::Pvc,
                            "TaskRun uses workspace PVC",
                        ));
                    }
                }
            }
            _ => {}
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}
