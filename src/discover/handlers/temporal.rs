//! Temporal handler
//!
//! Temporal deployments use standard workloads rather than CRDs: worker
//! Deployments/Pods and scheduled CronJobs reach the frontend Service
//! through a TEMPORAL_HOST env var (`temporal-frontend.temporal-main.svc:7233`).

use super::{find_resources_by_label, kind_of, label_value, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct TemporalHandler;

#[async_trait]
impl Discoverer for TemporalHandler {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn supports(&self, resource: &Value) -> bool {
        let component = label_value(resource, "component")
            .unwrap_or("")
            .to_lowercase();

        match kind_of(resource) {
            Some("Deployment") => {
                component.contains("workflow") || component.contains("worker")
            }
            Some("CronJob") => component.contains("workflow"),
            Some("Pod") => {
                let app = label_value(resource, "app").unwrap_or("").to_lowercase();
                component.contains("workflow")
                    || component.contains("worker")
                    || app.contains("workflow")
            }
            Some("Service") => {
                label_value(resource, "app.kubernetes.io/component") == Some("frontend")
                    && label_value(resource, "app.kubernetes.io/name")
                        .unwrap_or("")
                        .contains("temporal")
            }
            _ => false,
        }
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

        match kind_of(resource) {
            Some("Deployment") => {
                if let Some(frontend) = frontend_from_env(resource, namespace) {
                    let host = extract_temporal_host(resource).unwrap_or_default();
                    relationships.push(ResourceRelationship::new(
                        source,
                        frontend,
                        RelationshipType::TemporalWorker,
                        format!("Temporal worker connecting to {host}"),
                    ));
                }
            }
            Some("CronJob") => {
                relationships.extend(discover_scheduled_jobs(resource, &source, client).await);
                if let Some(frontend) = frontend_from_env(resource, namespace) {
                    let host = extract_temporal_host(resource).unwrap_or_default();
                    relationships.push(ResourceRelationship::new(
                        source,
                        frontend,
                        RelationshipType::TemporalWorkflow,
                        format!("Scheduled workflow connects to {host}"),
                    ));
                }
            }
            Some("Pod") => {
                if let Some(frontend) = frontend_from_env(resource, namespace) {
                    let host = extract_temporal_host(resource).unwrap_or_default();
                    relationships.push(ResourceRelationship::new(
                        source,
                        frontend,
                        RelationshipType::TemporalWorker,
                        format!("Worker pod connects to {host}"),
                    ));
                }
            }
            // The frontend Service is the entry point; workers discover it,
            // not the other way around.
            _ => {}
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}

/// Jobs spawned from a scheduling CronJob
async fn discover_scheduled_jobs(
    resource: &Value,
    source: &ResourceIdentifier,
    client: Option<&dyn ResourceClient>,
) -> Vec<ResourceRelationship> {
    let mut relationships = Vec::new();
    let namespace = namespace_of(resource);
    let Some(cronjob_name) = name_of(resource) else {
        return relationships;
    };

    let name_pattern = format!("{cronjob_name}*");
    let jobs = find_resources_by_label(
        client,
        "Job",
        namespace,
        &[("batch.kubernetes.io/job-name", name_pattern.as_str())],
    )
    .await;

    for job in &jobs {
        let Some(job_name) = name_of(job) else { continue };
        if !job_name.contains(cronjob_name) {
            continue;
        }
        if let Ok(target) = ResourceIdentifier::new("Job", job_name, namespace) {
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::TemporalSchedule,
                "CronJob schedules workflow execution via Job",
            ));
        }
    }

    relationships
}

fn frontend_from_env(
    resource: &Value,
    default_namespace: Option<&str>,
) -> Option<ResourceIdentifier> {
    let host = extract_temporal_host(resource)?;
    let (service_name, service_namespace) = parse_temporal_host(&host, default_namespace);
    ResourceIdentifier::new("Service", service_name, service_namespace.as_deref()).ok()
}

/// Pull the TEMPORAL_HOST env var out of whichever container list this kind
/// nests it under.
fn extract_temporal_host(resource: &Value) -> Option<String> {
    let spec = resource.get("spec")?;
    let containers = match kind_of(resource) {
        Some("CronJob") => spec
            .get("jobTemplate")?
            .get("spec")?
            .get("template")?
            .get("spec")?
            .get("containers")?,
        Some("Deployment") | Some("StatefulSet") | Some("DaemonSet") => {
            spec.get("template")?.get("spec")?.get("containers")?
        }
        Some("Pod") => spec.get("containers")?,
        _ => return None,
    };

    for container in containers.as_array()? {
        let env_vars = container
            .get("env")
            .and_then(|e| e.as_array())
            .map(|e| e.as_slice())
            .unwrap_or_default();
        for env_var in env_vars {
            if env_var.get("name").and_then(|n| n.as_str()) == Some("TEMPORAL_HOST") {
                return env_var
                    .get("value")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
            }
        }
    }

    None
}

/// Split a TEMPORAL_HOST value into service name and namespace.
///
/// `temporal-frontend.temporal-main.svc:7233` yields
/// ("temporal-frontend", Some("temporal-main")); a bare service name falls
/// back to the resource's namespace.
fn parse_temporal_host(
    temporal_host: &str,
    default_namespace: Option<&str>,
) -> (String, Option<String>) {
    let host = temporal_host.split(':').next().unwrap_or(temporal_host);
    let mut parts = host.split('.');

    match (parts.next(), parts.next()) {
        (Some(service), Some(namespace)) => {
            (service.to_string(), Some(namespace.to_string()))
        }
        (Some(service), None) => (
            service.to_string(),
            default_namespace.map(|ns| ns.to_string()),
        ),
        _ => (
            host.to_string(),
            default_namespace.map(|ns| ns.to_string()),
        ),
    }
}
