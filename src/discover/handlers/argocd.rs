//! ArgoCD handler
//!
//! An Application deploys resources into its destination namespace and tags
//! them with the `argocd.argoproj.io/instance` label; it may also belong to
//! an AppProject and reference repository credential Secrets.

use super::{find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct ArgoCdHandler;

#[async_trait]
impl Discoverer for ArgoCdHandler {
    fn name(&self) -> &'static str {
        "argocd"
    }

    fn supports(&self, resource: &Value) -> bool {
        kind_of(resource) == Some("Application")
            && super::api_version_of(resource).starts_with("argoproj.io/")
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
        let spec = resource.get("spec");
        let app_name = name_of(resource).unwrap_or_default();
        let argocd_namespace = namespace_of(resource).unwrap_or("argocd");
        let dest_namespace = spec
            .and_then(|s| s.get("destination"))
            .and_then(|d| d.get("namespace"))
            .and_then(|n| n.as_str());

        if let (Some(dest_namespace), false) = (dest_namespace, app_name.is_empty()) {
            let instance_label = [("argocd.argoproj.io/instance", app_name)];
            for kind in [
                "Deployment",
                "StatefulSet",
                "DaemonSet",
                "Service",
                "ConfigMap",
                "Secret",
                "Ingress",
            ] {
                for res in
                    find_resources_by_label(client, kind, Some(dest_namespace), &instance_label)
                        .await
                {
                    let Some(name) = name_of(&res) else { continue };
                    let Ok(target) = ResourceIdentifier::new(kind, name, Some(dest_namespace))
                    else {
                        continue;
                    };
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::ArgocdManaged,
                        format!("Managed by ArgoCD Application {app_name}"),
                    ));
                }
            }
        }

        // Non-default projects are their own resources worth surfacing
        let project = spec
            .and_then(|s| s.get("project"))
            .and_then(|p| p.as_str())
            .filter(|p| *p != "default");
        if let (Some(project), Some(client)) = (project, client) {
            let lookup = ResourceIdentifier::new("AppProject", project, Some(argocd_namespace))
                .map(|id| id.with_api_version("argoproj.io/v1alpha1"));
            if let Ok(lookup) = lookup {
                match client.get_resource(&lookup).await {
                    Ok(Some(_)) => {
                        if let Ok(target) =
                            ResourceIdentifier::new("AppProject", project, Some(argocd_namespace))
                        {
                            relationships.push(ResourceRelationship::new(
                                source.clone(),
                                target,
                                RelationshipType::Owned,
                                format!("Application belongs to project {project}"),
                            ));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Error finding AppProject: {e}"),
                }
            }
        }

        let repo_url = spec
            .and_then(|s| s.get("source"))
            .and_then(|s| s.get("repoURL"))
            .and_then(|u| u.as_str())
            .unwrap_or("");
        if let Some(client) = client {
            if repo_url.starts_with("git@") || repo_url.contains("git") {
                if let Some(target) = find_repository_secret(client, argocd_namespace).await {
                    relationships.push(ResourceRelationship::new(
                        source,
                        target,
                        RelationshipType::Managed,
                        "Repository credentials",
                    ));
                }
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}

async fn find_repository_secret(
    client: &dyn ResourceClient,
    argocd_namespace: &str,
) -> Option<ResourceIdentifier> {
    let page = match client
        .list_resources("Secret", Some(argocd_namespace), None)
        .await
    {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!("Error finding repository Secret: {e}");
            return None;
        }
    };

    page.items.iter().find_map(|secret| {
        if super::label_value(secret, "argocd.argoproj.io/secret-type") != Some("repository") {
            return None;
        }
        let name = name_of(secret)?;
        ResourceIdentifier::new("Secret", name, Some(argocd_namespace)).ok()
    })
}
