//! FluxCD handler
//!
//! Kustomizations and HelmReleases label what they apply with
//! `kustomize.toolkit.fluxcd.io/name` and declare where their content comes
//! from via `spec.sourceRef` (GitRepository, HelmRepository, OCIRepository).

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct FluxCdHandler;

#[async_trait]
impl Discoverer for FluxCdHandler {
    fn name(&self) -> &'static str {
        "fluxcd"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("HelmRelease") | Some("Kustomization") | Some("GitRepository")
                | Some("HelmRepository")
        ) && api_version_of(resource).contains("fluxcd.io")
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

        if matches!(kind, Some("HelmRelease") | Some("Kustomization")) && namespace.is_some() {
            let flux_label = [("kustomize.toolkit.fluxcd.io/name", name)];
            for res_kind in [
                "Deployment",
                "StatefulSet",
                "DaemonSet",
                "Service",
                "ConfigMap",
                "Secret",
            ] {
                for res in
                    find_resources_by_label(client, res_kind, namespace, &flux_label).await
                {
                    let Some(res_name) = name_of(&res) else { continue };
                    if let Ok(target) = ResourceIdentifier::new(res_kind, res_name, namespace) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::FluxManaged,
                            format!("Managed by Flux {} {name}", kind.unwrap_or_default()),
                        ));
                    }
                }
            }
        }

        // Chase the declared source (chart or git repository)
        let source_ref = match kind {
            Some("HelmRelease") => spec
                .and_then(|s| s.get("chart"))
                .and_then(|c| c.get("spec"))
                .and_then(|cs| cs.get("sourceRef")),
            Some("Kustomization") => spec.and_then(|s| s.get("sourceRef")),
            _ => None,
        };
        if let (Some(source_ref), Some(client)) = (source_ref, client) {
            let default_kind = if kind == Some("HelmRelease") {
                "HelmRepository"
            } else {
                "GitRepository"
            };
            let ref_kind = source_ref
                .get("kind")
                .and_then(|k| k.as_str())
                .unwrap_or(default_kind);
            let ref_name = source_ref.get("name").and_then(|n| n.as_str());
            let ref_namespace = source_ref
                .get("namespace")
                .and_then(|n| n.as_str())
                .or(namespace);

            if let Some(ref_name) = ref_name {
                if let Ok(lookup) = ResourceIdentifier::new(ref_kind, ref_name, ref_namespace) {
                    match client.get_resource(&lookup).await {
                        Ok(Some(_)) => {
                            let details = if kind == Some("HelmRelease") {
                                "Helm chart source"
                            } else {
                                "Git repository source"
                            };
                            relationships.push(ResourceRelationship::new(
                                source,
                                lookup,
                                RelationshipType::Managed,
                                details,
                            ));
                        }
                        Ok(None) => {}
                        Err(e) => tracing::debug!("Error finding Flux source: {e}"),
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
        &["HelmRelease", "Kustomization", "GitRepository", "HelmRepository"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "HelmRelease" => Some(CrdInfo::new("helm.toolkit.fluxcd.io", "v2", "helmreleases")),
            "Kustomization" => Some(CrdInfo::new(
                "kustomize.toolkit.fluxcd.io",
                "v1",
                "kustomizations",
            )),
            "GitRepository" => Some(CrdInfo::new(
                "source.toolkit.fluxcd.io",
                "v1",
                "gitrepositories",
            )),
            "HelmRepository" => Some(CrdInfo::new(
                "source.toolkit.fluxcd.io",
                "v1",
                "helmrepositories",
            )),
            _ => None,
        }
    }
}
