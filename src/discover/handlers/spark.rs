//! Spark operator handler
//!
//! A SparkApplication's driver and executor pods carry the `spark-role` and
//! `sparkoperator.k8s.io/app-name` labels; the application spec mounts
//! ConfigMaps/Secrets as volumes.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct SparkHandler;

#[async_trait]
impl Discoverer for SparkHandler {
    fn name(&self) -> &'static str {
        "spark"
    }

    fn supports(&self, resource: &Value) -> bool {
        kind_of(resource) == Some("SparkApplication")
            && api_version_of(resource).contains("sparkoperator.k8s.io")
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
        let Some(namespace) = namespace_of(resource) else {
            return Ok(relationships);
        };
        let name = name_of(resource).unwrap_or_default();

        for (role, rel_type, details) in [
            ("driver", RelationshipType::SparkDriver, "Spark driver pod"),
            (
                "executor",
                RelationshipType::SparkExecutor,
                "Spark executor pod",
            ),
        ] {
            let labels = [
                ("spark-role", role),
                ("sparkoperator.k8s.io/app-name", name),
            ];
            for pod in find_resources_by_label(client, "Pod", Some(namespace), &labels).await {
                let Some(pod_name) = name_of(&pod) else { continue };
                if let Ok(target) = ResourceIdentifier::new("Pod", pod_name, Some(namespace)) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        rel_type,
                        details,
                    ));
                }
            }
        }

        let volumes = resource
            .get("spec")
            .and_then(|s| s.get("volumes"))
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or_default();
        for volume in volumes {
            if let Some(cm_name) = volume
                .get("configMap")
                .and_then(|cm| cm.get("name"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) = ResourceIdentifier::new("ConfigMap", cm_name, Some(namespace))
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Volume,
                        "Spark volume mount",
                    ));
                }
            }
            if let Some(secret_name) = volume
                .get("secret")
                .and_then(|s| s.get("secretName"))
                .and_then(|n| n.as_str())
            {
                if let Ok(target) =
                    ResourceIdentifier::new("Secret", secret_name, Some(namespace))
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Volume,
                        "Spark volume mount",
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
        &["SparkApplication", "ScheduledSparkApplication"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "SparkApplication" => Some(CrdInfo::new(
                "sparkoperator.k8s.io",
                "v1beta2",
                "sparkapplications",
            )),
            "ScheduledSparkApplication" => Some(CrdInfo::new(
                "sparkoperator.k8s.io",
                "v1beta2",
                "scheduledsparkapplications",
            )),
            _ => None,
        }
    }
}
