//! Airflow handler
//!
//! The Airflow operator labels cluster components with
//! `airflow.apache.org/cluster` and worker pods with
//! `airflow.apache.org/component: worker`; log storage PVCs follow the same
//! labeling (or an `airflow` name).

use super::{api_version_of, find_resources_by_label, kind_of, label_value, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct AirflowHandler;

#[async_trait]
impl Discoverer for AirflowHandler {
    fn name(&self) -> &'static str {
        "airflow"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("AirflowCluster") | Some("AirflowBase") | Some("Airflow")
        ) && api_version_of(resource).to_lowercase().contains("airflow")
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
        let (Some(namespace), Some(client)) = (namespace_of(resource), client) else {
            return Ok(relationships);
        };
        let name = name_of(resource).unwrap_or_default();

        let cluster_label = [("airflow.apache.org/cluster", name)];
        for kind in ["StatefulSet", "Deployment"] {
            for res in
                find_resources_by_label(Some(client), kind, Some(namespace), &cluster_label).await
            {
                let Some(res_name) = name_of(&res) else { continue };
                if let Ok(target) = ResourceIdentifier::new(kind, res_name, Some(namespace)) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::Owned,
                        "Airflow cluster component",
                    ));
                }
            }
        }

        for pod in find_resources_by_label(
            Some(client),
            "Pod",
            Some(namespace),
            &[("airflow.apache.org/component", "worker")],
        )
        .await
        {
            let Some(pod_name) = name_of(&pod) else { continue };
            if let Ok(target) = ResourceIdentifier::new("Pod", pod_name, Some(namespace)) {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::AirflowTask,
                    "Airflow worker pod",
                ));
            }
        }

        match client
            .list_resources("PersistentVolumeClaim", Some(namespace), None)
            .await
        {
            Ok(page) => {
                for pvc in &page.items {
                    let Some(pvc_name) = name_of(pvc) else { continue };
                    let labeled =
                        label_value(pvc, "airflow.apache.org/cluster") == Some(name);
                    if !labeled && !pvc_name.to_lowercase().contains("airflow") {
                        continue;
                    }
                    if let Ok(target) = ResourceIdentifier::new(
                        "PersistentVolumeClaim",
                        pvc_name,
                        Some(namespace),
                    ) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::Pvc,
                            "Airflow logs storage",
                        ));
                    }
                }
            }
            Err(e) => tracing::debug!("Error finding Airflow PVCs: {e}"),
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}
