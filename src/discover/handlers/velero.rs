//! Velero handler
//!
//! Backups enumerate the namespaces they cover, Schedules label the Backups
//! they create with `velero.io/schedule-name`, and Restores name their
//! source Backup.

use super::{api_version_of, find_resources_by_label, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct VeleroHandler;

#[async_trait]
impl Discoverer for VeleroHandler {
    fn name(&self) -> &'static str {
        "velero"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("Backup") | Some("Restore") | Some("Schedule")
        ) && api_version_of(resource).contains("velero.io")
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
        let namespace = namespace_of(resource).unwrap_or("velero");
        let spec = resource.get("spec");

        match kind_of(resource) {
            Some("Backup") => {
                let included = spec
                    .and_then(|s| s.get("includedNamespaces"))
                    .and_then(|n| n.as_array())
                    .map(|n| n.as_slice())
                    .unwrap_or_default();
                for ns in included {
                    let Some(ns) = ns.as_str().filter(|ns| *ns != "*") else {
                        continue;
                    };
                    if let Ok(target) = ResourceIdentifier::cluster_scoped("Namespace", ns) {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::VeleroBackup,
                            format!("Backup includes namespace {ns}"),
                        ));
                    }
                }
            }
            Some("Schedule") => {
                let name = name_of(resource).unwrap_or_default();
                for backup in find_resources_by_label(
                    client,
                    "Backup",
                    Some(namespace),
                    &[("velero.io/schedule-name", name)],
                )
                .await
                {
                    let Some(backup_name) = name_of(&backup) else { continue };
                    if let Ok(target) =
                        ResourceIdentifier::new("Backup", backup_name, Some(namespace))
                    {
                        relationships.push(ResourceRelationship::new(
                            source.clone(),
                            target,
                            RelationshipType::Owned,
                            "Schedule created Backup",
                        ));
                    }
                }
            }
            Some("Restore") => {
                let backup_name = spec
                    .and_then(|s| s.get("backupName"))
                    .and_then(|n| n.as_str());
                if let (Some(backup_name), Some(client)) = (backup_name, client) {
                    if let Ok(lookup) =
                        ResourceIdentifier::new("Backup", backup_name, Some(namespace))
                    {
                        match client.get_resource(&lookup).await {
                            Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                                source,
                                lookup,
                                RelationshipType::Managed,
                                "Restore from Backup",
                            )),
                            Ok(None) => {}
                            Err(e) => tracing::debug!("Error finding Backup {backup_name}: {e}"),
                        }
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

    fn crd_kinds(&self) -> &'static [&'static str] {
        &["Backup", "Restore", "Schedule"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "Backup" => Some(CrdInfo::new("velero.io", "v1", "backups")),
            "Restore" => Some(CrdInfo::new("velero.io", "v1", "restores")),
            "Schedule" => Some(CrdInfo::new("velero.io", "v1", "schedules")),
            _ => None,
        }
    }
}
