//! RBAC binding discovery
//!
//! Translates RoleBindings and ClusterRoleBindings into edges: one to the
//! referenced role, one per bound subject.

use super::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

/// Discoverer for RBAC binding relationships
pub struct RbacDiscoverer;

#[async_trait]
impl Discoverer for RbacDiscoverer {
    fn name(&self) -> &'static str {
        "rbac"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            resource.get("kind").and_then(|k| k.as_str()),
            Some("RoleBinding") | Some("ClusterRoleBinding")
        )
    }

    async fn discover(
        &self,
        resource: &Value,
        _client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let Ok(source) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };
        let binding_namespace = source.namespace.clone();

        if let Some(role_ref) = resource.get("roleRef") {
            let role_kind = role_ref.get("kind").and_then(|k| k.as_str());
            let role_name = role_ref.get("name").and_then(|n| n.as_str());

            if let (Some(role_kind), Some(role_name)) = (role_kind, role_name) {
                // ClusterRoles are cluster-scoped; Roles live in the binding's namespace
                let role_namespace = if role_kind == "ClusterRole" {
                    None
                } else {
                    binding_namespace.as_deref()
                };
                if let Ok(target) = ResourceIdentifier::new(role_kind, role_name, role_namespace) {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::RbacBinding,
                        format!("{} grants {role_kind}", source.kind),
                    ));
                }
            }
        }

        let subjects = resource
            .get("subjects")
            .and_then(|s| s.as_array())
            .map(|s| s.as_slice())
            .unwrap_or_default();
        for subject in subjects {
            let Some(subject_kind) = subject.get("kind").and_then(|k| k.as_str()) else {
                continue;
            };
            let Some(subject_name) = subject.get("name").and_then(|n| n.as_str()) else {
                continue;
            };

            // ServiceAccount subjects carry their own namespace; User/Group
            // subjects are not namespace-scoped.
            let subject_namespace = match subject_kind {
                "ServiceAccount" => subject
                    .get("namespace")
                    .and_then(|n| n.as_str())
                    .or(binding_namespace.as_deref()),
                _ => None,
            };

            if let Ok(target) =
                ResourceIdentifier::new(subject_kind, subject_name, subject_namespace)
            {
                relationships.push(ResourceRelationship::new(
                    source.clone(),
                    target,
                    RelationshipType::RbacSubject,
                    format!("{} binds {subject_kind}", source.kind),
                ));
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Rbac
    }
}
