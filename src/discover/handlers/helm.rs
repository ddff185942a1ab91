//! Helm handler
//!
//! Helm leaves its mark on managed resources via the
//! `meta.helm.sh/release-name` annotation (or the
//! `app.kubernetes.io/managed-by: Helm` label) and stores each release
//! revision in a `sh.helm.release.v1.<name>.v<n>` Secret whose payload is
//! base64 + gzip encoded JSON carrying the rendered manifest.

use super::{annotation_value, kind_of, label_value, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::ResourceClient;
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::io::Read;

const RELEASE_ANNOTATION: &str = "meta.helm.sh/release-name";
const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

pub struct HelmHandler;

#[async_trait]
impl Discoverer for HelmHandler {
    fn name(&self) -> &'static str {
        "helm"
    }

    fn supports(&self, resource: &Value) -> bool {
        annotation_value(resource, RELEASE_ANNOTATION).is_some()
            || label_value(resource, "app.kubernetes.io/managed-by") == Some("Helm")
    }

    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        let release_name = annotation_value(resource, RELEASE_ANNOTATION)
            .or_else(|| label_value(resource, INSTANCE_LABEL));
        let (Some(release_name), Some(namespace), Some(client)) =
            (release_name, namespace_of(resource), client)
        else {
            return Ok(relationships);
        };
        let Ok(source) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };

        // Locate the release storage Secret for this release
        let storage_secret = find_storage_secret(client, namespace, release_name).await;
        if let Some(secret) = &storage_secret {
            if let Some(secret_name) = name_of(secret) {
                if let Ok(target) = ResourceIdentifier::new("Secret", secret_name, Some(namespace))
                {
                    relationships.push(ResourceRelationship::new(
                        source.clone(),
                        target,
                        RelationshipType::HelmManaged,
                        format!("Helm release metadata for {release_name}"),
                    ));
                }
            }
        }

        // Prefer the rendered manifest from release storage; fall back to
        // scanning for siblings that carry the same release marker.
        let mut managed = storage_secret
            .as_ref()
            .and_then(|secret| match manifest_identifiers(secret, namespace) {
                Ok(ids) if !ids.is_empty() => Some(ids),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("Error decoding Helm release manifest: {e}");
                    None
                }
            })
            .unwrap_or_default();
        if managed.is_empty() {
            managed = find_release_siblings(client, namespace, release_name, &source).await;
        }

        for target in managed {
            if target.kind == source.kind && target.name == source.name {
                continue;
            }
            relationships.push(ResourceRelationship::new(
                source.clone(),
                target,
                RelationshipType::HelmManaged,
                format!("Managed by Helm release {release_name}"),
            ));
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }
}

async fn find_storage_secret(
    client: &dyn ResourceClient,
    namespace: &str,
    release_name: &str,
) -> Option<Value> {
    let prefix = format!("sh.helm.release.v1.{release_name}.");
    let page = match client.list_resources("Secret", Some(namespace), None).await {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!("Error finding Helm release Secret: {e}");
            return None;
        }
    };

    // The highest revision suffix is the current release
    page.items
        .into_iter()
        .filter(|secret| {
            let name = name_of(secret).unwrap_or("");
            name.starts_with(&prefix)
                || (label_value(secret, "owner") == Some("helm")
                    && label_value(secret, "name") == Some(release_name))
        })
        .max_by_key(|secret| {
            name_of(secret)
                .and_then(|n| n.rsplit(".v").next())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        })
}

/// Decode a Helm storage Secret and list the resources in its manifest.
///
/// Payload layout: `data.release` is base64 (Kubernetes) wrapping base64
/// (Helm) wrapping optionally-gzipped JSON with a multi-document YAML
/// `manifest` field.
fn manifest_identifiers(
    secret: &Value,
    release_namespace: &str,
) -> anyhow::Result<Vec<ResourceIdentifier>> {
    let engine = base64::engine::general_purpose::STANDARD;

    let encoded = secret
        .get("data")
        .and_then(|d| d.get("release"))
        .and_then(|r| r.as_str())
        .ok_or_else(|| anyhow::anyhow!("Secret missing 'release' key"))?;
    let outer = engine.decode(encoded)?;
    let inner = engine.decode(&outer)?;

    let is_gzipped = inner.len() >= 3 && inner[0] == 0x1f && inner[1] == 0x8b && inner[2] == 0x08;
    let payload = if is_gzipped {
        let mut decoder = flate2::read::GzDecoder::new(&inner[..]);
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf)?;
        buf
    } else {
        inner
    };

    let release: Value = serde_json::from_slice(&payload)?;
    let manifest = release
        .get("manifest")
        .and_then(|m| m.as_str())
        .ok_or_else(|| anyhow::anyhow!("Release JSON missing 'manifest' field"))?;

    let mut identifiers = Vec::new();
    for doc in manifest.split("---\n") {
        let doc = doc.trim();
        if doc.is_empty() {
            continue;
        }
        let parsed: Value = match serde_yaml::from_str(doc) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Failed to parse manifest document: {e}");
                continue;
            }
        };
        let Some(kind) = kind_of(&parsed) else {
            continue;
        };
        let Some(name) = name_of(&parsed) else {
            continue;
        };
        let namespace = namespace_of(&parsed).unwrap_or(release_namespace);
        if let Ok(id) = ResourceIdentifier::new(kind, name, Some(namespace)) {
            identifiers.push(id);
        }
    }

    Ok(identifiers)
}

/// Scan common kinds for resources carrying the same release marker.
async fn find_release_siblings(
    client: &dyn ResourceClient,
    namespace: &str,
    release_name: &str,
    source: &ResourceIdentifier,
) -> Vec<ResourceIdentifier> {
    let mut found = Vec::new();

    for kind in [
        "Deployment",
        "StatefulSet",
        "DaemonSet",
        "Service",
        "ConfigMap",
        "Ingress",
    ] {
        let page = match client.list_resources(kind, Some(namespace), None).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("Error finding Helm-managed {kind} resources: {e}");
                continue;
            }
        };

        for res in &page.items {
            let res_release = annotation_value(res, RELEASE_ANNOTATION)
                .or_else(|| label_value(res, INSTANCE_LABEL));
            if res_release != Some(release_name) {
                continue;
            }
            if name_of(res) == Some(source.name.as_str()) {
                continue;
            }
            if let Some(name) = name_of(res) {
                if let Ok(id) = ResourceIdentifier::new(kind, name, Some(namespace)) {
                    found.push(id);
                }
            }
        }
    }

    found
}
