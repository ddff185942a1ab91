//! cert-manager handler
//!
//! A Certificate materializes as a TLS Secret, is issued by an
//! Issuer/ClusterIssuer, and is consumed by Ingresses whose TLS config names
//! the same Secret.

use super::{api_version_of, kind_of, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct CertManagerHandler;

#[async_trait]
impl Discoverer for CertManagerHandler {
    fn name(&self) -> &'static str {
        "cert-manager"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("Certificate") | Some("Issuer") | Some("ClusterIssuer")
                | Some("CertificateRequest")
        ) && api_version_of(resource).contains("cert-manager.io")
    }

    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError> {
        let mut relationships = Vec::new();

        if kind_of(resource) != Some("Certificate") {
            return Ok(relationships);
        }
        let Ok(source) = ResourceIdentifier::from_resource(resource) else {
            return Ok(relationships);
        };
        let Some(client) = client else {
            return Ok(relationships);
        };
        let namespace = namespace_of(resource);
        let spec = resource.get("spec");
        let secret_name = spec
            .and_then(|s| s.get("secretName"))
            .and_then(|n| n.as_str());

        if let Some(secret_name) = secret_name {
            if let Ok(lookup) = ResourceIdentifier::new("Secret", secret_name, namespace) {
                match client.get_resource(&lookup).await {
                    Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                        source.clone(),
                        lookup,
                        RelationshipType::CertIssued,
                        "Certificate stored in Secret",
                    )),
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Error finding Secret {secret_name}: {e}"),
                }
            }
        }

        if let Some(issuer_ref) = spec.and_then(|s| s.get("issuerRef")) {
            let issuer_kind = issuer_ref
                .get("kind")
                .and_then(|k| k.as_str())
                .unwrap_or("Issuer");
            let issuer_name = issuer_ref.get("name").and_then(|n| n.as_str());
            // ClusterIssuers are cluster-scoped
            let issuer_namespace = if issuer_kind == "Issuer" { namespace } else { None };

            if let Some(issuer_name) = issuer_name {
                if let Ok(lookup) =
                    ResourceIdentifier::new(issuer_kind, issuer_name, issuer_namespace)
                {
                    match client.get_resource(&lookup).await {
                        Ok(Some(_)) => relationships.push(ResourceRelationship::new(
                            source.clone(),
                            lookup,
                            RelationshipType::Managed,
                            "Certificate issued by",
                        )),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::debug!("Error finding {issuer_kind} {issuer_name}: {e}")
                        }
                    }
                }
            }
        }

        // Ingresses terminating TLS with this certificate's Secret
        if let (Some(namespace), Some(secret_name)) = (namespace, secret_name) {
            match client.list_resources("Ingress", Some(namespace), None).await {
                Ok(page) => {
                    for ingress in &page.items {
                        let tls_configs = ingress
                            .get("spec")
                            .and_then(|s| s.get("tls"))
                            .and_then(|t| t.as_array())
                            .map(|t| t.as_slice())
                            .unwrap_or_default();
                        let uses_secret = tls_configs.iter().any(|tls| {
                            tls.get("secretName").and_then(|n| n.as_str()) == Some(secret_name)
                        });
                        if !uses_secret {
                            continue;
                        }
                        let Some(ingress_name) = name_of(ingress) else { continue };
                        if let Ok(ingress_id) =
                            ResourceIdentifier::new("Ingress", ingress_name, Some(namespace))
                        {
                            relationships.push(ResourceRelationship::new(
                                ingress_id,
                                source.clone(),
                                RelationshipType::IngressBackend,
                                "Ingress uses Certificate",
                            ));
                        }
                    }
                }
                Err(e) => tracing::debug!("Error finding Ingresses using Certificate: {e}"),
            }
        }

        Ok(relationships)
    }

    fn category(&self) -> DiscovererCategory {
        DiscovererCategory::Crd
    }

    fn crd_kinds(&self) -> &'static [&'static str] {
        &["Certificate", "Issuer", "ClusterIssuer", "CertificateRequest"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "Certificate" => Some(CrdInfo::new("cert-manager.io", "v1", "certificates")),
            "Issuer" => Some(CrdInfo::new("cert-manager.io", "v1", "issuers")),
            "ClusterIssuer" => Some(CrdInfo::new("cert-manager.io", "v1", "clusterissuers")),
            "CertificateRequest" => {
                Some(CrdInfo::new("cert-manager.io", "v1", "certificaterequests"))
            }
            _ => None,
        }
    }
}
