//! Istio handler
//!
//! VirtualServices and DestinationRules point at Services through host names
//! (short or `name.namespace.svc` form); Gateways hang off the ingress
//! gateway Service in istio-system.

use super::{api_version_of, kind_of, label_value, name_of, namespace_of};
use crate::discover::{Discoverer, DiscoveryError};
use crate::kube::{CrdInfo, ResourceClient};
use crate::models::{
    DiscovererCategory, RelationshipType, ResourceIdentifier, ResourceRelationship,
};
use async_trait::async_trait;
use serde_json::Value;

pub struct IstioHandler;

#[async_trait]
impl Discoverer for IstioHandler {
    fn name(&self) -> &'static str {
        "istio"
    }

    fn supports(&self, resource: &Value) -> bool {
        matches!(
            kind_of(resource),
            Some("VirtualService") | Some("DestinationRule") | Some("Gateway")
        ) && api_version_of(resource).contains("istio.io")
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
        let Some(client) = client else {
            return Ok(relationships);
        };
        let namespace = namespace_of(resource);
        let spec = resource.get("spec");

        match kind_of(resource) {
            Some("VirtualService") => {
                let routes = spec
                    .and_then(|s| s.get("http"))
                    .and_then(|h| h.as_array())
                    .map(|h| h.as_slice())
                    .unwrap_or_default();
                for route in routes {
                    let destinations = route
                        .get("route")
                        .and_then(|r| r.as_array())
                        .map(|r| r.as_slice())
                        .unwrap_or_default();
                    for destination in destinations {
                        let host = destination
                            .get("destination")
                            .and_then(|d| d.get("host"))
                            .and_then(|h| h.as_str())
                            .unwrap_or("");
                        if host.is_empty() {
                            continue;
                        }
                        if let Some(target) =
                            resolve_service_host(client, host, namespace).await
                        {
                            relationships.push(ResourceRelationship::new(
                                source.clone(),
                                target,
                                RelationshipType::IstioRoute,
                                "VirtualService routes to Service",
                            ));
                        }
                    }
                }
            }
            Some("DestinationRule") => {
                let host = spec
                    .and_then(|s| s.get("host"))
                    .and_then(|h| h.as_str())
                    .unwrap_or("");
                if !host.is_empty() {
                    if let Some(target) = resolve_service_host(client, host, namespace).await {
                        relationships.push(ResourceRelationship::new(
                            source,
                            target,
                            RelationshipType::IstioRoute,
                            "DestinationRule applies to Service",
                        ));
                    }
                }
            }
            Some("Gateway") => {
                match client.list_resources("Service", Some("istio-system"), None).await {
                    Ok(page) => {
                        for service in &page.items {
                            if label_value(service, "istio") != Some("ingressgateway") {
                                continue;
                            }
                            let Some(svc_name) = name_of(service) else { continue };
                            if let Ok(target) = ResourceIdentifier::new(
                                "Service",
                                svc_name,
                                Some("istio-system"),
                            ) {
                                relationships.push(ResourceRelationship::new(
                                    source.clone(),
                                    target,
                                    RelationshipType::IngressBackend,
                                    "Gateway uses Istio ingress",
                                ));
                                break;
                            }
                        }
                    }
                    Err(e) => tracing::debug!("Error finding Istio ingress Service: {e}"),
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
        &["VirtualService", "DestinationRule", "Gateway"]
    }

    fn crd_info(&self, kind: &str) -> Option<CrdInfo> {
        match kind {
            "VirtualService" => Some(CrdInfo::new(
                "networking.istio.io",
                "v1beta1",
                "virtualservices",
            )),
            "DestinationRule" => Some(CrdInfo::new(
                "networking.istio.io",
                "v1beta1",
                "destinationrules",
            )),
            "Gateway" => Some(CrdInfo::new("networking.istio.io", "v1beta1", "gateways")),
            _ => None,
        }
    }
}

/// Parse an Istio destination host and confirm the Service exists.
///
/// `reviews` resolves in the local namespace; `reviews.prod.svc.cluster.local`
/// carries its namespace in the second segment.
async fn resolve_service_host(
    client: &dyn ResourceClient,
    host: &str,
    default_namespace: Option<&str>,
) -> Option<ResourceIdentifier> {
    let (service_name, service_namespace) = match host.split_once('.') {
        Some((name, rest)) => {
            let namespace = rest.split('.').next().filter(|s| !s.is_empty());
            (name, namespace.or(default_namespace))
        }
        None => (host, default_namespace),
    };

    let lookup = ResourceIdentifier::new("Service", service_name, service_namespace).ok()?;
    match client.get_resource(&lookup).await {
        Ok(Some(_)) => Some(lookup),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!("Error finding Service {service_name}: {e}");
            None
        }
    }
}
