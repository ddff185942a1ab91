//! Operator ecosystem handlers
//!
//! One handler per third-party ecosystem, each encoding that operator's
//! relationship conventions: which kinds/labels/annotations identify its
//! resources and how they reference native or other custom resources.

pub mod airflow;
pub mod argo_workflows;
pub mod argocd;
pub mod cert_manager;
pub mod crossplane;
pub mod flux;
pub mod helm;
pub mod istio;
pub mod keda;
pub mod knative;
pub mod prometheus;
pub mod spark;
pub mod tekton;
pub mod temporal;
pub mod velero;

pub use airflow::AirflowHandler;
pub use argo_workflows::ArgoWorkflowsHandler;
pub use argocd::ArgoCdHandler;
pub use cert_manager::CertManagerHandler;
pub use crossplane::CrossplaneHandler;
pub use flux::FluxCdHandler;
pub use helm::HelmHandler;
pub use istio::IstioHandler;
pub use keda::KedaHandler;
pub use knative::KnativeHandler;
pub use prometheus::PrometheusHandler;
pub use spark::SparkHandler;
pub use tekton::TektonHandler;
pub use temporal::TemporalHandler;
pub use velero::VeleroHandler;

use super::{Discoverer, label_selector_string};
use crate::kube::ResourceClient;
use serde_json::{Map, Value};
use std::sync::Arc;

/// All built-in operator handlers
pub fn all_handlers() -> Vec<Arc<dyn Discoverer>> {
    vec![
        Arc::new(HelmHandler),
        Arc::new(ArgoCdHandler),
        Arc::new(ArgoWorkflowsHandler),
        Arc::new(AirflowHandler),
        Arc::new(FluxCdHandler),
        Arc::new(IstioHandler),
        Arc::new(KnativeHandler),
        Arc::new(CertManagerHandler),
        Arc::new(TektonHandler),
        Arc::new(PrometheusHandler),
        Arc::new(KedaHandler),
        Arc::new(VeleroHandler),
        Arc::new(SparkHandler),
        Arc::new(CrossplaneHandler),
        Arc::new(TemporalHandler),
    ]
}

pub(crate) fn kind_of(resource: &Value) -> Option<&str> {
    resource.get("kind").and_then(|k| k.as_str())
}

pub(crate) fn api_version_of(resource: &Value) -> &str {
    resource
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

pub(crate) fn name_of(resource: &Value) -> Option<&str> {
    resource
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str())
}

pub(crate) fn namespace_of(resource: &Value) -> Option<&str> {
    resource
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str())
}

pub(crate) fn labels_of(resource: &Value) -> Option<&Map<String, Value>> {
    resource
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(|l| l.as_object())
}

pub(crate) fn annotations_of(resource: &Value) -> Option<&Map<String, Value>> {
    resource
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.as_object())
}

pub(crate) fn label_value<'a>(resource: &'a Value, key: &str) -> Option<&'a str> {
    labels_of(resource)?.get(key)?.as_str()
}

pub(crate) fn annotation_value<'a>(resource: &'a Value, key: &str) -> Option<&'a str> {
    annotations_of(resource)?.get(key)?.as_str()
}

/// List resources of a kind matching an equality label selector.
///
/// Lookup failures are logged and yield an empty list: handlers enrich on a
/// best-effort basis and never fail outright over one lookup.
pub(crate) async fn find_resources_by_label(
    client: Option<&dyn ResourceClient>,
    kind: &str,
    namespace: Option<&str>,
    labels: &[(&str, &str)],
) -> Vec<Value> {
    let Some(client) = client else {
        return Vec::new();
    };

    let selector = label_selector_string(labels);
    match client
        .list_resources(kind, namespace, Some(&selector))
        .await
    {
        Ok(page) => page.items,
        Err(e) => {
            tracing::warn!("Error finding {kind} resources by label {selector}: {e}");
            Vec::new()
        }
    }
}
