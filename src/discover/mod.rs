//! Relationship discovery
//!
//! A discoverer inspects one resource body and proposes typed, directed
//! relationships to other resources. Built-in discoverers cover native
//! fields, RBAC bindings and network policies; operator handlers cover the
//! conventions of third-party ecosystems. The registry resolves which
//! discoverers apply to a resource; the unified discoverer runs them and
//! merges results.

pub mod handlers;
pub mod native;
pub mod network;
pub mod rbac;
pub mod registry;
pub mod unified;

pub use native::NativeResourceDiscoverer;
pub use network::NetworkPolicyDiscoverer;
pub use rbac::RbacDiscoverer;
pub use registry::{DiscovererInfo, DiscovererRegistry};
pub use unified::{DiscoveryStats, UnifiedDiscoverer};

use crate::kube::{CrdInfo, FetchError, ResourceClient};
use crate::models::{DiscovererCategory, ResourceRelationship, ValidationError};
use async_trait::async_trait;
use serde_json::Value;

/// A single discoverer failed as a whole.
///
/// Partial failures (one enrichment lookup out of many) are handled inside
/// each discoverer; this error means the discoverer produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("fetch failed during discovery: {0}")]
    Fetch(#[from] FetchError),

    #[error("malformed resource: {0}")]
    Invalid(#[from] ValidationError),
}

/// Capability to discover relationships for resources.
///
/// `supports` is a pure predicate: no I/O, no panics. `discover` may reach
/// back into the cluster through the optional client; with no client it
/// degrades to whatever the resource body alone yields.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Short name used in logs and registry listings.
    fn name(&self) -> &'static str;

    /// Whether this discoverer applies to the given resource.
    fn supports(&self, resource: &Value) -> bool;

    /// Produce the relationships implied by this resource's current state.
    async fn discover(
        &self,
        resource: &Value,
        client: Option<&dyn ResourceClient>,
    ) -> Result<Vec<ResourceRelationship>, DiscoveryError>;

    /// Precedence within a resolution; higher runs (and is reported) first.
    fn priority(&self) -> i32 {
        50
    }

    /// Capability category, gated by discovery option toggles.
    fn category(&self) -> DiscovererCategory;

    /// CRD kinds this discoverer can address, for the CRD registry.
    fn crd_kinds(&self) -> &'static [&'static str] {
        &[]
    }

    /// API addressing info for one of this discoverer's CRD kinds.
    fn crd_info(&self, _kind: &str) -> Option<CrdInfo> {
        None
    }
}

/// Convert an equality label map into a selector string (`app=nginx,env=prod`).
///
/// Keys are sorted so the output is deterministic.
pub(crate) fn label_selector_string(labels: &[(&str, &str)]) -> String {
    let mut pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(",")
}

/// Extract the selector map from a resource field as (key, value) pairs.
pub(crate) fn selector_pairs(selector: &Value) -> Vec<(&str, &str)> {
    selector
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                .collect()
        })
        .unwrap_or_default()
}
