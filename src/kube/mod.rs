//! Resource fetching
//!
//! The graph engine talks to the cluster through the [`ResourceClient`]
//! trait: get one resource by identifier, or list resources of a kind.
//! Resources are untyped `serde_json::Value` bodies so discoverers can walk
//! arbitrary CRD shapes without generated types.

pub mod client;
pub mod crd_registry;

pub use client::KubernetesClient;
pub use crd_registry::{CrdInfo, CrdRegistry};

use crate::models::ResourceIdentifier;
use async_trait::async_trait;
use serde_json::Value;

/// Errors from the fetch boundary
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("api error: {0}")]
    Api(#[from] kube::Error),

    #[error("failed to serialize resource: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether this error is a permission denial (RBAC 403).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// A page of listed resources plus list metadata
#[derive(Debug, Default)]
pub struct ListPage {
    pub items: Vec<Value>,
    pub resource_version: Option<String>,
}

/// Read access to cluster resources.
///
/// Implementations must return `Ok(None)` for missing resources - absence is
/// a normal condition, not an error. Permission denials surface as
/// [`FetchError::Forbidden`] so callers can record and continue.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a single resource, or `None` if it does not exist.
    async fn get_resource(&self, id: &ResourceIdentifier) -> Result<Option<Value>, FetchError>;

    /// List resources of a kind, optionally namespace-scoped and filtered by
    /// an equality label selector string (`app=nginx,env=prod`).
    async fn list_resources(
        &self,
        kind: &str,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<ListPage, FetchError>;
}
