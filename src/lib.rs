//! kubegraph
//!
//! Discovers relationships among cluster resources (native workloads plus
//! resources from third-party operators) and assembles them into a bounded,
//! deduplicated directed graph for inspection and export.

pub mod builder;
pub mod cli;
pub mod discover;
pub mod graph;
pub mod identity;
pub mod kube;
pub mod models;

// Re-export the types most embedders need
pub use builder::{GraphBuilder, PodSamplingInfo, PodTemplateRecord};
pub use discover::{
    Discoverer, DiscovererRegistry, DiscoveryError, DiscoveryStats, UnifiedDiscoverer,
};
pub use graph::{GraphEdge, GraphNode, ResourceGraph};
pub use identity::IdentityError;
pub use kube::{FetchError, KubernetesClient, ListPage, ResourceClient};
pub use models::{
    BuildOptions, DiscovererCategory, DiscoveryOptions, RelationshipType, ResourceIdentifier,
    ResourceRelationship, ValidationError,
};
