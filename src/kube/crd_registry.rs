//! CRD registry
//!
//! Central mapping from CRD kind names to their API group/version/plural,
//! populated from the operator handlers so the client can address custom
//! resources without hardcoding every operator's API surface.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// API addressing info for one CRD kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdInfo {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl CrdInfo {
    pub fn new(group: &str, version: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
        }
    }
}

/// Registry of Custom Resource Definitions known to the handlers
#[derive(Debug, Default)]
pub struct CrdRegistry {
    mapping: RwLock<HashMap<String, CrdInfo>>,
}

static GLOBAL_CRD_REGISTRY: OnceLock<Arc<CrdRegistry>> = OnceLock::new();

impl CrdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared process-wide registry, populated from the built-in handlers on
    /// first access.
    pub fn get_global() -> Arc<CrdRegistry> {
        GLOBAL_CRD_REGISTRY
            .get_or_init(|| {
                let registry = CrdRegistry::new();
                for handler in crate::discover::handlers::all_handlers() {
                    registry.register_handler(handler.as_ref());
                }
                Arc::new(registry)
            })
            .clone()
    }

    /// Register every CRD kind a discoverer declares.
    ///
    /// First registration wins: a kind already present with different info is
    /// kept and the conflict logged.
    pub fn register_handler(&self, handler: &dyn crate::discover::Discoverer) {
        let mut mapping = self.mapping.write().expect("crd registry lock poisoned");

        for kind in handler.crd_kinds() {
            let Some(info) = handler.crd_info(kind) else {
                continue;
            };
            match mapping.get(*kind) {
                Some(existing) if *existing != info => {
                    tracing::warn!(
                        "CRD {} already registered as {}/{}, keeping existing",
                        kind,
                        existing.group,
                        existing.version
                    );
                }
                Some(_) => {}
                None => {
                    tracing::debug!("Registered CRD {}: {}/{}", kind, info.group, info.version);
                    mapping.insert(kind.to_string(), info);
                }
            }
        }
    }

    /// Look up CRD addressing info for a kind.
    pub fn get_crd_info(&self, kind: &str) -> Option<CrdInfo> {
        self.mapping
            .read()
            .expect("crd registry lock poisoned")
            .get(kind)
            .cloned()
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.mapping
            .read()
            .expect("crd registry lock poisoned")
            .contains_key(kind)
    }

    pub fn registered_kinds(&self) -> Vec<String> {
        self.mapping
            .read()
            .expect("crd registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.mapping
            .write()
            .expect("crd registry lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::handlers::KedaHandler;

    #[test]
    fn test_register_handler_crds() {
        let registry = CrdRegistry::new();
        registry.register_handler(&KedaHandler);

        assert!(registry.is_registered("ScaledObject"));
        assert!(registry.is_registered("ScaledJob"));

        let info = registry.get_crd_info("ScaledObject").unwrap();
        assert_eq!(info.group, "keda.sh");
        assert_eq!(info.plural, "scaledobjects");
    }

    #[test]
    fn test_unknown_kind() {
        let registry = CrdRegistry::new();
        assert!(registry.get_crd_info("Mystery").is_none());
    }

    #[test]
    fn test_clear() {
        let registry = CrdRegistry::new();
        registry.register_handler(&KedaHandler);
        registry.clear();
        assert!(registry.registered_kinds().is_empty());
    }

    #[test]
    fn test_global_registry_knows_builtin_crds() {
        let registry = CrdRegistry::get_global();
        assert!(registry.is_registered("Certificate"));
        assert!(registry.is_registered("VirtualService"));
    }
}
