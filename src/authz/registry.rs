use std::sync::{Arc, RwLock};

use super::catalog::{CatalogConfig, CatalogError, PermissionCatalog};
use super::evaluator::RbacEvaluator;

/// Process-wide holder of the current catalog snapshot.
///
/// Readers clone the `Arc` and keep it for the whole request. `reload` builds
/// and validates a complete evaluator before swapping it in, so a reader never
/// sees a half-applied catalog.
#[derive(Debug)]
pub struct RbacRegistry {
    current: RwLock<Arc<RbacEvaluator>>,
}

impl RbacRegistry {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let evaluator = RbacEvaluator::new(PermissionCatalog::from_config(config)?);
        Ok(Self {
            current: RwLock::new(Arc::new(evaluator)),
        })
    }

    pub fn snapshot(&self) -> Arc<RbacEvaluator> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn reload(&self, config: &CatalogConfig) -> Result<(), CatalogError> {
        let next = Arc::new(RbacEvaluator::new(PermissionCatalog::from_config(config)?));
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = next;
        tracing::info!(roles = ?guard.catalog().role_names(), "rbac catalog reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::catalog::RoleDefinition;

    #[test]
    fn snapshots_survive_reload() {
        let registry = RbacRegistry::new(&CatalogConfig::reference()).unwrap();
        let before = registry.snapshot();

        let config = CatalogConfig {
            top_role: None,
            roles: vec![RoleDefinition {
                name: "solo".into(),
                parent: None,
                rank: 1,
                permissions: vec!["task:read".into()],
                description: None,
            }],
        };
        registry.reload(&config).unwrap();

        assert!(before.has_permission("admin", "task:create"));
        let after = registry.snapshot();
        assert!(!after.has_permission("admin", "task:create"));
        assert!(after.is_top_role("solo"));
    }

    #[test]
    fn invalid_reload_keeps_current_catalog() {
        let registry = RbacRegistry::new(&CatalogConfig::reference()).unwrap();
        let bad = CatalogConfig {
            top_role: Some("missing".into()),
            roles: vec![],
        };
        assert!(registry.reload(&bad).is_err());
        assert!(registry.snapshot().has_permission("owner", "user:create"));
    }
}
