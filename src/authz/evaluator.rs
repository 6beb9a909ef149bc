use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::catalog::{normalize_role, PermissionCatalog};

/// Hierarchical RBAC evaluator over one immutable catalog.
///
/// Effective permission sets are computed once per known role when the
/// evaluator is built; unknown roles resolve to the empty set.
///
/// Decision rules:
/// 1. role names are compared after trim + lowercase
/// 2. a role holds its direct grants plus those of every ancestor
/// 3. unknown or blank roles hold nothing and rank 0
#[derive(Debug, Clone)]
pub struct RbacEvaluator {
    catalog: Arc<PermissionCatalog>,
    effective: HashMap<String, Arc<BTreeSet<String>>>,
}

impl RbacEvaluator {
    pub fn new(catalog: PermissionCatalog) -> Self {
        let effective = catalog
            .role_names()
            .into_iter()
            .map(|name| (name.to_string(), Arc::new(collect_chain(&catalog, name))))
            .collect();

        Self {
            catalog: Arc::new(catalog),
            effective,
        }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Every permission reachable from `role` through zero or more
    /// inheritance steps.
    pub fn effective_permissions(&self, role: &str) -> BTreeSet<String> {
        self.effective
            .get(&normalize_role(role))
            .map(|set| set.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn has_permission(&self, role: &str, permission: &str) -> bool {
        let allowed = self
            .effective
            .get(&normalize_role(role))
            .map(|set| set.contains(permission))
            .unwrap_or(false);

        tracing::debug!(role = %role, permission = %permission, allowed, "rbac check");
        allowed
    }

    /// `true` when any of `permissions` is held.
    pub fn has_any_permission(&self, role: &str, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(role, p))
    }

    /// Seniority comparison, independent of inheritance.
    pub fn has_role_or_above(&self, role: &str, required_role: &str) -> bool {
        self.catalog.rank_of(role) >= self.catalog.rank_of(required_role)
    }

    pub fn is_top_role(&self, role: &str) -> bool {
        normalize_role(role) == self.catalog.top_role()
    }
}

/// Walks the parent chain from `role`, collecting direct grants. The visited
/// set stops the walk if the chain ever loops.
pub(crate) fn collect_chain(catalog: &PermissionCatalog, role: &str) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    let mut permissions = BTreeSet::new();
    let mut current = Some(normalize_role(role));

    while let Some(name) = current.take() {
        if name.is_empty() || !seen.insert(name.clone()) {
            break;
        }
        let Some(entry) = catalog.entry(&name) else { break };
        permissions.extend(entry.direct.iter().cloned());
        current = entry.parent.clone();
    }

    permissions
}
