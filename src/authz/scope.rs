use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use super::evaluator::RbacEvaluator;
use super::hierarchy::{OrganizationHierarchy, OrganizationStore};
use crate::errors::AppResult;

/// Which organizations a principal may see data for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "organization_ids", rename_all = "snake_case")]
pub enum AccessScope {
    Unrestricted,
    Organizations(BTreeSet<Uuid>),
}

impl AccessScope {
    pub fn empty() -> Self {
        Self::Organizations(BTreeSet::new())
    }

    pub fn only(id: Uuid) -> Self {
        Self::Organizations(BTreeSet::from([id]))
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    pub fn allows(&self, organization_id: Uuid) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Organizations(ids) => ids.contains(&organization_id),
        }
    }

    /// Intersects the scope with an optional caller-supplied filter.
    pub fn narrow(self, filter: Option<Uuid>) -> Self {
        match filter {
            None => self,
            Some(id) if self.allows(id) => Self::only(id),
            Some(_) => Self::empty(),
        }
    }
}

/// Computes a principal's [`AccessScope`] from its role and home organization.
pub struct ScopeResolver<'a, S: OrganizationStore + ?Sized> {
    rbac: &'a RbacEvaluator,
    hierarchy: OrganizationHierarchy<'a, S>,
}

impl<'a, S: OrganizationStore + ?Sized> ScopeResolver<'a, S> {
    pub fn new(rbac: &'a RbacEvaluator, store: &'a S) -> Self {
        Self {
            rbac,
            hierarchy: OrganizationHierarchy::new(store),
        }
    }

    /// Top role sees everything. Otherwise a missing home sees nothing, an
    /// unknown home sees only itself, and a known home sees itself plus its
    /// direct children. Grandchildren are never included.
    pub async fn resolve_scope(
        &self,
        home_organization_id: Option<Uuid>,
        role: &str,
    ) -> AppResult<AccessScope> {
        if self.rbac.is_top_role(role) {
            tracing::debug!(role = %role, "scope unrestricted for top role");
            return Ok(AccessScope::Unrestricted);
        }

        let Some(home) = home_organization_id else {
            tracing::debug!(role = %role, "no home organization, empty scope");
            return Ok(AccessScope::empty());
        };

        let scope = match self.hierarchy.load(home).await? {
            Some(node) => AccessScope::Organizations(node.ids().collect()),
            None => {
                tracing::debug!(organization_id = %home, "home organization not found, narrowing scope");
                AccessScope::only(home)
            }
        };

        tracing::debug!(role = %role, organization_id = %home, scope = ?scope, "scope resolved");
        Ok(scope)
    }
}
