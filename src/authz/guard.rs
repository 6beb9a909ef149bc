use uuid::Uuid;

use super::evaluator::RbacEvaluator;
use super::hierarchy::OrganizationStore;
use super::principal::Principal;
use super::scope::{AccessScope, ScopeResolver};
use crate::errors::{AppError, AppResult};

/// Per-request gate used by the services: action checks first, then scope.
///
/// Missing permissions are `Forbidden`; anything outside the resolved scope
/// is `NotFound` so its existence is not confirmed.
pub struct AccessGuard<'a, S: OrganizationStore + ?Sized> {
    rbac: &'a RbacEvaluator,
    store: &'a S,
    principal: &'a Principal,
}

impl<'a, S: OrganizationStore + ?Sized> AccessGuard<'a, S> {
    pub fn new(rbac: &'a RbacEvaluator, store: &'a S, principal: &'a Principal) -> Self {
        Self {
            rbac,
            store,
            principal,
        }
    }

    pub fn principal(&self) -> &Principal {
        self.principal
    }

    pub fn rbac(&self) -> &RbacEvaluator {
        self.rbac
    }

    pub fn can(&self, permission: &str) -> bool {
        self.rbac.has_permission(&self.principal.role, permission)
    }

    pub fn require(&self, permission: &str, message: &str) -> AppResult<()> {
        if self.can(permission) {
            return Ok(());
        }
        tracing::debug!(
            user_id = %self.principal.user_id,
            role = %self.principal.role,
            permission = %permission,
            "permission denied"
        );
        Err(AppError::forbidden(message))
    }

    pub fn require_any(&self, permissions: &[&str], message: &str) -> AppResult<()> {
        if self.rbac.has_any_permission(&self.principal.role, permissions) {
            return Ok(());
        }
        tracing::debug!(
            user_id = %self.principal.user_id,
            role = %self.principal.role,
            permissions = ?permissions,
            "permission denied"
        );
        Err(AppError::forbidden(message))
    }

    pub async fn scope(&self) -> AppResult<AccessScope> {
        ScopeResolver::new(self.rbac, self.store)
            .resolve_scope(self.principal.organization_id, &self.principal.role)
            .await
    }

    /// `require` followed by `scope`.
    pub async fn authorize(&self, permission: &str, message: &str) -> AppResult<AccessScope> {
        self.require(permission, message)?;
        self.scope().await
    }

    /// Caller must hold a role at least as senior as `role`.
    pub fn require_role_or_above(&self, role: &str, message: &str) -> AppResult<()> {
        if self.rbac.has_role_or_above(&self.principal.role, role) {
            Ok(())
        } else {
            Err(AppError::forbidden(message))
        }
    }
}

/// `NotFound` unless `organization_id` is inside `scope`.
pub fn ensure_in_scope(scope: &AccessScope, organization_id: Uuid, what: &str) -> AppResult<()> {
    if scope.allows(organization_id) {
        Ok(())
    } else {
        Err(AppError::not_found(format!("{what} not found")))
    }
}
