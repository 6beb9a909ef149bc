//! Authorization-gated services. Every operation checks the action
//! permission, resolves the caller's scope, and only then touches storage.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::authz::{AccessGuard, Principal, RbacEvaluator, SqliteOrganizationStore};
use crate::db::WriteTransaction;
use crate::errors::AppResult;

pub mod audit;
pub mod categories;
pub mod organizations;
pub mod tasks;
pub mod users;

/// Everything one request needs: the pool, a catalog snapshot held for the
/// whole request, and the caller.
pub struct ServiceContext<'a> {
    pub pool: &'a SqlitePool,
    pub principal: &'a Principal,
    rbac: Arc<RbacEvaluator>,
    store: SqliteOrganizationStore,
}

impl<'a> ServiceContext<'a> {
    pub fn new(pool: &'a SqlitePool, rbac: Arc<RbacEvaluator>, principal: &'a Principal) -> Self {
        Self {
            pool,
            principal,
            rbac,
            store: SqliteOrganizationStore::new(pool.clone()),
        }
    }

    pub fn guard(&self) -> AccessGuard<'_, SqliteOrganizationStore> {
        AccessGuard::new(&self.rbac, &self.store, self.principal)
    }

    pub fn rbac(&self) -> &RbacEvaluator {
        &self.rbac
    }

    /// Opens a transaction holding the database write lock. Checks that guard
    /// a write must run on this connection, not on `store()`.
    pub async fn write(&self) -> AppResult<WriteTransaction> {
        WriteTransaction::begin(self.pool).await
    }
}
