//! Authorization: hierarchical RBAC plus organization scoping.
//!
//! - `catalog`: configured roles, grants, inheritance and ranks
//! - `evaluator`: effective permissions and seniority checks
//! - `hierarchy`: organization lookups, one level of children
//! - `scope`: which organizations a principal may see
//! - `guard`: the per-request gate the services go through

mod catalog;
mod evaluator;
mod guard;
mod hierarchy;
mod principal;
mod registry;
mod scope;

pub use catalog::{
    normalize_role, CatalogConfig, CatalogError, PermissionCatalog, RoleDefinition,
    CATALOG_PATH_ENV,
};
pub use evaluator::RbacEvaluator;
pub use guard::{ensure_in_scope, AccessGuard};
pub use hierarchy::{
    ConnectionOrganizationStore, MemoryOrganizationStore, OrganizationHierarchy, OrganizationNode, OrganizationStore,
    SqliteOrganizationStore,
};
pub use principal::Principal;
pub use registry::RbacRegistry;
pub use scope::{AccessScope, ScopeResolver};

/// Role names of the reference catalog.
pub mod roles {
    pub const OWNER: &str = "owner";
    pub const ADMIN: &str = "admin";
    pub const VIEWER: &str = "viewer";
}

/// Permission identifiers checked by the services.
pub mod permissions {
    // Task
    pub const TASK_CREATE: &str = "task:create";
    pub const TASK_READ: &str = "task:read";
    pub const TASK_UPDATE: &str = "task:update";
    pub const TASK_UPDATE_STATUS: &str = "task:update_status";
    pub const TASK_DELETE: &str = "task:delete";

    // Audit
    pub const AUDIT_READ: &str = "audit:read";

    // Organization
    pub const ORG_CREATE: &str = "organization:create";
    pub const ORG_UPDATE: &str = "organization:update";

    // User
    pub const USER_READ: &str = "user:read";
    pub const USER_CREATE: &str = "user:create";
    pub const USER_UPDATE: &str = "user:update";
    pub const USER_RESET_PASSWORD: &str = "user:reset-password";
}
