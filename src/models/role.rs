use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::RbacEvaluator;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleSummary {
    #[schema(example = "admin")]
    pub name: String,
    pub parent: Option<String>,
    pub rank: u32,
    pub description: Option<String>,
    /// Granted on the role itself.
    pub permissions: Vec<String>,
    /// Including everything inherited from ancestors.
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleCatalogResponse {
    #[schema(example = "owner")]
    pub top_role: String,
    pub roles: Vec<RoleSummary>,
}

impl RoleCatalogResponse {
    /// Roles ordered from least to most senior.
    pub fn from_evaluator(rbac: &RbacEvaluator) -> Self {
        let catalog = rbac.catalog();
        let roles = catalog
            .role_names()
            .into_iter()
            .map(|name| RoleSummary {
                name: name.to_string(),
                parent: catalog.parent_of(name).map(str::to_string),
                rank: catalog.rank_of(name),
                description: catalog.description_of(name).map(str::to_string),
                permissions: catalog.direct_permissions(name).into_iter().collect(),
                effective_permissions: rbac.effective_permissions(name).into_iter().collect(),
            })
            .collect();

        Self {
            top_role: catalog.top_role().to_string(),
            roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{CatalogConfig, PermissionCatalog};

    #[test]
    fn reference_catalog_listing() {
        let rbac = RbacEvaluator::new(PermissionCatalog::from_config(&CatalogConfig::reference()).unwrap());
        let listing = RoleCatalogResponse::from_evaluator(&rbac);

        assert_eq!(listing.top_role, "owner");
        let names: Vec<&str> = listing.roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["viewer", "admin", "owner"]);

        let admin = &listing.roles[1];
        assert_eq!(admin.parent.as_deref(), Some("viewer"));
        assert!(admin.effective_permissions.len() > admin.permissions.len());
    }
}
