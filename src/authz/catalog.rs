//! Permission catalog: roles, their direct grants, the inheritance chain and
//! the seniority ranks. Built once from a [`CatalogConfig`] and immutable after.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{permissions, roles};

/// Environment variable pointing at a JSON catalog file.
pub const CATALOG_PATH_ENV: &str = "RBAC_CATALOG_PATH";

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("role name must not be empty")]
    EmptyRoleName,
    #[error("duplicate role: {0}")]
    DuplicateRole(String),
    #[error("role {role} inherits from unknown role {parent}")]
    UnknownParent { role: String, parent: String },
    #[error("role inheritance cycle through {0}")]
    InheritanceCycle(String),
    #[error("role {child} (rank {child_rank}) must outrank its parent {parent} (rank {parent_rank})")]
    RankInversion {
        child: String,
        child_rank: u32,
        parent: String,
        parent_rank: u32,
    },
    #[error("unknown top role: {0}")]
    UnknownTopRole(String),
    #[error("top role {0} is not the unique highest-ranked role")]
    TopRoleNotHighest(String),
    #[error("catalog defines no roles")]
    Empty,
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One role as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub rank: u32,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Role exempt from organization scoping. Defaults to the unique
    /// highest-ranked role.
    #[serde(default)]
    pub top_role: Option<String>,
    pub roles: Vec<RoleDefinition>,
}

impl CatalogConfig {
    /// Reads `RBAC_CATALOG_PATH` when set, otherwise returns the reference catalog.
    pub fn from_env() -> Result<Self, CatalogError> {
        match std::env::var(CATALOG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::reference()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// viewer < admin < owner, each inheriting from the one below.
    pub fn reference() -> Self {
        let role = |name: &str, parent: Option<&str>, rank: u32, perms: &[&str], description: &str| {
            RoleDefinition {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                rank,
                permissions: perms.iter().map(|p| p.to_string()).collect(),
                description: Some(description.to_string()),
            }
        };

        Self {
            top_role: Some(roles::OWNER.to_string()),
            roles: vec![
                role(
                    roles::VIEWER,
                    None,
                    1,
                    &[permissions::TASK_READ, permissions::TASK_UPDATE_STATUS],
                    "Can view tasks and move them between statuses",
                ),
                role(
                    roles::ADMIN,
                    Some(roles::VIEWER),
                    2,
                    &[
                        permissions::TASK_CREATE,
                        permissions::TASK_UPDATE,
                        permissions::TASK_DELETE,
                        permissions::AUDIT_READ,
                        permissions::USER_READ,
                    ],
                    "Full task and audit access",
                ),
                role(
                    roles::OWNER,
                    Some(roles::ADMIN),
                    3,
                    &[
                        permissions::ORG_CREATE,
                        permissions::ORG_UPDATE,
                        permissions::USER_CREATE,
                        permissions::USER_UPDATE,
                        permissions::USER_RESET_PASSWORD,
                    ],
                    "Organization owner",
                ),
            ],
        }
    }
}

/// Lowercased, trimmed role key used for every lookup.
pub fn normalize_role(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub(crate) struct RoleEntry {
    pub name: String,
    pub parent: Option<String>,
    pub rank: u32,
    pub direct: BTreeSet<String>,
    pub description: Option<String>,
}

/// Validated, immutable role table.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    roles: HashMap<String, RoleEntry>,
    top_role: String,
}

impl PermissionCatalog {
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        if config.roles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut roles = HashMap::with_capacity(config.roles.len());
        for def in &config.roles {
            let key = normalize_role(&def.name);
            if key.is_empty() {
                return Err(CatalogError::EmptyRoleName);
            }
            let entry = RoleEntry {
                name: key.clone(),
                parent: def
                    .parent
                    .as_deref()
                    .map(normalize_role)
                    .filter(|p| !p.is_empty()),
                rank: def.rank,
                direct: def.permissions.iter().map(|p| p.trim().to_string()).collect(),
                description: def.description.clone(),
            };
            if roles.insert(key.clone(), entry).is_some() {
                return Err(CatalogError::DuplicateRole(key));
            }
        }

        for entry in roles.values() {
            let Some(parent) = &entry.parent else { continue };
            let parent_entry = roles.get(parent).ok_or_else(|| CatalogError::UnknownParent {
                role: entry.name.clone(),
                parent: parent.clone(),
            })?;
            if entry.rank <= parent_entry.rank {
                return Err(CatalogError::RankInversion {
                    child: entry.name.clone(),
                    child_rank: entry.rank,
                    parent: parent_entry.name.clone(),
                    parent_rank: parent_entry.rank,
                });
            }
        }

        for name in roles.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(name.as_str());
            while let Some(role) = current {
                if !seen.insert(role) {
                    return Err(CatalogError::InheritanceCycle(name.clone()));
                }
                current = roles.get(role).and_then(|r| r.parent.as_deref());
            }
        }

        let top_role = match &config.top_role {
            Some(top) => {
                let key = normalize_role(top);
                if !roles.contains_key(&key) {
                    return Err(CatalogError::UnknownTopRole(key));
                }
                key
            }
            None => highest_ranked(&roles).ok_or(CatalogError::Empty)?,
        };

        let top_rank = roles[&top_role].rank;
        if roles
            .values()
            .any(|r| r.name != top_role && r.rank >= top_rank)
        {
            return Err(CatalogError::TopRoleNotHighest(top_role));
        }

        Ok(Self { roles, top_role })
    }

    /// Permissions granted directly to `role`, not counting inheritance.
    /// Unknown roles have none.
    pub fn direct_permissions(&self, role: &str) -> BTreeSet<String> {
        self.roles
            .get(&normalize_role(role))
            .map(|r| r.direct.clone())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, role: &str) -> Option<&str> {
        self.roles
            .get(&normalize_role(role))
            .and_then(|r| r.parent.as_deref())
    }

    /// Seniority rank; unknown roles rank 0.
    pub fn rank_of(&self, role: &str) -> u32 {
        self.roles
            .get(&normalize_role(role))
            .map(|r| r.rank)
            .unwrap_or(0)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(&normalize_role(role))
    }

    pub fn description_of(&self, role: &str) -> Option<&str> {
        self.roles
            .get(&normalize_role(role))
            .and_then(|r| r.description.as_deref())
    }

    pub fn top_role(&self) -> &str {
        &self.top_role
    }

    pub fn role_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        names.sort_by_key(|name| (self.roles[*name].rank, *name));
        names
    }

    pub(crate) fn entry(&self, role: &str) -> Option<&RoleEntry> {
        self.roles.get(&normalize_role(role))
    }
}

fn highest_ranked(roles: &HashMap<String, RoleEntry>) -> Option<String> {
    roles
        .values()
        .max_by_key(|r| (r.rank, std::cmp::Reverse(r.name.clone())))
        .map(|r| r.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, parent: Option<&str>, rank: u32, perms: &[&str]) -> RoleDefinition {
        RoleDefinition {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            rank,
            permissions: perms.iter().map(|p| p.to_string()).collect(),
            description: None,
        }
    }

    #[test]
    fn reference_catalog_is_valid() {
        let catalog = PermissionCatalog::from_config(&CatalogConfig::reference()).unwrap();
        assert_eq!(catalog.top_role(), "owner");
        assert_eq!(catalog.parent_of("admin"), Some("viewer"));
        assert_eq!(catalog.parent_of("viewer"), None);
        assert_eq!(catalog.role_names(), vec!["viewer", "admin", "owner"]);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let catalog = PermissionCatalog::from_config(&CatalogConfig::reference()).unwrap();
        assert_eq!(catalog.rank_of("OWNER"), 3);
        assert_eq!(catalog.rank_of("  Admin "), 2);
        assert!(catalog.direct_permissions("ViEwEr").contains(permissions::TASK_READ));
    }

    #[test]
    fn unknown_roles_are_empty_not_errors() {
        let catalog = PermissionCatalog::from_config(&CatalogConfig::reference()).unwrap();
        assert!(catalog.direct_permissions("auditor").is_empty());
        assert_eq!(catalog.parent_of("auditor"), None);
        assert_eq!(catalog.rank_of(""), 0);
    }

    #[test]
    fn rejects_cycles() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![
                def("a", Some("b"), 1, &[]),
                def("b", Some("a"), 2, &[]),
            ],
        };
        // Rank validation fires first for a two-role loop; both are write-time errors.
        assert!(PermissionCatalog::from_config(&config).is_err());
    }

    #[test]
    fn rejects_self_inheritance() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![def("a", Some("A"), 1, &[])],
        };
        assert!(matches!(
            PermissionCatalog::from_config(&config),
            Err(CatalogError::RankInversion { .. })
        ));
    }

    #[test]
    fn rejects_unknown_parent_and_duplicates() {
        let unknown = CatalogConfig {
            top_role: None,
            roles: vec![def("a", Some("ghost"), 1, &[])],
        };
        assert!(matches!(
            PermissionCatalog::from_config(&unknown),
            Err(CatalogError::UnknownParent { .. })
        ));

        let duplicate = CatalogConfig {
            top_role: None,
            roles: vec![def("a", None, 1, &[]), def("A", None, 2, &[])],
        };
        assert!(matches!(
            PermissionCatalog::from_config(&duplicate),
            Err(CatalogError::DuplicateRole(_))
        ));
    }

    #[test]
    fn rejects_rank_inversion() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![def("junior", None, 5, &[]), def("senior", Some("junior"), 1, &[])],
        };
        assert!(matches!(
            PermissionCatalog::from_config(&config),
            Err(CatalogError::RankInversion { .. })
        ));
    }

    #[test]
    fn rank_inversion_names_child_and_parent() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![def("lead", None, 3, &[]), def("intern", Some("lead"), 3, &[])],
        };
        let err = PermissionCatalog::from_config(&config).unwrap_err();
        assert_eq!(err.to_string(), "role intern (rank 3) must outrank its parent lead (rank 3)");
    }

    #[test]
    fn child_outranking_parent_is_accepted() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![def("base", None, 1, &[]), def("lead", Some("base"), 2, &[])],
        };
        assert!(PermissionCatalog::from_config(&config).is_ok());
    }

    #[test]
    fn top_role_defaults_to_highest_rank() {
        let config = CatalogConfig {
            top_role: None,
            roles: vec![def("reader", None, 1, &[]), def("root", Some("reader"), 9, &[])],
        };
        let catalog = PermissionCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.top_role(), "root");
    }

    #[test]
    fn explicit_top_role_must_be_highest() {
        let config = CatalogConfig {
            top_role: Some("reader".to_string()),
            roles: vec![def("reader", None, 1, &[]), def("root", None, 9, &[])],
        };
        assert!(matches!(
            PermissionCatalog::from_config(&config),
            Err(CatalogError::TopRoleNotHighest(_))
        ));
    }

    #[test]
    fn parses_json_config() {
        let raw = r#"{
            "roles": [
                {"name": "Member", "rank": 1, "permissions": ["task:read"]},
                {"name": "Lead", "parent": "member", "rank": 2, "permissions": ["task:create"]}
            ]
        }"#;
        let config = CatalogConfig::from_json(raw).unwrap();
        let catalog = PermissionCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.top_role(), "lead");
        assert_eq!(catalog.parent_of("LEAD"), Some("member"));
    }
}
