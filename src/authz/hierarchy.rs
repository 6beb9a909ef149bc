use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::organization::{DbOrganization, Organization};

/// Read access to the organization tree.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Organization>>;

    /// Direct children only.
    async fn find_children(&self, id: Uuid) -> AppResult<Vec<Organization>>;
}

/// An organization together with its immediate children.
#[derive(Debug, Clone)]
pub struct OrganizationNode {
    pub organization: Organization,
    pub children: Vec<Organization>,
}

impl OrganizationNode {
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.organization.id).chain(self.children.iter().map(|c| c.id))
    }
}

pub struct OrganizationHierarchy<'a, S: OrganizationStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: OrganizationStore + ?Sized> OrganizationHierarchy<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The organization plus one level of children, or `None` if it does not exist.
    pub async fn load(&self, id: Uuid) -> AppResult<Option<OrganizationNode>> {
        let Some(organization) = self.store.find_by_id(id).await? else {
            return Ok(None);
        };
        let children = self.store.find_children(id).await?;
        Ok(Some(OrganizationNode {
            organization,
            children,
        }))
    }

    /// Fails if making `parent_id` the parent of `id` would put `id` on its
    /// own ancestor chain.
    pub async fn ensure_acyclic(&self, id: Uuid, parent_id: Uuid) -> AppResult<()> {
        let mut seen = HashSet::new();
        let mut current = Some(parent_id);

        while let Some(ancestor) = current {
            if ancestor == id || !seen.insert(ancestor) {
                return Err(AppError::bad_request("organization hierarchy cycle"));
            }
            current = match self.store.find_by_id(ancestor).await? {
                Some(org) => org.parent_id,
                None => None,
            };
        }

        Ok(())
    }
}

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteOrganizationStore {
    pool: SqlitePool,
}

impl SqliteOrganizationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationStore for SqliteOrganizationStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        select_by_id(&self.pool, id).await
    }

    async fn find_children(&self, id: Uuid) -> AppResult<Vec<Organization>> {
        select_children(&self.pool, id).await
    }
}

/// Reads through one connection, normally the one holding the write lock, so
/// hierarchy checks see exactly the rows the following write will change.
pub struct ConnectionOrganizationStore<'c> {
    conn: Mutex<&'c mut SqliteConnection>,
}

impl<'c> ConnectionOrganizationStore<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

#[async_trait]
impl<'c> OrganizationStore for ConnectionOrganizationStore<'c> {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let mut conn = self.conn.lock().await;
        select_by_id(&mut **conn, id).await
    }

    async fn find_children(&self, id: Uuid) -> AppResult<Vec<Organization>> {
        let mut conn = self.conn.lock().await;
        select_children(&mut **conn, id).await
    }
}

async fn select_by_id<'e, E>(executor: E, id: Uuid) -> AppResult<Option<Organization>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbOrganization>(
        "SELECT id, name, parent_id, created_at, updated_at FROM organizations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Organization::from))
}

async fn select_children<'e, E>(executor: E, id: Uuid) -> AppResult<Vec<Organization>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbOrganization>(
        "SELECT id, name, parent_id, created_at, updated_at FROM organizations WHERE parent_id = ? ORDER BY name",
    )
    .bind(id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Organization::from).collect())
}

/// In-process store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryOrganizationStore {
    orgs: RwLock<HashMap<Uuid, Organization>>,
}

impl MemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts without any hierarchy checks, so tests can build broken trees.
    pub fn insert(&self, org: Organization) {
        if let Ok(mut orgs) = self.orgs.write() {
            orgs.insert(org.id, org);
        }
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let orgs = self
            .orgs
            .read()
            .map_err(|_| AppError::internal("organization store poisoned"))?;
        Ok(orgs.get(&id).cloned())
    }

    async fn find_children(&self, id: Uuid) -> AppResult<Vec<Organization>> {
        let orgs = self
            .orgs
            .read()
            .map_err(|_| AppError::internal("organization store poisoned"))?;
        let mut children: Vec<Organization> = orgs
            .values()
            .filter(|o| o.parent_id == Some(id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(name: &str, parent: Option<Uuid>) -> Organization {
        Organization::new(name, parent)
    }

    #[tokio::test]
    async fn load_returns_one_level_of_children() {
        let store = MemoryOrganizationStore::new();
        let root = org("root", None);
        let child = org("child", Some(root.id));
        let grandchild = org("grandchild", Some(child.id));
        for o in [&root, &child, &grandchild] {
            store.insert(o.clone());
        }

        let node = OrganizationHierarchy::new(&store).load(root.id).await.unwrap().unwrap();
        let ids: Vec<Uuid> = node.ids().collect();
        assert_eq!(ids, vec![root.id, child.id]);
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let store = MemoryOrganizationStore::new();
        let node = OrganizationHierarchy::new(&store).load(Uuid::new_v4()).await.unwrap();
        assert!(node.is_none());
    }

    #[tokio::test]
    async fn ensure_acyclic_rejects_descendant_parent() {
        let store = MemoryOrganizationStore::new();
        let a = org("a", None);
        let b = org("b", Some(a.id));
        let c = org("c", Some(b.id));
        for o in [&a, &b, &c] {
            store.insert(o.clone());
        }
        let hierarchy = OrganizationHierarchy::new(&store);

        assert!(hierarchy.ensure_acyclic(a.id, c.id).await.is_err());
        assert!(hierarchy.ensure_acyclic(a.id, a.id).await.is_err());
        assert!(hierarchy.ensure_acyclic(c.id, a.id).await.is_ok());
        assert!(hierarchy.ensure_acyclic(Uuid::new_v4(), c.id).await.is_ok());
    }

    #[tokio::test]
    async fn ensure_acyclic_terminates_on_existing_loop() {
        let store = MemoryOrganizationStore::new();
        let x_id = Uuid::new_v4();
        let y_id = Uuid::new_v4();
        let mut x = org("x", Some(y_id));
        x.id = x_id;
        let mut y = org("y", Some(x_id));
        y.id = y_id;
        store.insert(x);
        store.insert(y);

        let fresh = Uuid::new_v4();
        let result = OrganizationHierarchy::new(&store).ensure_acyclic(fresh, x_id).await;
        assert!(result.is_err());
    }
}
