use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::Loggable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Loggable for Organization {
    fn entity_type() -> &'static str { "organization" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOrganization {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbOrganization> for Organization {
    fn from(db: DbOrganization) -> Self {
        Organization {
            id: db.id,
            name: db.name,
            parent_id: db.parent_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrganizationCreateRequest {
    #[schema(example = "Acme Logistics")]
    pub name: String,
    /// Only honoured for callers without a home organization.
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrganizationUpdateRequest {
    /// New parent; `null` makes the organization a root.
    pub parent_id: Option<Uuid>,
}
