use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::user::User;

/// The authenticated caller. Role and home organization are read from the
/// user row on every request, never trusted from the token alone.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            user_id,
            email: String::new(),
            role: role.into(),
            organization_id: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    pub fn with_organization(mut self, organization_id: Option<Uuid>) -> Self {
        self.organization_id = organization_id;
        self
    }

    /// The account view of the row the principal was loaded from.
    pub fn to_user(&self) -> User {
        User {
            id: self.user_id,
            email: self.email.clone(),
            role: self.role.clone(),
            organization_id: self.organization_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            role: user.role,
            organization_id: user.organization_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
