use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A name offered when tagging tasks. Global entries have no `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "work")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryCreateRequest {
    #[schema(example = "errands")]
    pub name: String,
}
