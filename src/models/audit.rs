use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::Severity;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub seq: i64,
    pub user_id: Uuid,
    pub user_email: String,
    #[schema(example = "task.create")]
    pub action: String,
    #[schema(example = "task")]
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAuditLogEntry {
    pub seq: i64,
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub metadata: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub prev_hash: Option<String>,
    pub hash: String,
}

impl TryFrom<DbAuditLogEntry> for AuditLogEntry {
    type Error = AppError;

    fn try_from(value: DbAuditLogEntry) -> Result<Self, Self::Error> {
        let metadata = value
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| AppError::internal(format!("corrupt audit metadata: {err}")))?;

        Ok(AuditLogEntry {
            id: value.id,
            seq: value.seq,
            user_id: value.user_id,
            user_email: value.user_email,
            action: value.action,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            metadata,
            timestamp: value.timestamp,
            severity: value.severity.parse()?,
            prev_hash: value.prev_hash,
            hash: value.hash,
        })
    }
}
