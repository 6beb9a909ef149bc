use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::Loggable;
use crate::errors::AppError;

pub const MAX_CATEGORY_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    /// Board order: work flows left to right, blocked items park at the end.
    pub const ALL: [TaskStatus; 4] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Blocked];

    pub fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(Self::ALL.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            other => Err(AppError::internal(format!("unknown task status in storage: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub category: Option<String>,
    pub order_index: i64,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Task {
    fn entity_type() -> &'static str { "task" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub category: Option<String>,
    pub order_index: i64,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTask> for Task {
    type Error = AppError;

    fn try_from(value: DbTask) -> Result<Self, Self::Error> {
        Ok(Task {
            id: value.id,
            title: value.title,
            description: value.description,
            status: value.status.parse()?,
            category: value.category,
            order_index: value.order_index,
            owner_id: value.owner_id,
            organization_id: value.organization_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Define launch checklist")]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    #[schema(example = "work")]
    pub category: Option<String>,
    /// Used only when the caller has no home organization.
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub order_index: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::Done] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("archived".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_uses_snake_case_json() {
        let json = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(json, "in_progress");
    }
}
