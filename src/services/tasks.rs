use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::ServiceContext;
use crate::audit;
use crate::authz::permissions::{TASK_CREATE, TASK_DELETE, TASK_READ, TASK_UPDATE, TASK_UPDATE_STATUS};
use crate::authz::{ensure_in_scope, AccessScope};
use crate::db::push_scope_filter;
use crate::errors::{AppError, AppResult};
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskStatus, TaskUpdateRequest, MAX_CATEGORY_LEN};
use crate::utils::utc_now;

const TASK_COLUMNS: &str =
    "t.id, t.title, t.description, t.status, t.category, t.order_index, t.owner_id, t.organization_id, t.created_at, t.updated_at";

pub async fn create(ctx: &ServiceContext<'_>, payload: TaskCreateRequest) -> AppResult<Task> {
    let guard = ctx.guard();
    let scope = guard.authorize(TASK_CREATE, "Cannot create tasks").await?;

    let organization_id = ctx
        .principal
        .organization_id
        .or(payload.organization_id)
        .ok_or_else(|| AppError::bad_request("Organization is required when creating a task"))?;
    ensure_in_scope(&scope, organization_id, "Organization")?;

    let title = validate_title(&payload.title)?;
    let category = validate_category(payload.category)?;

    let now = utc_now();
    let task = Task {
        id: Uuid::new_v4(),
        title,
        description: payload.description,
        status: payload.status.unwrap_or_default(),
        category,
        order_index: 0,
        owner_id: ctx.principal.user_id,
        organization_id,
        created_at: now,
        updated_at: now,
    };

    let mut tx = ctx.write().await?;

    // Checked here so a missing organization is a 404, not a foreign key failure.
    let org_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organizations WHERE id = ?)")
        .bind(organization_id)
        .fetch_one(tx.conn()?)
        .await?;
    if !org_exists {
        return Err(AppError::not_found("Organization not found"));
    }

    sqlx::query(
        "INSERT INTO tasks (id, title, description, status, category, order_index, owner_id, organization_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(&task.category)
    .bind(task.order_index)
    .bind(task.owner_id)
    .bind(task.organization_id)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(tx.conn()?)
    .await?;

    audit::record(tx.conn()?, ctx.principal.user_id, "create", &task, Some(json!({ "title": task.title }))).await?;
    tx.commit().await?;

    Ok(task)
}

pub async fn list(ctx: &ServiceContext<'_>) -> AppResult<Vec<Task>> {
    let scope = ctx.guard().authorize(TASK_READ, "Cannot read tasks").await?;

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE 1 = 1"));
    push_scope_filter(&mut builder, "t.organization_id", &scope);
    builder
        .push(" ORDER BY ")
        .push(status_position_sql("t.status"))
        .push(", t.order_index ASC, t.created_at DESC");

    let rows = builder.build_query_as::<DbTask>().fetch_all(ctx.pool).await?;
    rows.into_iter().map(Task::try_from).collect()
}

pub async fn get(ctx: &ServiceContext<'_>, id: Uuid) -> AppResult<Task> {
    let scope = ctx.guard().authorize(TASK_READ, "Cannot read tasks").await?;
    let mut conn = ctx.pool.acquire().await?;
    fetch_scoped(&mut *conn, id, &scope).await
}

/// Full updates need `task:update`. With only `task:update_status` the
/// title, description and category fields are ignored.
pub async fn update(ctx: &ServiceContext<'_>, id: Uuid, payload: TaskUpdateRequest) -> AppResult<Task> {
    let guard = ctx.guard();
    guard.require_any(&[TASK_UPDATE, TASK_UPDATE_STATUS], "Cannot update tasks")?;
    let can_full_update = guard.can(TASK_UPDATE);
    let scope = guard.scope().await?;

    let mut tx = ctx.write().await?;
    let mut task = fetch_scoped(tx.conn()?, id, &scope).await?;

    let TaskUpdateRequest {
        title,
        description,
        category,
        status,
        order_index,
    } = payload;

    if can_full_update {
        if let Some(title) = &title {
            task.title = validate_title(title)?;
        }
        if let Some(description) = &description {
            task.description = Some(description.clone());
        }
        if category.is_some() {
            task.category = validate_category(category.clone())?;
        }
    } else if title.is_some() || description.is_some() || category.is_some() {
        tracing::debug!(
            user_id = %ctx.principal.user_id,
            task_id = %id,
            "status-only update, ignoring content fields"
        );
    }
    if let Some(status) = status {
        task.status = status;
    }
    if let Some(order_index) = order_index {
        task.order_index = order_index;
    }
    task.updated_at = utc_now();

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, category = ?, status = ?, order_index = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.category)
    .bind(task.status.as_str())
    .bind(task.order_index)
    .bind(task.updated_at)
    .bind(task.id)
    .execute(tx.conn()?)
    .await?;

    let changes = if can_full_update {
        json!({ "title": title, "description": description, "category": category, "status": status, "order_index": order_index })
    } else {
        json!({ "status": status, "order_index": order_index })
    };
    audit::record(tx.conn()?, ctx.principal.user_id, "update", &task, Some(json!({ "changes": changes }))).await?;
    tx.commit().await?;

    Ok(task)
}

pub async fn delete(ctx: &ServiceContext<'_>, id: Uuid) -> AppResult<()> {
    let scope = ctx.guard().authorize(TASK_DELETE, "Cannot delete tasks").await?;

    let mut tx = ctx.write().await?;
    let task = fetch_scoped(tx.conn()?, id, &scope).await?;

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task.id)
        .execute(tx.conn()?)
        .await?;

    audit::record(tx.conn()?, ctx.principal.user_id, "delete", &task, None).await?;
    tx.commit().await?;

    Ok(())
}

/// Out-of-scope tasks are reported exactly like missing ones.
async fn fetch_scoped(conn: &mut SqliteConnection, id: Uuid, scope: &AccessScope) -> AppResult<Task> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = "));
    builder.push_bind(id);
    push_scope_filter(&mut builder, "t.organization_id", scope);

    builder
        .build_query_as::<DbTask>()
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
        .and_then(Task::try_from)
}

/// `CASE` expression mapping a status column to its board position.
fn status_position_sql(column: &str) -> String {
    let arms: String = TaskStatus::ALL
        .iter()
        .map(|status| format!(" WHEN '{}' THEN {}", status.as_str(), status.position()))
        .collect();
    format!("CASE {column}{arms} ELSE {} END", TaskStatus::ALL.len())
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    Ok(title.to_string())
}

fn validate_category(category: Option<String>) -> AppResult<Option<String>> {
    match category.map(|c| c.trim().to_string()) {
        Some(c) if c.chars().count() > MAX_CATEGORY_LEN => Err(AppError::bad_request(format!(
            "category must be at most {MAX_CATEGORY_LEN} characters"
        ))),
        Some(c) if c.is_empty() => Ok(None),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_follows_the_board() {
        assert_eq!(
            status_position_sql("t.status"),
            "CASE t.status WHEN 'todo' THEN 0 WHEN 'in_progress' THEN 1 WHEN 'done' THEN 2 WHEN 'blocked' THEN 3 ELSE 4 END"
        );
    }

    #[test]
    fn titles_are_trimmed_and_required() {
        assert_eq!(validate_title("  Ship it ").unwrap(), "Ship it");
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn category_length_is_bounded() {
        assert_eq!(validate_category(Some(" work ".into())).unwrap(), Some("work".into()));
        assert_eq!(validate_category(Some("".into())).unwrap(), None);
        assert!(validate_category(Some("x".repeat(MAX_CATEGORY_LEN + 1))).is_err());
    }
}
