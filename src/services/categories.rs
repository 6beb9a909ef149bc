//! Per-user category picklists. Not organization data, so only
//! authentication is required.

use uuid::Uuid;

use super::ServiceContext;
use crate::errors::{AppError, AppResult};
use crate::models::category::{Category, CategoryCreateRequest};
use crate::models::task::MAX_CATEGORY_LEN;
use crate::utils::utc_now;

/// Global categories first, then the caller's own, each by name.
pub async fn list(ctx: &ServiceContext<'_>) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, user_id, name, created_at FROM categories \
         WHERE user_id IS NULL OR user_id = ? \
         ORDER BY user_id IS NOT NULL, name ASC",
    )
    .bind(ctx.principal.user_id)
    .fetch_all(ctx.pool)
    .await?;

    Ok(categories)
}

/// Returns the caller's existing category of the same name instead of adding
/// a second one. The flag is `true` when a row was inserted.
pub async fn create(ctx: &ServiceContext<'_>, payload: CategoryCreateRequest) -> AppResult<(Category, bool)> {
    let name = validate_name(&payload.name)?;
    let user_id = ctx.principal.user_id;

    let mut tx = ctx.write().await?;
    let existing = sqlx::query_as::<_, Category>(
        "SELECT id, user_id, name, created_at FROM categories WHERE user_id = ? AND name = ?",
    )
    .bind(user_id)
    .bind(&name)
    .fetch_optional(tx.conn()?)
    .await?;
    if let Some(category) = existing {
        tracing::debug!(user_id = %user_id, category = %category.name, "category already present");
        return Ok((category, false));
    }

    let category = Category {
        id: Uuid::new_v4(),
        user_id: Some(user_id),
        name,
        created_at: utc_now(),
    };
    sqlx::query("INSERT INTO categories (id, user_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(category.id)
        .bind(category.user_id)
        .bind(&category.name)
        .bind(category.created_at)
        .execute(tx.conn()?)
        .await
        .map_err(AppError::unique_violation("Category already exists"))?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, category = %category.name, "category created");
    Ok((category, true))
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Category name is required"));
    }
    if name.chars().count() > MAX_CATEGORY_LEN {
        return Err(AppError::bad_request(format!(
            "category must be at most {MAX_CATEGORY_LEN} characters"
        )));
    }
    Ok(name.to_string())
}
