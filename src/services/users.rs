use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::ServiceContext;
use crate::audit;
use crate::authz::permissions::{USER_CREATE, USER_READ, USER_RESET_PASSWORD, USER_UPDATE};
use crate::authz::{
    ensure_in_scope, normalize_role, AccessScope, CatalogConfig, ConnectionOrganizationStore, OrganizationStore,
    PermissionCatalog,
};
use crate::db::{push_scope_filter, WriteTransaction};
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, PasswordResetRequest, User, UserCreateRequest, UserUpdateRequest};
use crate::utils::{hash_password, normalize_email, utc_now};

const EMAIL_TAKEN: &str = "Email already registered";

const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.role, u.organization_id, u.created_at, u.updated_at";

pub async fn list(ctx: &ServiceContext<'_>, organization_id: Option<Uuid>) -> AppResult<Vec<User>> {
    let scope = ctx
        .guard()
        .authorize(USER_READ, "Cannot list users")
        .await?
        .narrow(organization_id);

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {USER_COLUMNS} FROM users u WHERE 1 = 1"));
    push_scope_filter(&mut builder, "u.organization_id", &scope);
    builder.push(" ORDER BY u.email ASC");

    let rows = builder.build_query_as::<DbUser>().fetch_all(ctx.pool).await?;
    Ok(rows.into_iter().map(User::from).collect())
}

pub async fn create(ctx: &ServiceContext<'_>, payload: UserCreateRequest) -> AppResult<User> {
    let guard = ctx.guard();
    let scope = guard.authorize(USER_CREATE, "Cannot create users").await?;

    let email = validate_email(&payload.email)?;
    let role = assignable_role(ctx, &payload.role)?;
    let organization_id = payload.organization_id.or(ctx.principal.organization_id);
    match organization_id {
        Some(id) => ensure_in_scope(&scope, id, "Organization")?,
        None if scope.is_unrestricted() => {}
        None => return Err(AppError::bad_request("Organization is required when creating a user")),
    }
    let password_hash = hash_password(&payload.password)?;

    let mut tx = ctx.write().await?;
    if let Some(id) = organization_id {
        ensure_org_exists(tx.conn()?, id).await?;
    }
    let user = insert_user(tx.conn()?, &email, &password_hash, &role, organization_id).await?;
    audit::record(
        tx.conn()?,
        ctx.principal.user_id,
        "create",
        &user,
        Some(json!({ "email": user.email, "role": user.role, "organization_id": user.organization_id })),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = %user.role, "user created");
    Ok(user)
}

pub async fn update(ctx: &ServiceContext<'_>, id: Uuid, payload: UserUpdateRequest) -> AppResult<User> {
    let guard = ctx.guard();
    let scope = guard.authorize(USER_UPDATE, "Cannot update users").await?;

    let mut tx = ctx.write().await?;
    let mut user = fetch_scoped(tx.conn()?, id, &scope).await?;

    // Callers may not touch accounts more senior than themselves.
    guard.require_role_or_above(&user.role, "Cannot update users with a higher role")?;

    if let Some(role) = &payload.role {
        user.role = assignable_role(ctx, role)?;
    }
    if let Some(organization_id) = payload.organization_id {
        ensure_in_scope(&scope, organization_id, "Organization")?;
        ensure_org_exists(tx.conn()?, organization_id).await?;
        user.organization_id = Some(organization_id);
    }
    user.updated_at = utc_now();

    sqlx::query("UPDATE users SET role = ?, organization_id = ?, updated_at = ? WHERE id = ?")
        .bind(&user.role)
        .bind(user.organization_id)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(tx.conn()?)
        .await?;

    audit::record(
        tx.conn()?,
        ctx.principal.user_id,
        "update",
        &user,
        Some(json!({ "changes": { "role": payload.role, "organization_id": payload.organization_id } })),
    )
    .await?;
    tx.commit().await?;

    Ok(user)
}

pub async fn reset_password(ctx: &ServiceContext<'_>, id: Uuid, payload: PasswordResetRequest) -> AppResult<()> {
    let guard = ctx.guard();
    let scope = guard.authorize(USER_RESET_PASSWORD, "Cannot reset passwords").await?;
    let password_hash = hash_password(&payload.password)?;

    let mut tx = ctx.write().await?;
    let user = fetch_scoped(tx.conn()?, id, &scope).await?;
    guard.require_role_or_above(&user.role, "Cannot reset passwords for users with a higher role")?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(utc_now())
        .bind(user.id)
        .execute(tx.conn()?)
        .await?;

    audit::record(tx.conn()?, ctx.principal.user_id, "reset_password", &user, None).await?;
    tx.commit().await?;

    Ok(())
}

/// Creates a top-role account with no organization. Used to seed an empty
/// database; refuses to run once any user exists.
pub async fn bootstrap_owner(pool: &SqlitePool, catalog: &CatalogConfig, email: &str, password: &str) -> AppResult<User> {
    let catalog = PermissionCatalog::from_config(catalog)?;
    let email = validate_email(email)?;
    let password_hash = hash_password(password)?;

    let mut tx = WriteTransaction::begin(pool).await?;
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(tx.conn()?)
        .await?;
    if existing > 0 {
        return Err(AppError::conflict("users already exist; create further accounts through the API"));
    }

    let user = insert_user(tx.conn()?, &email, &password_hash, catalog.top_role(), None).await?;
    audit::record(tx.conn()?, user.id, "create", &user, Some(json!({ "bootstrap": true }))).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = %user.role, "owner bootstrapped");
    Ok(user)
}

async fn insert_user(
    conn: &mut SqliteConnection,
    email: &str,
    password_hash: &str,
    role: &str,
    organization_id: Option<Uuid>,
) -> AppResult<User> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
    if taken {
        return Err(AppError::conflict(EMAIL_TAKEN));
    }

    let now = utc_now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role: role.to_string(),
        organization_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, role, organization_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(password_hash)
    .bind(&user.role)
    .bind(user.organization_id)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(AppError::unique_violation(EMAIL_TAKEN))?;

    Ok(user)
}

async fn fetch_scoped(conn: &mut SqliteConnection, id: Uuid, scope: &AccessScope) -> AppResult<User> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = "));
    builder.push_bind(id);
    push_scope_filter(&mut builder, "u.organization_id", scope);

    builder
        .build_query_as::<DbUser>()
        .fetch_optional(&mut *conn)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// The role must exist and must not outrank the caller.
fn assignable_role(ctx: &ServiceContext<'_>, role: &str) -> AppResult<String> {
    let role = normalize_role(role);
    if !ctx.rbac().catalog().contains(&role) {
        return Err(AppError::bad_request(format!("Unknown role: {role}")));
    }
    ctx.guard()
        .require_role_or_above(&role, "Cannot assign a role above your own")?;
    Ok(role)
}

async fn ensure_org_exists(conn: &mut SqliteConnection, organization_id: Uuid) -> AppResult<()> {
    if ConnectionOrganizationStore::new(conn).find_by_id(organization_id).await?.is_none() {
        return Err(AppError::not_found("Organization not found"));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(email)
}
