use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, DbUser, LoginRequest, MeResponse, User};
use crate::utils::{normalize_email, verify_password};

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, password_hash, role, organization_id, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(normalize_email(&payload.email))
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(user_id = %db_user.id, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state
        .jwt
        .encode(db_user.id, &db_user.role, db_user.organization_id)?;
    let user = User::from(db_user);

    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user with effective permissions and scope", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<MeResponse>> {
    let user = principal.to_user();
    let ctx = state.context(&principal);
    let permissions = ctx
        .rbac()
        .effective_permissions(&principal.role)
        .into_iter()
        .collect();
    let scope = ctx.guard().scope().await?;

    Ok(Json(MeResponse {
        user,
        permissions,
        scope,
    }))
}
