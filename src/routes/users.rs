use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::user::{PasswordResetRequest, User, UserCreateRequest, UserUpdateRequest};
use crate::services::users;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Restrict the listing to one organization inside the caller's scope.
    pub organization_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users in the caller's scope", body = [User]),
        (status = 403, description = "Missing user:read")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<User>>> {
    let users = users::list(&state.context(&principal), query.organization_id).await?;
    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Unknown role or invalid input"),
        (status = 403, description = "Missing user:create or role above the caller's"),
        (status = 404, description = "Organization not in scope"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = users::create(&state.context(&principal), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Missing user:update or role above the caller's"),
        (status = 404, description = "User or organization not in scope")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let user = users::update(&state.context(&principal), id, payload).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users/{id}/reset-password",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = PasswordResetRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "Password too short"),
        (status = 403, description = "Missing user:reset-password"),
        (status = 404, description = "User not in scope")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<PasswordResetRequest>,
) -> AppResult<StatusCode> {
    users::reset_password(&state.context(&principal), id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
