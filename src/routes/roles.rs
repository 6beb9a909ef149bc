use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::{CatalogConfig, Principal};
use crate::errors::{AppError, AppResult};
use crate::models::role::RoleCatalogResponse;

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    responses((status = 200, description = "Active role catalog", body = RoleCatalogResponse))
)]
pub async fn list_roles(State(state): State<AppState>, _principal: Principal) -> Json<RoleCatalogResponse> {
    Json(RoleCatalogResponse::from_evaluator(&state.rbac.snapshot()))
}

/// Re-reads the catalog source and swaps it in. Requests already running
/// keep the snapshot they started with.
#[utoipa::path(
    post,
    path = "/roles/reload",
    tag = "Roles",
    responses(
        (status = 200, description = "Catalog reloaded", body = RoleCatalogResponse),
        (status = 403, description = "Top role only"),
        (status = 500, description = "Catalog invalid; previous catalog stays active")
    )
)]
pub async fn reload_roles(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<RoleCatalogResponse>> {
    if !state.rbac.snapshot().is_top_role(&principal.role) {
        return Err(AppError::forbidden("Only the top role may reload the role catalog"));
    }

    let config = CatalogConfig::from_env()?;
    state.rbac.reload(&config)?;
    tracing::info!(user_id = %principal.user_id, roles = config.roles.len(), "role catalog reloaded");

    Ok(Json(RoleCatalogResponse::from_evaluator(&state.rbac.snapshot())))
}
