use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::organization::{Organization, OrganizationCreateRequest, OrganizationUpdateRequest};
use crate::services::organizations;

#[utoipa::path(
    get,
    path = "/organizations",
    tag = "Organizations",
    responses((status = 200, description = "Organizations visible to the caller", body = [Organization]))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<Organization>>> {
    let organizations = organizations::list(&state.context(&principal)).await?;
    Ok(Json(organizations))
}

#[utoipa::path(
    post,
    path = "/organizations",
    tag = "Organizations",
    request_body = OrganizationCreateRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 403, description = "Missing organization:create"),
        (status = 404, description = "Parent organization not found"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create_organization(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<OrganizationCreateRequest>,
) -> AppResult<(StatusCode, Json<Organization>)> {
    let organization = organizations::create(&state.context(&principal), payload).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

#[utoipa::path(
    put,
    path = "/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization id")),
    request_body = OrganizationUpdateRequest,
    responses(
        (status = 200, description = "Organization moved", body = Organization),
        (status = 400, description = "Move would create a cycle"),
        (status = 403, description = "Missing organization:update"),
        (status = 404, description = "Organization or parent not found")
    )
)]
pub async fn update_organization(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrganizationUpdateRequest>,
) -> AppResult<Json<Organization>> {
    let organization = organizations::reparent(&state.context(&principal), id, payload).await?;
    Ok(Json(organization))
}
