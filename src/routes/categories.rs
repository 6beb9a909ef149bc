use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::category::{Category, CategoryCreateRequest};
use crate::services::categories;

#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    responses((status = 200, description = "Global categories followed by the caller's own", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Category>>> {
    let categories = categories::list(&state.context(&principal)).await?;
    Ok(Json(categories))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "Categories",
    request_body = CategoryCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 200, description = "Caller already had this category", body = Category),
        (status = 400, description = "Blank or overlong name")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CategoryCreateRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let (category, created) = categories::create(&state.context(&principal), payload).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(category)))
}
