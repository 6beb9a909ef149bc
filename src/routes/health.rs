use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service and database status", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db_ok, db_error) = match query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (true, None),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            (false, Some(err.to_string()))
        }
    };

    Json(HealthResponse {
        status: "ok",
        db_ok,
        db_error,
    })
}
