use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::audit::AuditLogEntry;
use crate::services::audit;

#[utoipa::path(
    get,
    path = "/audit-log",
    tag = "Audit",
    responses(
        (status = 200, description = "Newest 200 entries whose actor is in scope", body = [AuditLogEntry]),
        (status = 403, description = "Missing audit:read")
    )
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    let entries = audit::list(&state.context(&principal)).await?;
    Ok(Json(entries))
}
