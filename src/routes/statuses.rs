use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::Principal;
use crate::models::task::TaskStatus;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusInfo {
    pub name: TaskStatus,
    /// Column index on the task board.
    pub position: usize,
}

#[utoipa::path(
    get,
    path = "/statuses",
    tag = "Tasks",
    responses((status = 200, description = "Task statuses in board order", body = [StatusInfo]))
)]
pub async fn list_statuses(_principal: Principal) -> Json<Vec<StatusInfo>> {
    let statuses = TaskStatus::ALL
        .iter()
        .map(|status| StatusInfo {
            name: *status,
            position: status.position(),
        })
        .collect();
    Json(statuses)
}
