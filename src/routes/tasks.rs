use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppResult;
use crate::models::task::{Task, TaskCreateRequest, TaskUpdateRequest};
use crate::services::tasks;

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    responses(
        (status = 200, description = "Tasks in the caller's scope", body = [Task]),
        (status = 403, description = "Missing task:read")
    )
)]
pub async fn list_tasks(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Task>>> {
    let tasks = tasks::list(&state.context(&principal)).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid input or no organization"),
        (status = 403, description = "Missing task:create"),
        (status = 404, description = "Organization not in scope")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = tasks::create(&state.context(&principal), payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 404, description = "Task not found or not in scope")
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let task = tasks::get(&state.context(&principal), id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 403, description = "Cannot update tasks"),
        (status = 404, description = "Task not found or not in scope")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let task = tasks::update(&state.context(&principal), id, payload).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Missing task:delete"),
        (status = 404, description = "Task not found or not in scope")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tasks::delete(&state.context(&principal), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
