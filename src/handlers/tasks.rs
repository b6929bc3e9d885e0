use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{task, task_comment};
use crate::services::tasks::{
    CommentRequest, CreateTaskRequest, TaskCommentDto, TaskListQuery, UpdateTaskRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

pub async fn list_tasks(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<PaginatedResponse<task::Model>> {
    let page = state.services.tasks.list(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<task::Model> {
    let task = state.services.tasks.get(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> CreatedResult<task::Model> {
    let created = state.services.tasks.create(&auth_user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<task::Model> {
    let updated = state.services.tasks.update(&auth_user, id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.tasks.delete(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Task deleted successfully"
    }))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TaskCommentDto>> {
    let comments = state.services.tasks.list_comments(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(comments)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> CreatedResult<task_comment::Model> {
    let comment = state
        .services
        .tasks
        .add_comment(&auth_user, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(comment))))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<task_comment::Model> {
    let comment = state
        .services
        .tasks
        .update_comment(&auth_user, id, comment_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .tasks
        .delete_comment(&auth_user, id, comment_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Comment deleted successfully"
    }))))
}
