use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::project_member;
use crate::services::projects::{
    CreateProjectRequest, MemberRoleRequest, MemberSpec, ProjectDto, ProjectListQuery,
    ProjectMemberDto, UpdateProjectRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

pub async fn list_projects(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<PaginatedResponse<ProjectDto>> {
    let page = state.services.projects.list(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ProjectDto> {
    let project = state.services.projects.get(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(project)))
}

pub async fn create_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> CreatedResult<ProjectDto> {
    let created = state.services.projects.create(&auth_user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<ProjectDto> {
    let updated = state
        .services
        .projects
        .update(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let message = state.services.projects.delete(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "message": message }))))
}

pub async fn list_members(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ProjectMemberDto>> {
    let members = state.services.projects.list_members(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(members)))
}

pub async fn add_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MemberSpec>,
) -> CreatedResult<project_member::Model> {
    let member = state
        .services
        .projects
        .add_member(&auth_user, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(member))))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, employee_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MemberRoleRequest>,
) -> ApiResult<project_member::Model> {
    let member = state
        .services
        .projects
        .update_member_role(&auth_user, id, employee_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(member)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, employee_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .projects
        .remove_member(&auth_user, id, employee_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Member removed from project"
    }))))
}
