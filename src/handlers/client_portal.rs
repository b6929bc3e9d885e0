use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::client_access;
use crate::services::client_portal::{
    ClientAccessListQuery, ClientProjectView, CreateClientAccessRequest, UpdateClientAccessRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, ListQuery, PaginatedResponse};

pub async fn list_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ClientAccessListQuery>,
) -> ApiResult<PaginatedResponse<client_access::Model>> {
    let page = state
        .services
        .client_portal
        .list_access(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<client_access::Model> {
    let access = state
        .services
        .client_portal
        .get_access(&auth_user, id)
        .await?;
    Ok(Json(ApiResponse::success(access)))
}

pub async fn create_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateClientAccessRequest>,
) -> CreatedResult<client_access::Model> {
    let created = state
        .services
        .client_portal
        .create_access(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientAccessRequest>,
) -> ApiResult<client_access::Model> {
    let updated = state
        .services
        .client_portal
        .update_access(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn revoke_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .client_portal
        .revoke_access(&auth_user, id)
        .await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Client access revoked"
    }))))
}

pub async fn client_projects(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<ClientProjectView>> {
    let page = state
        .services
        .client_portal
        .client_projects(&auth_user, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn client_project(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientProjectView> {
    let view = state
        .services
        .client_portal
        .client_project(&auth_user, id)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}
