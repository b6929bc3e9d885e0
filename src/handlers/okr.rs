use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::okr::{
    CreateOkrRequest, OkrDto, OkrListQuery, UpdateKeyResultRequest, UpdateOkrRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize)]
pub struct MyOkrsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
}

pub async fn list_okrs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OkrListQuery>,
) -> ApiResult<PaginatedResponse<OkrDto>> {
    let page = state.services.okr.list(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn my_okrs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<MyOkrsQuery>,
) -> ApiResult<PaginatedResponse<OkrDto>> {
    let page = state
        .services
        .okr
        .my_okrs(&auth_user, query.page, query.limit, query.status)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OkrDto> {
    let okr = state.services.okr.get(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(okr)))
}

#[utoipa::path(
    post,
    path = "/api/v1/okrs",
    summary = "Create a draft OKR with key results",
    request_body = CreateOkrRequest,
    responses((status = 201, body = ApiResponse<OkrDto>), (status = 403)),
    security(("Bearer" = []))
)]
pub async fn create_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateOkrRequest>,
) -> CreatedResult<OkrDto> {
    let created = state.services.okr.create(&auth_user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOkrRequest>,
) -> ApiResult<OkrDto> {
    let updated = state.services.okr.update(&auth_user, id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn activate_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OkrDto> {
    let okr = state.services.okr.activate(&auth_user, id).await?;
    Ok(Json(ApiResponse::message(okr, "OKR activated")))
}

pub async fn complete_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OkrDto> {
    let okr = state.services.okr.complete(&auth_user, id).await?;
    Ok(Json(ApiResponse::message(okr, "OKR completed")))
}

pub async fn cancel_okr(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OkrDto> {
    let okr = state.services.okr.cancel(&auth_user, id).await?;
    Ok(Json(ApiResponse::message(okr, "OKR cancelled")))
}

pub async fn update_key_result(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateKeyResultRequest>,
) -> ApiResult<OkrDto> {
    let okr = state
        .services
        .okr
        .update_key_result(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(okr)))
}
