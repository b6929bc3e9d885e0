use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::leave_request;
use crate::services::leave::{
    CreateLeaveRequest, LeaveActionRequest, LeaveBalance, LeaveListQuery, UpdateLeaveRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    pub employee_id: Option<Uuid>,
}

pub async fn list_leave_requests(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<LeaveListQuery>,
) -> ApiResult<PaginatedResponse<leave_request::Model>> {
    let page = state.services.leave.list(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<leave_request::Model> {
    let request = state.services.leave.get(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn create_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateLeaveRequest>,
) -> CreatedResult<leave_request::Model> {
    let created = state.services.leave.create(&auth_user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::message(
            created,
            "Leave request submitted successfully",
        )),
    ))
}

pub async fn update_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeaveRequest>,
) -> ApiResult<leave_request::Model> {
    let updated = state.services.leave.update(&auth_user, id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn cancel_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<leave_request::Model> {
    let cancelled = state.services.leave.cancel(&auth_user, id).await?;
    Ok(Json(ApiResponse::message(
        cancelled,
        "Leave request cancelled",
    )))
}

pub async fn review_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeaveActionRequest>,
) -> ApiResult<leave_request::Model> {
    let (reviewed, message) = state.services.leave.review(&auth_user, id, payload).await?;
    Ok(Json(ApiResponse::message(reviewed, message)))
}

pub async fn leave_balance(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<LeaveBalance> {
    let balance = state
        .services
        .leave
        .balance(&auth_user, query.employee_id)
        .await?;
    Ok(Json(ApiResponse::success(balance)))
}
