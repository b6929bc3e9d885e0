use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::attendance::{
    AttendanceRecord, AttendanceReport, ClockInRequest, ClockOutRequest, HistoryQuery,
    RecordRequest, RecordUpdateRequest, TodayStatus,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub employee_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn clock_in(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ClockInRequest>,
) -> ApiResult<AttendanceRecord> {
    let record = state
        .services
        .attendance
        .clock_in(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::message(record, "Clocked in successfully")))
}

pub async fn clock_out(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ClockOutRequest>,
) -> ApiResult<AttendanceRecord> {
    let record = state
        .services
        .attendance
        .clock_out(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::message(record, "Clocked out successfully")))
}

pub async fn today_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<TodayStatus> {
    let status = state.services.attendance.today_status(&auth_user).await?;
    Ok(Json(ApiResponse::success(status)))
}

pub async fn history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<PaginatedResponse<AttendanceRecord>> {
    let page = state.services.attendance.history(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<AttendanceReport> {
    let report = state
        .services
        .attendance
        .report(&auth_user, query.employee_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn create_record(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<RecordRequest>,
) -> CreatedResult<AttendanceRecord> {
    let record = state.services.attendance.create_record(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn update_record(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordUpdateRequest>,
) -> ApiResult<AttendanceRecord> {
    let record = state.services.attendance.update_record(id, payload).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn delete_record(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.attendance.delete_record(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Attendance record deleted successfully"
    }))))
}
