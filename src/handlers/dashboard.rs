use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceStatsQuery {
    pub period: Option<String>,
}

pub async fn overview(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<Value> {
    let data = state.services.dashboard.overview(&auth_user).await?;
    Ok(Json(ApiResponse::success(data)))
}

pub async fn task_stats(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<Value> {
    let data = state.services.dashboard.task_stats(&auth_user).await?;
    Ok(Json(ApiResponse::success(data)))
}

pub async fn project_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Value> {
    let data = state.services.dashboard.project_stats(&auth_user).await?;
    Ok(Json(ApiResponse::success(data)))
}

pub async fn attendance_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AttendanceStatsQuery>,
) -> ApiResult<Value> {
    let data = state
        .services
        .dashboard
        .attendance_stats(&auth_user, query.period)
        .await?;
    Ok(Json(ApiResponse::success(data)))
}
