use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{
    employee_reward, hr_query, mood_entry, performance_feedback, rag_update, task_reward,
};
use crate::services::engagement::{
    AwardRewardRequest, CreateFeedbackRequest, CreateHrQueryRequest, CreateRagUpdateRequest,
    CreateTaskRewardRequest, EmployeeRewardListQuery, FeedbackListQuery, GenerateFeedbackRequest,
    MoodDashboardQuery, MoodListQuery, RagListQuery, RecordMoodRequest, RespondHrQueryRequest,
    TaskRewardListQuery, UpdateFeedbackRequest, UpdateMoodRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize)]
pub struct HrQueryListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub employee_id: Option<Uuid>,
}

// Mood tracking

pub async fn list_moods(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<MoodListQuery>,
) -> ApiResult<PaginatedResponse<mood_entry::Model>> {
    let page = state.services.engagement.list_moods(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn record_mood(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<RecordMoodRequest>,
) -> CreatedResult<mood_entry::Model> {
    let entry = state
        .services
        .engagement
        .record_mood(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

pub async fn update_mood(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMoodRequest>,
) -> ApiResult<mood_entry::Model> {
    let entry = state
        .services
        .engagement
        .update_mood(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

pub async fn mood_dashboard(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<MoodDashboardQuery>,
) -> ApiResult<Value> {
    let data = state
        .services
        .engagement
        .mood_dashboard(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(data)))
}

// Performance feedback

pub async fn list_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<FeedbackListQuery>,
) -> ApiResult<PaginatedResponse<performance_feedback::Model>> {
    let page = state
        .services
        .engagement
        .list_feedback(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn create_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateFeedbackRequest>,
) -> CreatedResult<performance_feedback::Model> {
    let feedback = state
        .services
        .engagement
        .create_feedback(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(feedback))))
}

pub async fn update_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeedbackRequest>,
) -> ApiResult<performance_feedback::Model> {
    let feedback = state
        .services
        .engagement
        .update_feedback(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(feedback)))
}

pub async fn generate_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<GenerateFeedbackRequest>,
) -> ApiResult<performance_feedback::Model> {
    let draft = state
        .services
        .engagement
        .generate_feedback(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::message(
        draft,
        "Feedback draft generated",
    )))
}

// Rewards

pub async fn list_task_rewards(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<TaskRewardListQuery>,
) -> ApiResult<PaginatedResponse<task_reward::Model>> {
    let page = state.services.engagement.list_task_rewards(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn create_task_reward(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTaskRewardRequest>,
) -> CreatedResult<task_reward::Model> {
    let reward = state
        .services
        .engagement
        .create_task_reward(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(reward))))
}

pub async fn list_employee_rewards(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<EmployeeRewardListQuery>,
) -> ApiResult<PaginatedResponse<employee_reward::Model>> {
    let page = state
        .services
        .engagement
        .list_employee_rewards(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn award_reward(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AwardRewardRequest>,
) -> CreatedResult<employee_reward::Model> {
    let awarded = state
        .services
        .engagement
        .award_reward(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(awarded))))
}

pub async fn claim_reward(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<employee_reward::Model> {
    let claimed = state
        .services
        .engagement
        .claim_reward(&auth_user, id)
        .await?;
    Ok(Json(ApiResponse::message(claimed, "Reward claimed")))
}

// HR assistant

pub async fn list_hr_queries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<HrQueryListParams>,
) -> ApiResult<PaginatedResponse<hr_query::Model>> {
    let page = state
        .services
        .engagement
        .list_hr_queries(&auth_user, params.page, params.limit, params.employee_id)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn create_hr_query(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateHrQueryRequest>,
) -> CreatedResult<hr_query::Model> {
    let query = state
        .services
        .engagement
        .create_hr_query(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(query))))
}

pub async fn respond_hr_query(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondHrQueryRequest>,
) -> ApiResult<hr_query::Model> {
    let updated = state
        .services
        .engagement
        .respond_hr_query(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

// Project health

pub async fn list_rag_updates(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<RagListQuery>,
) -> ApiResult<PaginatedResponse<rag_update::Model>> {
    let page = state
        .services
        .engagement
        .list_rag_updates(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn create_rag_update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateRagUpdateRequest>,
) -> CreatedResult<rag_update::Model> {
    let created = state
        .services
        .engagement
        .create_rag_update(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn rag_dashboard(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<Value> {
    let data = state.services.engagement.rag_dashboard(&auth_user).await?;
    Ok(Json(ApiResponse::success(data)))
}
