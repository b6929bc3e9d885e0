use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::{payroll, salary};
use crate::services::payroll::{
    CreatePayrollRequest, CreateSalaryRequest, Payslip, PayslipRequest, PayrollListQuery,
    UpdatePayrollRequest,
};
use crate::{ApiResponse, ApiResult, AppState, CreatedResult, ListQuery, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    summary = "List payroll records",
    params(
        ("page" = Option<u64>, Query),
        ("limit" = Option<u64>, Query),
        ("employee_id" = Option<Uuid>, Query),
        ("status" = Option<String>, Query, description = "draft, processed, paid or cancelled"),
    ),
    responses((status = 200, body = ApiResponse<PaginatedResponse<payroll::Model>>)),
    security(("Bearer" = []))
)]
pub async fn list_payrolls(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<PayrollListQuery>,
) -> ApiResult<PaginatedResponse<payroll::Model>> {
    let page = state.services.payroll.list_payrolls(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_payroll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<payroll::Model> {
    let record = state.services.payroll.get_payroll(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn my_payrolls(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<payroll::Model>> {
    let page = state
        .services
        .payroll
        .my_payrolls(&auth_user, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll",
    summary = "Create a draft payroll for an employee",
    request_body = CreatePayrollRequest,
    responses((status = 201, body = ApiResponse<payroll::Model>), (status = 400)),
    security(("Bearer" = []))
)]
pub async fn create_payroll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePayrollRequest>,
) -> CreatedResult<payroll::Model> {
    let created = state
        .services
        .payroll
        .create_payroll(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_payroll(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePayrollRequest>,
) -> ApiResult<payroll::Model> {
    let updated = state.services.payroll.update_payroll(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll/{id}/process",
    summary = "Move a draft payroll to processed",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = ApiResponse<payroll::Model>), (status = 400)),
    security(("Bearer" = []))
)]
pub async fn process_payroll(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<payroll::Model> {
    let processed = state.services.payroll.process(id).await?;
    Ok(Json(ApiResponse::message(
        processed,
        "Payroll processed successfully",
    )))
}

pub async fn mark_payroll_paid(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<payroll::Model> {
    let paid = state.services.payroll.mark_paid(id).await?;
    Ok(Json(ApiResponse::message(paid, "Payroll marked as paid")))
}

pub async fn cancel_payroll(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<payroll::Model> {
    let cancelled = state.services.payroll.cancel(id).await?;
    Ok(Json(ApiResponse::success(cancelled)))
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll/payslip",
    summary = "Generate a payslip for a payroll record",
    request_body = PayslipRequest,
    responses((status = 200, body = ApiResponse<Payslip>), (status = 403)),
    security(("Bearer" = []))
)]
pub async fn generate_payslip(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<PayslipRequest>,
) -> ApiResult<Payslip> {
    let payslip = state
        .services
        .payroll
        .generate_payslip(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(payslip)))
}

pub async fn list_salaries(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<salary::Model>> {
    let page = state
        .services
        .payroll
        .list_salaries(query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn current_salaries(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<salary::Model>> {
    let salaries = state.services.payroll.current_salaries().await?;
    Ok(Json(ApiResponse::success(salaries)))
}

pub async fn salary_history(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<Vec<salary::Model>> {
    let history = state.services.payroll.salary_history(employee_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn create_salary(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateSalaryRequest>,
) -> CreatedResult<salary::Model> {
    let created = state
        .services
        .payroll
        .create_salary(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}
