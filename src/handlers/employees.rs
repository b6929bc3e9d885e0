use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::employees::{
    CreateEmployeeRequest, DepartmentRequest, EmployeeDto, EmployeeListQuery, UpdateEmployeeRequest,
};
use crate::{entities::department, ApiResponse, ApiResult, AppState, CreatedResult, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    summary = "List employees",
    params(
        ("page" = Option<u64>, Query, description = "Page number (1-indexed)"),
        ("limit" = Option<u64>, Query, description = "Page size (max 100)"),
        ("department_id" = Option<Uuid>, Query, description = "Filter by department"),
        ("search" = Option<String>, Query, description = "Match against name, email or employee number"),
    ),
    responses((status = 200, body = ApiResponse<PaginatedResponse<EmployeeDto>>)),
    security(("Bearer" = []))
)]
pub async fn list_employees(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<EmployeeListQuery>,
) -> ApiResult<PaginatedResponse<EmployeeDto>> {
    let page = state.services.employees.list(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/me",
    summary = "Profile of the signed-in employee",
    responses((status = 200, body = ApiResponse<EmployeeDto>)),
    security(("Bearer" = []))
)]
pub async fn my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<EmployeeDto> {
    let profile = state.services.employees.my_profile(&auth_user).await?;
    Ok(Json(ApiResponse::success(profile)))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}",
    summary = "Employee detail",
    params(("id" = Uuid, Path)),
    responses((status = 200, body = ApiResponse<EmployeeDto>), (status = 404)),
    security(("Bearer" = []))
)]
pub async fn get_employee(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<EmployeeDto> {
    let employee = state.services.employees.get(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(employee)))
}

#[utoipa::path(
    post,
    path = "/api/v1/employees",
    summary = "Create an employee with a linked user account",
    request_body = CreateEmployeeRequest,
    responses((status = 201, body = ApiResponse<EmployeeDto>), (status = 400)),
    security(("Bearer" = []))
)]
pub async fn create_employee(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<CreateEmployeeRequest>,
) -> CreatedResult<EmployeeDto> {
    let employee = state.services.employees.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(employee))))
}

#[utoipa::path(
    put,
    path = "/api/v1/employees/{id}",
    summary = "Update an employee",
    params(("id" = Uuid, Path)),
    request_body = UpdateEmployeeRequest,
    responses((status = 200, body = ApiResponse<EmployeeDto>), (status = 404)),
    security(("Bearer" = []))
)]
pub async fn update_employee(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> ApiResult<EmployeeDto> {
    let employee = state
        .services
        .employees
        .update(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(employee)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/employees/{id}",
    summary = "Deactivate an employee and disable their account",
    params(("id" = Uuid, Path)),
    responses((status = 200), (status = 404)),
    security(("Bearer" = []))
)]
pub async fn deactivate_employee(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.employees.deactivate(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Employee deactivated successfully"
    }))))
}

pub async fn list_departments(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<department::Model>> {
    let departments = state.services.employees.list_departments().await?;
    Ok(Json(ApiResponse::success(departments)))
}

pub async fn create_department(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<DepartmentRequest>,
) -> CreatedResult<department::Model> {
    let created = state.services.employees.create_department(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_department(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentRequest>,
) -> ApiResult<department::Model> {
    let updated = state
        .services
        .employees
        .update_department(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_department(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.employees.delete_department(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "message": "Department deleted successfully"
    }))))
}
