//! PeopleOps API Library
//!
//! Core functionality for the PeopleOps HR and project management API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod request_id;
pub mod services;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::auth::rbac::perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// Common response wrappers
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Result type for resource-creating endpoints; pairs the envelope with a
/// 201 status.
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), errors::ServiceError>;

// API v1 routes, grouped by permission
pub fn api_v1_routes() -> Router<AppState> {
    // Employees and departments
    let employees_read = Router::new()
        .route("/employees", get(handlers::employees::list_employees))
        .route("/employees/me", get(handlers::employees::my_profile))
        .route("/employees/:id", get(handlers::employees::get_employee))
        .route("/departments", get(handlers::employees::list_departments))
        .with_permission(perm::EMPLOYEES_READ);

    let employees_manage = Router::new()
        .route(
            "/employees",
            axum::routing::post(handlers::employees::create_employee),
        )
        .route(
            "/employees/:id",
            axum::routing::delete(handlers::employees::deactivate_employee),
        )
        .with_permission(perm::EMPLOYEES_MANAGE);

    // Updates are tiered in the service: admin/HR edit anything, managers
    // edit name and contact fields of their reports, everyone else edits
    // their own contact fields.
    let employees_update = Router::new()
        .route(
            "/employees/:id",
            axum::routing::put(handlers::employees::update_employee),
        )
        .with_auth();

    let departments_manage = Router::new()
        .route(
            "/departments",
            axum::routing::post(handlers::employees::create_department),
        )
        .route(
            "/departments/:id",
            axum::routing::put(handlers::employees::update_department),
        )
        .route(
            "/departments/:id",
            axum::routing::delete(handlers::employees::delete_department),
        )
        .with_permission(perm::DEPARTMENTS_MANAGE);

    // Attendance
    let attendance_clock = Router::new()
        .route(
            "/attendance/clock-in",
            axum::routing::post(handlers::attendance::clock_in),
        )
        .route(
            "/attendance/clock-out",
            axum::routing::post(handlers::attendance::clock_out),
        )
        .with_permission(perm::ATTENDANCE_CLOCK);

    let attendance_read = Router::new()
        .route("/attendance/today", get(handlers::attendance::today_status))
        .route("/attendance/history", get(handlers::attendance::history))
        .route("/attendance/report", get(handlers::attendance::report))
        .with_permission(perm::ATTENDANCE_READ);

    let attendance_manage = Router::new()
        .route(
            "/attendance/records",
            axum::routing::post(handlers::attendance::create_record),
        )
        .route(
            "/attendance/records/:id",
            axum::routing::put(handlers::attendance::update_record),
        )
        .route(
            "/attendance/records/:id",
            axum::routing::delete(handlers::attendance::delete_record),
        )
        .with_permission(perm::ATTENDANCE_MANAGE);

    // Leave
    let leave_read = Router::new()
        .route("/leave", get(handlers::leave::list_leave_requests))
        .route("/leave/balance", get(handlers::leave::leave_balance))
        .route("/leave/:id", get(handlers::leave::get_leave_request))
        .with_permission(perm::LEAVE_READ);

    let leave_create = Router::new()
        .route("/leave", axum::routing::post(handlers::leave::create_leave_request))
        .route(
            "/leave/:id",
            axum::routing::put(handlers::leave::update_leave_request),
        )
        .route(
            "/leave/:id/cancel",
            axum::routing::post(handlers::leave::cancel_leave_request),
        )
        .with_permission(perm::LEAVE_CREATE);

    let leave_review = Router::new()
        .route(
            "/leave/:id/review",
            axum::routing::post(handlers::leave::review_leave_request),
        )
        .with_permission(perm::LEAVE_REVIEW);

    // Projects
    let projects_read = Router::new()
        .route("/projects", get(handlers::projects::list_projects))
        .route("/projects/:id", get(handlers::projects::get_project))
        .with_permission(perm::PROJECTS_READ);

    // Any employee may create a project; update, delete, and member
    // management require the creator, a project manager member, admin, or
    // HR. The service enforces all of that, so these routes only require a
    // valid token.
    let projects_write = Router::new()
        .route(
            "/projects",
            axum::routing::post(handlers::projects::create_project),
        )
        .route(
            "/projects/:id",
            axum::routing::put(handlers::projects::update_project),
        )
        .route(
            "/projects/:id",
            axum::routing::delete(handlers::projects::delete_project),
        )
        .route(
            "/projects/:id/members",
            get(handlers::projects::list_members)
                .post(handlers::projects::add_member),
        )
        .route(
            "/projects/:id/members/:employee_id",
            axum::routing::put(handlers::projects::update_member_role),
        )
        .route(
            "/projects/:id/members/:employee_id",
            axum::routing::delete(handlers::projects::remove_member),
        )
        .with_auth();

    // Tasks
    let tasks_read = Router::new()
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route("/tasks/:id", get(handlers::tasks::get_task))
        .route("/tasks/:id/comments", get(handlers::tasks::list_comments))
        .with_permission(perm::TASKS_READ);

    // Task writes are tiered in the service: admin/HR everywhere, project
    // members for create and update, the creator or project owner for
    // delete, comment authors for their own comments.
    let tasks_write = Router::new()
        .route("/tasks", axum::routing::post(handlers::tasks::create_task))
        .route(
            "/tasks/:id",
            axum::routing::put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route(
            "/tasks/:id/comments",
            axum::routing::post(handlers::tasks::add_comment),
        )
        .route(
            "/tasks/:id/comments/:comment_id",
            axum::routing::put(handlers::tasks::update_comment)
                .delete(handlers::tasks::delete_comment),
        )
        .with_auth();

    // Dashboard
    let dashboard = Router::new()
        .route("/dashboard", get(handlers::dashboard::overview))
        .route("/dashboard/tasks", get(handlers::dashboard::task_stats))
        .route("/dashboard/projects", get(handlers::dashboard::project_stats))
        .route(
            "/dashboard/attendance",
            get(handlers::dashboard::attendance_stats),
        )
        .with_permission(perm::DASHBOARD_READ);

    // Payroll
    let payroll_read = Router::new()
        .route("/payroll/my", get(handlers::payroll::my_payrolls))
        .route(
            "/payroll/payslip",
            axum::routing::post(handlers::payroll::generate_payslip),
        )
        .route("/payroll/:id", get(handlers::payroll::get_payroll))
        .with_permission(perm::PAYROLL_READ);

    let payroll_manage = Router::new()
        .route("/payroll", get(handlers::payroll::list_payrolls))
        .route("/payroll", axum::routing::post(handlers::payroll::create_payroll))
        .route(
            "/payroll/:id",
            axum::routing::put(handlers::payroll::update_payroll),
        )
        .route(
            "/payroll/:id/process",
            axum::routing::post(handlers::payroll::process_payroll),
        )
        .route(
            "/payroll/:id/pay",
            axum::routing::post(handlers::payroll::mark_payroll_paid),
        )
        .route(
            "/payroll/:id/cancel",
            axum::routing::post(handlers::payroll::cancel_payroll),
        )
        .route("/salaries", get(handlers::payroll::list_salaries))
        .route("/salaries/current", get(handlers::payroll::current_salaries))
        .route(
            "/salaries/history/:employee_id",
            get(handlers::payroll::salary_history),
        )
        .route("/salaries", axum::routing::post(handlers::payroll::create_salary))
        .with_permission(perm::PAYROLL_MANAGE);

    // OKRs
    let okr_read = Router::new()
        .route("/okrs", get(handlers::okr::list_okrs))
        .route("/okrs/my", get(handlers::okr::my_okrs))
        .route("/okrs/:id", get(handlers::okr::get_okr))
        .with_permission(perm::OKR_READ);

    let okr_manage = Router::new()
        .route("/okrs", axum::routing::post(handlers::okr::create_okr))
        .route("/okrs/:id", axum::routing::put(handlers::okr::update_okr))
        .route(
            "/okrs/:id/activate",
            axum::routing::post(handlers::okr::activate_okr),
        )
        .route(
            "/okrs/:id/complete",
            axum::routing::post(handlers::okr::complete_okr),
        )
        .route(
            "/okrs/:id/cancel",
            axum::routing::post(handlers::okr::cancel_okr),
        )
        .route(
            "/okrs/key-results/:id",
            axum::routing::put(handlers::okr::update_key_result),
        )
        .with_permission(perm::OKR_MANAGE);

    // Client access administration. Single-grant reads are only gated by
    // authentication; the service lets clients read their own grants.
    let clients_read = Router::new()
        .route("/client-access/:id", get(handlers::client_portal::get_access))
        .with_auth();

    let clients_manage = Router::new()
        .route("/client-access", get(handlers::client_portal::list_access))
        .route(
            "/client-access",
            axum::routing::post(handlers::client_portal::create_access),
        )
        .route(
            "/client-access/:id",
            axum::routing::put(handlers::client_portal::update_access),
        )
        .route(
            "/client-access/:id",
            axum::routing::delete(handlers::client_portal::revoke_access),
        )
        .with_permission(perm::CLIENTS_MANAGE);

    // Client portal (project views for client users)
    let portal = Router::new()
        .route("/portal/projects", get(handlers::client_portal::client_projects))
        .route(
            "/portal/projects/:id",
            get(handlers::client_portal::client_project),
        )
        .with_permission(perm::PORTAL_READ);

    // Reports
    let reports = Router::new()
        .route("/reports/attendance", get(handlers::reports::attendance_report))
        .route("/reports/leave", get(handlers::reports::leave_report))
        .route("/reports/payroll", get(handlers::reports::payroll_report))
        .route("/reports/projects", get(handlers::reports::project_report))
        .with_permission(perm::REPORTS_READ);

    // Engagement: moods, feedback, rewards, HR queries, project health
    let engagement_read = Router::new()
        .route("/moods", get(handlers::engagement::list_moods))
        .route("/moods/dashboard", get(handlers::engagement::mood_dashboard))
        .route("/feedback", get(handlers::engagement::list_feedback))
        .route("/rewards/tasks", get(handlers::engagement::list_task_rewards))
        .route(
            "/rewards/employees",
            get(handlers::engagement::list_employee_rewards),
        )
        .route("/hr-queries", get(handlers::engagement::list_hr_queries))
        .route("/project-health", get(handlers::engagement::list_rag_updates))
        .route(
            "/project-health/dashboard",
            get(handlers::engagement::rag_dashboard),
        )
        .with_permission(perm::ENGAGEMENT_READ);

    let engagement_create = Router::new()
        .route("/moods", axum::routing::post(handlers::engagement::record_mood))
        .route(
            "/moods/:id",
            axum::routing::put(handlers::engagement::update_mood),
        )
        .route(
            "/feedback",
            axum::routing::post(handlers::engagement::create_feedback),
        )
        .route(
            "/feedback/:id",
            axum::routing::put(handlers::engagement::update_feedback),
        )
        .route(
            "/feedback/generate",
            axum::routing::post(handlers::engagement::generate_feedback),
        )
        .route(
            "/rewards/tasks",
            axum::routing::post(handlers::engagement::create_task_reward),
        )
        .route(
            "/rewards/employees",
            axum::routing::post(handlers::engagement::award_reward),
        )
        .route(
            "/rewards/employees/:id/claim",
            axum::routing::post(handlers::engagement::claim_reward),
        )
        .route(
            "/hr-queries",
            axum::routing::post(handlers::engagement::create_hr_query),
        )
        .route(
            "/project-health",
            axum::routing::post(handlers::engagement::create_rag_update),
        )
        .with_permission(perm::ENGAGEMENT_CREATE);

    let engagement_manage = Router::new()
        .route(
            "/hr-queries/:id/respond",
            axum::routing::post(handlers::engagement::respond_hr_query),
        )
        .with_permission(perm::ENGAGEMENT_MANAGE);

    // Billing administration
    let billing_manage = Router::new()
        .route(
            "/billing/checkout-session",
            axum::routing::post(handlers::billing::create_checkout_session),
        )
        .route(
            "/billing/portal-session",
            axum::routing::post(handlers::billing::create_portal_session),
        )
        .route(
            "/billing/subscription",
            get(handlers::billing::subscription_status),
        )
        .route(
            "/billing/usage",
            axum::routing::post(handlers::billing::track_usage),
        )
        .with_permission(perm::BILLING_MANAGE);

    // Billing public surface: plan catalog plus the signature-verified webhook
    let billing_public = Router::new()
        .route("/billing/plans", get(handlers::billing::list_plans))
        .route(
            "/billing/webhook",
            axum::routing::post(handlers::billing::billing_webhook),
        );

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(employees_read)
        .merge(employees_update)
        .merge(employees_manage)
        .merge(departments_manage)
        .merge(attendance_clock)
        .merge(attendance_read)
        .merge(attendance_manage)
        .merge(leave_read)
        .merge(leave_create)
        .merge(leave_review)
        .merge(projects_read)
        .merge(projects_write)
        .merge(tasks_read)
        .merge(tasks_write)
        .merge(dashboard)
        .merge(payroll_read)
        .merge(payroll_manage)
        .merge(okr_read)
        .merge(okr_manage)
        .merge(clients_read)
        .merge(clients_manage)
        .merge(portal)
        .merge(reports)
        .merge(engagement_read)
        .merge(engagement_create)
        .merge(engagement_manage)
        .merge(billing_manage)
        .merge(billing_public)
}

async fn api_status() -> ApiResult<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "peopleops-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": std::env::var("APP__ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            request_id::scope_request_id(request_id::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            request_id::scope_request_id(request_id::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn pagination_math() {
        let page: PaginatedResponse<u32> = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty: PaginatedResponse<u32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}
