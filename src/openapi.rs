use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PeopleOps API",
        version = "0.3.0",
        description = r#"
# PeopleOps HR & Project Management API

An API for managing employees, attendance, leave, payroll, projects, tasks,
OKRs, client project access and employee engagement.

## Authentication

All endpoints except `/auth/login`, `/auth/refresh` and the billing webhook
require a JWT access token:

```
Authorization: Bearer <your-jwt-token>
```

Tokens carry the role's resolved permission list; routes are gated per
`resource:action` permission.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100)
and respond with `items`, `total`, `page`, `limit` and `total_pages`.

## Reports

Report endpoints accept a `format` query parameter: `json` (default),
`csv` (attachment download) or `chart` (series-shaped JSON).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Login, token refresh and account endpoints"),
        (name = "Employees", description = "Employee and department management"),
        (name = "Attendance", description = "Clock in/out and attendance records"),
        (name = "Leave", description = "Leave requests, review and balances"),
        (name = "Projects", description = "Projects, members and tasks"),
        (name = "Payroll", description = "Salaries, payroll runs and payslips"),
        (name = "OKRs", description = "Objectives and key results"),
        (name = "Reports", description = "Attendance, leave, payroll and project reports"),
        (name = "Engagement", description = "Moods, feedback, rewards and project health"),
        (name = "Billing", description = "Billing provider webhook")
    ),
    paths(
        // Auth
        crate::auth::login_handler,
        crate::auth::register_handler,
        crate::auth::refresh_handler,
        crate::auth::me_handler,
        crate::auth::change_password_handler,
        crate::auth::logout_handler,

        // Employees
        crate::handlers::employees::list_employees,
        crate::handlers::employees::my_profile,
        crate::handlers::employees::get_employee,
        crate::handlers::employees::create_employee,
        crate::handlers::employees::update_employee,
        crate::handlers::employees::deactivate_employee,

        // Payroll
        crate::handlers::payroll::list_payrolls,
        crate::handlers::payroll::create_payroll,
        crate::handlers::payroll::process_payroll,
        crate::handlers::payroll::generate_payslip,

        // OKRs
        crate::handlers::okr::create_okr,

        // Webhooks
        crate::handlers::billing::billing_webhook,

        // Remaining routes intentionally omitted from OpenAPI paths for now
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Auth types
            crate::auth::LoginRequest,
            crate::auth::LoginResponse,
            crate::auth::RegisterRequest,
            crate::auth::RefreshRequest,
            crate::auth::ChangePasswordRequest,
            crate::auth::TokenPair,
            crate::auth::UserSummary,
            crate::auth::MeResponse,

            // Employee types
            crate::services::employees::EmployeeDto,
            crate::services::employees::CreateEmployeeRequest,
            crate::services::employees::UpdateEmployeeRequest,
            crate::services::employees::DepartmentRequest,

            // Payroll types
            crate::services::payroll::CreateSalaryRequest,
            crate::services::payroll::CreatePayrollRequest,
            crate::services::payroll::UpdatePayrollRequest,
            crate::services::payroll::PayslipRequest,
            crate::services::payroll::Payslip,

            // OKR types
            crate::services::okr::CreateOkrRequest,
            crate::services::okr::CreateKeyResultRequest,
            crate::services::okr::UpdateOkrRequest,
            crate::services::okr::UpdateKeyResultRequest,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string(&openapi).expect("document should serialize");
        assert!(json.contains("PeopleOps API"));
        assert!(json.contains("/auth/login"));
        assert!(json.contains("/api/v1/employees"));
    }
}
