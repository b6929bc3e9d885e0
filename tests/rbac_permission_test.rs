mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    for uri in [
        "/api/v1/employees",
        "/api/v1/payroll",
        "/api/v1/leave",
        "/api/v1/moods",
    ] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri: {uri}");
    }
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/employees", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn employee_cannot_reach_payroll_administration() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("worker@example.com", "employee", "worker-pass-123")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0200", "Robin", "Diaz")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let denied = app
        .request(Method::GET, "/api/v1/payroll", None, Some(&token))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let allowed = app
        .request(Method::GET, "/api/v1/payroll/my", None, Some(&token))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_can_list_payroll() {
    let app = TestApp::new().await;
    let response = app.request_as_admin(Method::GET, "/api/v1/payroll", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn client_is_scoped_to_the_portal() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("client@example.com", "client", "client-pass-123")
        .await;
    let token = app.token_for(&account, None);

    let portal = app
        .request(Method::GET, "/api/v1/portal/projects", None, Some(&token))
        .await;
    assert_eq!(portal.status(), StatusCode::OK);

    for uri in ["/api/v1/employees", "/api/v1/projects", "/api/v1/dashboard"] {
        let denied = app.request(Method::GET, uri, None, Some(&token)).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN, "uri: {uri}");
    }
}

#[tokio::test]
async fn billing_administration_is_admin_only() {
    let app = TestApp::new().await;
    let account = app.seed_user("hr@example.com", "hr", "hr-pass-123456").await;
    let token = app.token_for(&account, None);

    let denied = app
        .request(
            Method::GET,
            "/api/v1/billing/subscription?customer_id=cus_1",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // Admin reaches the handler; the provider is unconfigured in tests.
    let unconfigured = app
        .request_as_admin(
            Method::GET,
            "/api/v1/billing/subscription?customer_id=cus_1",
            None,
        )
        .await;
    assert_eq!(unconfigured.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn hr_can_review_leave_and_create_projects() {
    let app = TestApp::new().await;
    let account = app.seed_user("hr@example.com", "hr", "hr-pass-123456").await;
    let profile = app
        .seed_employee_for(&account, "EMP-0300", "Harper", "Reyes")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let leave = app
        .request(Method::GET, "/api/v1/leave", None, Some(&token))
        .await;
    assert_eq!(leave.status(), StatusCode::OK);

    let created = app
        .request(
            Method::POST,
            "/api/v1/projects",
            Some(json!({ "name": "Apollo" })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn any_employee_can_create_a_project() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("dev@example.com", "employee", "dev-pass-123456")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0310", "Devon", "Park")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let created = app
        .request(
            Method::POST,
            "/api/v1/projects",
            Some(json!({ "name": "Mercury" })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    // The creator joins as project manager and may rename the project.
    let body = common::read_json(created).await;
    let project_id = body["data"]["id"].as_str().unwrap().to_string();
    let renamed = app
        .request(
            Method::PUT,
            &format!("/api/v1/projects/{}", project_id),
            Some(json!({ "name": "Mercury II" })),
            Some(&token),
        )
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);
}

#[tokio::test]
async fn employees_can_update_their_own_contact_fields() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("self@example.com", "employee", "self-pass-12345")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0320", "Sam", "Iyer")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let updated = app
        .request(
            Method::PUT,
            &format!("/api/v1/employees/{}", profile.id),
            Some(json!({ "phone_number": "555-0101", "position": "CTO" })),
            Some(&token),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = common::read_json(updated).await;
    assert_eq!(body["data"]["phone_number"], "555-0101");
    // Position changes are reserved for admin and HR and silently dropped.
    assert_ne!(body["data"]["position"], "CTO");

    // Another employee's record stays off limits.
    let denied = app
        .request(
            Method::PUT,
            &format!("/api/v1/employees/{}", app.admin_employee.id),
            Some(json!({ "phone_number": "555-0102" })),
            Some(&token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn manager_cannot_manage_employees() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("lead@example.com", "manager", "lead-pass-1234")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0400", "Morgan", "Lee")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let read = app
        .request(Method::GET, "/api/v1/employees", None, Some(&token))
        .await;
    assert_eq!(read.status(), StatusCode::OK);

    let denied = app
        .request(
            Method::DELETE,
            &format!("/api/v1/employees/{}", profile.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn employees_cannot_filter_leave_by_someone_else() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("worker@example.com", "employee", "work-pass-12345")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0410", "Noa", "Tran")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let denied = app
        .request(
            Method::GET,
            &format!("/api/v1/leave?employee_id={}", app.admin_employee.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let own = app
        .request(
            Method::GET,
            &format!("/api/v1/leave?employee_id={}", profile.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(own.status(), StatusCode::OK);
}
