mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Duration, Utc};
use common::{read_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn status_endpoint_reports_service_info() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/status", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "peopleops-api");
}

#[tokio::test]
async fn health_endpoint_pings_the_database() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn admin_can_create_department_and_employee() {
    let app = TestApp::new().await;

    let dept = app
        .request_as_admin(
            Method::POST,
            "/api/v1/departments",
            Some(json!({ "name": "Engineering", "description": "Product development" })),
        )
        .await;
    assert_eq!(dept.status(), StatusCode::CREATED);
    let dept_body = read_json(dept).await;
    let dept_id = dept_body["data"]["id"].as_str().expect("department id").to_string();

    let created = app
        .request_as_admin(
            Method::POST,
            "/api/v1/employees",
            Some(json!({
                "email": "jordan@example.com",
                "password": "jordan-pass-123",
                "first_name": "Jordan",
                "last_name": "Blake",
                "employee_number": "EMP-0500",
                "position": "Backend Engineer",
                "department_id": dept_id,
                "date_of_joining": "2024-03-04",
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["data"]["full_name"], "Jordan Blake");
    assert_eq!(body["data"]["department"], "Engineering");

    // The new hire can log in with the password set at creation.
    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "jordan@example.com", "password": "jordan-pass-123" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_employee_number_is_rejected() {
    let app = TestApp::new().await;

    let payload = json!({
        "email": "first@example.com",
        "password": "first-pass-123",
        "first_name": "First",
        "last_name": "Hire",
        "employee_number": "EMP-0600",
        "date_of_joining": "2024-03-04",
    });
    let first = app
        .request_as_admin(Method::POST, "/api/v1/employees", Some(payload))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = app
        .request_as_admin(
            Method::POST,
            "/api/v1/employees",
            Some(json!({
                "email": "second@example.com",
                "password": "second-pass-12",
                "first_name": "Second",
                "last_name": "Hire",
                "employee_number": "EMP-0600",
                "date_of_joining": "2024-03-04",
            })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clock_in_then_out_computes_a_worked_session() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("worker@example.com", "employee", "worker-pass-123")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0700", "Robin", "Diaz")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let clock_in = app
        .request(
            Method::POST,
            "/api/v1/attendance/clock-in",
            Some(json!({ "work_from": "home" })),
            Some(&token),
        )
        .await;
    assert_eq!(clock_in.status(), StatusCode::OK);
    let in_body = read_json(clock_in).await;
    assert_eq!(in_body["message"], "Clocked in successfully");
    assert_eq!(in_body["data"]["work_from"], "home");

    // A second clock-in on the same day is rejected.
    let again = app
        .request(
            Method::POST,
            "/api/v1/attendance/clock-in",
            Some(json!({})),
            Some(&token),
        )
        .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);

    let clock_out = app
        .request(
            Method::POST,
            "/api/v1/attendance/clock-out",
            Some(json!({ "notes": "wrapped up early" })),
            Some(&token),
        )
        .await;
    assert_eq!(clock_out.status(), StatusCode::OK);
    let out_body = read_json(clock_out).await;
    assert!(out_body["data"]["clock_out"].is_string());

    let today = app
        .request(Method::GET, "/api/v1/attendance/today", None, Some(&token))
        .await;
    assert_eq!(today.status(), StatusCode::OK);
}

#[tokio::test]
async fn leave_request_lifecycle_submit_and_approve() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("worker@example.com", "employee", "worker-pass-123")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0800", "Robin", "Diaz")
        .await;
    let token = app.token_for(&account, Some(&profile));

    // Pick a Monday-to-Wednesday window in the future.
    let mut start = Utc::now().date_naive() + Duration::days(30);
    while start.weekday() != chrono::Weekday::Mon {
        start += Duration::days(1);
    }
    let end = start + Duration::days(2);

    let created = app
        .request(
            Method::POST,
            "/api/v1/leave",
            Some(json!({
                "leave_type": "annual",
                "start_date": start.to_string(),
                "end_date": end.to_string(),
                "reason": "Family trip",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["days"], 3.0);
    let leave_id = body["data"]["id"].as_str().expect("leave id").to_string();

    // The requester cannot approve their own leave.
    let self_review = app
        .request(
            Method::POST,
            &format!("/api/v1/leave/{leave_id}/review"),
            Some(json!({ "action": "approve" })),
            Some(&token),
        )
        .await;
    assert_eq!(self_review.status(), StatusCode::FORBIDDEN);

    let approved = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/leave/{leave_id}/review"),
            Some(json!({ "action": "approve", "note": "Enjoy" })),
        )
        .await;
    assert_eq!(approved.status(), StatusCode::OK);
    let approved_body = read_json(approved).await;
    assert_eq!(approved_body["data"]["status"], "approved");

    // Balance reflects the approved days.
    let balance = app
        .request(Method::GET, "/api/v1/leave/balance", None, Some(&token))
        .await;
    assert_eq!(balance.status(), StatusCode::OK);
    let balance_body = read_json(balance).await;
    assert_eq!(balance_body["data"]["annual"]["taken"], 3.0);
}

#[tokio::test]
async fn mood_can_only_be_recorded_once_per_day() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("worker@example.com", "employee", "worker-pass-123")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0900", "Robin", "Diaz")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let first = app
        .request(
            Method::POST,
            "/api/v1/moods",
            Some(json!({ "employee_id": profile.id, "mood": "happy" })),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .request(
            Method::POST,
            "/api/v1/moods",
            Some(json!({ "employee_id": profile.id, "mood": "neutral" })),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let invalid = app
        .request(
            Method::POST,
            "/api/v1/moods",
            Some(json!({ "employee_id": profile.id, "mood": "ecstatic" })),
            Some(&token),
        )
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}
