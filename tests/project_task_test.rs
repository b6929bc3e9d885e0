mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::json;

async fn create_project(app: &TestApp, token: &str, name: &str) -> String {
    let created = app
        .request(
            Method::POST,
            "/api/v1/projects",
            Some(json!({ "name": name })),
            Some(token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    body["data"]["id"].as_str().expect("project id").to_string()
}

#[tokio::test]
async fn member_list_is_a_standalone_endpoint() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("owner@example.com", "employee", "owner-pass-1234")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0500", "Olive", "Nash")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let project_id = create_project(&app, &token, "Atlas").await;

    let listed = app
        .request(
            Method::GET,
            &format!("/api/v1/projects/{}/members", project_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = read_json(listed).await;
    let members = body["data"].as_array().expect("member array");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "project manager");
    assert_eq!(members[0]["name"], "Olive Nash");

    // Outsiders without project access are turned away.
    let outsider = app
        .seed_user("peer@example.com", "employee", "peer-pass-12345")
        .await;
    let outsider_profile = app
        .seed_employee_for(&outsider, "EMP-0501", "Pat", "Quinn")
        .await;
    let outsider_token = app.token_for(&outsider, Some(&outsider_profile));
    let denied = app
        .request(
            Method::GET,
            &format!("/api/v1/projects/{}/members", project_id),
            None,
            Some(&outsider_token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tasks_without_due_dates_sort_last() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("planner@example.com", "employee", "plan-pass-12345")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0510", "Remy", "Sato")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let project_id = create_project(&app, &token, "Scheduling").await;

    for (title, due_date) in [
        ("Unscheduled work", None),
        ("Ship release", Some("2026-10-01")),
        ("Draft plan", Some("2026-09-01")),
    ] {
        let mut payload = json!({ "title": title, "project_id": project_id });
        if let Some(date) = due_date {
            payload["due_date"] = json!(date);
        }
        let created = app
            .request(Method::POST, "/api/v1/tasks", Some(payload), Some(&token))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED, "task: {title}");
    }

    let listed = app
        .request(Method::GET, "/api/v1/tasks", None, Some(&token))
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = read_json(listed).await;
    let titles: Vec<&str> = body["data"]["items"]
        .as_array()
        .expect("task items")
        .iter()
        .map(|item| item["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Draft plan", "Ship release", "Unscheduled work"]);
}
