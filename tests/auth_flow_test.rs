mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = TestApp::new().await;
    app.seed_user("casey@example.com", "employee", "correct-horse-1").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "casey@example.com", "password": "wrong-horse" })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_returns_token_pair_and_user_summary() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "correct-horse-1")
        .await;
    app.seed_employee_for(&account, "EMP-0100", "Casey", "Nguyen").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "casey@example.com", "password": "correct-horse-1" })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["email"], "casey@example.com");
    assert_eq!(body["user"]["role"], "employee");
    assert_eq!(body["user"]["employee"]["first_name"], "Casey");
}

#[tokio::test]
async fn me_returns_profile_for_bearer_token() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "correct-horse-1")
        .await;
    let profile = app
        .seed_employee_for(&account, "EMP-0100", "Casey", "Nguyen")
        .await;
    let token = app.token_for(&account, Some(&profile));

    let response = app.request(Method::GET, "/auth/me", None, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["email"], "casey@example.com");
    assert_eq!(body["employee"]["employee_number"], "EMP-0100");
}

#[tokio::test]
async fn me_requires_a_token() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/auth/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_exchanges_for_new_pair() {
    let app = TestApp::new().await;
    app.seed_user("casey@example.com", "employee", "correct-horse-1").await;

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "casey@example.com", "password": "correct-horse-1" })),
            None,
        )
        .await;
    let login_body = read_json(login).await;
    let refresh_token = login_body["refresh_token"].as_str().expect("refresh token");

    let response = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn refresh_rejects_an_access_token() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "correct-horse-1")
        .await;
    let access = app.token_for(&account, None);

    let response = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": access })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_rotates_credentials() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "old-password-88")
        .await;
    let token = app.token_for(&account, None);

    let response = app
        .request(
            Method::POST,
            "/auth/change-password",
            Some(json!({
                "current_password": "old-password-88",
                "new_password": "new-password-99",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let old_login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "casey@example.com", "password": "old-password-88" })),
            None,
        )
        .await;
    assert_eq!(old_login.status(), StatusCode::UNAUTHORIZED);

    let new_login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "casey@example.com", "password": "new-password-99" })),
            None,
        )
        .await;
    assert_eq!(new_login.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "correct-horse-1")
        .await;
    let token = app.token_for(&account, None);

    let logout = app
        .request(Method::POST, "/auth/logout", None, Some(&token))
        .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let me = app.request(Method::GET, "/auth/me", None, Some(&token)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_is_admin_only() {
    let app = TestApp::new().await;
    let account = app
        .seed_user("casey@example.com", "employee", "correct-horse-1")
        .await;
    let employee_token = app.token_for(&account, None);

    let denied = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({ "email": "new@example.com", "password": "fresh-password-1" })),
            Some(&employee_token),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let created = app
        .request_as_admin(
            Method::POST,
            "/auth/register",
            Some(json!({
                "email": "new@example.com",
                "password": "fresh-password-1",
                "role": "hr",
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["role"], "hr");
}
