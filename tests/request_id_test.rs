mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;

#[tokio::test]
async fn responses_carry_a_generated_request_id() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/status", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("response has an x-request-id header");
    assert!(!id.is_empty());
}

#[tokio::test]
async fn responses_echo_a_caller_supplied_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/status",
            None,
            None,
            &[("x-request-id", "req-test-12345")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-test-12345")
    );
}

#[tokio::test]
async fn envelope_meta_reports_the_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/status",
            None,
            None,
            &[("x-request-id", "req-meta-check")],
        )
        .await;

    let body = common::read_json(response).await;
    assert_eq!(body["meta"]["request_id"], "req-meta-check");
}
