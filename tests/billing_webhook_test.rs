mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn webhook_accepts_a_signed_delivery() {
    let app = TestApp::new().await;
    let payload = json!({
        "type": "invoice.paid",
        "data": { "object": { "id": "in_1001" } },
    });
    let body = serde_json::to_vec(&payload).expect("serialize payload");
    let signature = sign("test-billing-webhook-secret", &body);

    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/billing/webhook",
            Some(payload),
            None,
            &[("x-webhook-signature", signature.as_str())],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["received"], true);
}

#[tokio::test]
async fn webhook_rejects_a_bad_signature() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/billing/webhook",
            Some(json!({ "type": "invoice.paid", "data": { "object": { "id": "in_1001" } } })),
            None,
            &[("x-webhook-signature", "deadbeef")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_rejects_a_missing_signature() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/billing/webhook",
            Some(json!({ "type": "invoice.paid", "data": {} })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
