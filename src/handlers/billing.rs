use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::services::billing::{
    CheckoutSessionRequest, PortalSessionRequest, UsageRequest, WEBHOOK_SIGNATURE_HEADER,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub customer_id: Option<String>,
}

// GET /api/v1/billing/plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Value> {
    let plans = state.services.billing.list_plans().await?;
    Ok(Json(ApiResponse::success(plans)))
}

// POST /api/v1/billing/checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<CheckoutSessionRequest>,
) -> ApiResult<Value> {
    let session = state
        .services
        .billing
        .create_checkout_session(payload)
        .await?;
    Ok(Json(ApiResponse::message(session, "Checkout session created")))
}

// POST /api/v1/billing/portal-session
pub async fn create_portal_session(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<PortalSessionRequest>,
) -> ApiResult<Value> {
    let session = state
        .services
        .billing
        .create_portal_session(payload)
        .await?;
    Ok(Json(ApiResponse::message(session, "Portal session created")))
}

// GET /api/v1/billing/subscription
pub async fn subscription_status(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<SubscriptionQuery>,
) -> ApiResult<Value> {
    let customer_id = query.customer_id.unwrap_or_default();
    let status = state
        .services
        .billing
        .subscription_status(&customer_id)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

// POST /api/v1/billing/usage
pub async fn track_usage(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<UsageRequest>,
) -> ApiResult<Value> {
    let record = state.services.billing.track_usage(payload).await?;
    Ok(Json(ApiResponse::message(record, "Usage tracked")))
}

// POST /api/v1/billing/webhook
#[utoipa::path(
    post,
    path = "/api/v1/billing/webhook",
    summary = "Billing provider webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Missing or invalid signature"),
    )
)]
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<serde_json::Value> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.services.billing.handle_webhook(&body, signature).await?;
    Ok(Json(ApiResponse::success(json!({ "received": true }))))
}
