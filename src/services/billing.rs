use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

type HmacSha256 = Hmac<Sha256>;

pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

const PROVIDER_TIMEOUT_SECS: u64 = 30;
const PLAN_PAGE_LIMIT: u32 = 10;

/// Connection details for the billing provider's REST API. The provider
/// speaks a Stripe-compatible surface: bearer-key auth, form-encoded
/// writes, JSON reads.
#[derive(Clone, Debug, Default)]
pub struct BillingSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub webhook_secret: Option<String>,
    pub redirect_base: Option<String>,
}

impl BillingSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        BillingSettings {
            api_key: config.billing_api_key.clone(),
            api_base: config.billing_api_base.clone(),
            webhook_secret: config.billing_webhook_secret.clone(),
            redirect_base: config.billing_redirect_base.clone(),
        }
    }
}

/// Subscription billing passthrough plus the inbound payment webhook.
/// Webhook payloads are authenticated with an HMAC-SHA256 signature over
/// the raw body.
#[derive(Clone)]
pub struct BillingService {
    settings: BillingSettings,
    client: Client,
    event_sender: Option<Arc<EventSender>>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CheckoutSessionRequest {
    pub price_id: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PortalSessionRequest {
    pub customer_id: String,
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UsageRequest {
    pub subscription_item_id: String,
    pub quantity: u64,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookData {
    #[serde(default)]
    object: Value,
}

/// Hex HMAC-SHA256 of the payload, compared in constant time.
pub(crate) fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature: &str,
) -> Result<(), ServiceError> {
    let provided = hex::decode(signature.trim())
        .map_err(|_| ServiceError::BadRequest("Invalid signature".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(payload);
    mac.verify_slice(&provided)
        .map_err(|_| ServiceError::BadRequest("Invalid signature".to_string()))
}

#[cfg(test)]
pub(crate) fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| HmacSha256::new_from_slice(b"-").unwrap());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

impl BillingService {
    pub fn new(settings: BillingSettings, event_sender: Option<Arc<EventSender>>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        BillingService {
            settings,
            client,
            event_sender,
        }
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.settings.api_key.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError("Billing provider is not configured".to_string())
        })
    }

    fn redirect_url(&self, provided: Option<String>, path: &str) -> Result<String, ServiceError> {
        if let Some(url) = provided {
            return Ok(url);
        }
        match &self.settings.redirect_base {
            Some(base) => Ok(format!("{}{}", base.trim_end_matches('/'), path)),
            None => Err(ServiceError::BadRequest(format!(
                "A redirect URL is required for {} when no redirect base is configured",
                path
            ))),
        }
    }

    async fn provider_get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ServiceError> {
        let key = self.api_key()?;
        let url = format!("{}/{}", self.settings.api_base.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("Billing provider unreachable: {}", e))
            })?;
        Self::parse_provider_response(response).await
    }

    async fn provider_post(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<Value, ServiceError> {
        let key = self.api_key()?;
        let url = format!("{}/{}", self.settings.api_base.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("Billing provider unreachable: {}", e))
            })?;
        Self::parse_provider_response(response).await
    }

    async fn parse_provider_response(response: reqwest::Response) -> Result<Value, ServiceError> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let detail = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("no detail");
            return Err(ServiceError::ExternalServiceError(format!(
                "Billing provider returned {}: {}",
                status, detail
            )));
        }
        Ok(body)
    }

    /// Active products with their active prices.
    #[instrument(skip(self))]
    pub async fn list_plans(&self) -> Result<Value, ServiceError> {
        let products = self
            .provider_get(
                "products",
                &[
                    ("active", "true".to_string()),
                    ("limit", PLAN_PAGE_LIMIT.to_string()),
                ],
            )
            .await?;

        let mut plans = Vec::new();
        for product in products
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
        {
            let product_id = product
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let prices = self
                .provider_get(
                    "prices",
                    &[
                        ("product", product_id.clone()),
                        ("active", "true".to_string()),
                    ],
                )
                .await?;
            let price_rows: Vec<Value> = prices
                .pointer("/data")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|price| {
                            json!({
                                "id": price.get("id"),
                                "currency": price.get("currency"),
                                "unit_amount": price.get("unit_amount"),
                                "recurring": price.get("recurring"),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();

            plans.push(json!({
                "id": product_id,
                "name": product.get("name"),
                "description": product.get("description"),
                "image": product
                    .pointer("/images/0")
                    .cloned()
                    .unwrap_or(Value::Null),
                "prices": price_rows,
            }));
        }
        Ok(json!(plans))
    }

    /// Starts a hosted subscription checkout and returns the redirect URL.
    #[instrument(skip(self, request))]
    pub async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<Value, ServiceError> {
        if request.price_id.trim().is_empty() {
            return Err(ServiceError::BadRequest("price_id is required".to_string()));
        }
        let success_url = self.redirect_url(request.success_url, "/payment/success")?;
        let cancel_url = self.redirect_url(request.cancel_url, "/payment/cancel")?;

        let form = vec![
            ("line_items[0][price]".to_string(), request.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), success_url),
            ("cancel_url".to_string(), cancel_url),
            ("automatic_tax[enabled]".to_string(), "true".to_string()),
        ];
        let session = self.provider_post("checkout/sessions", &form).await?;
        Ok(json!({
            "checkout_url": session.get("url"),
            "session_id": session.get("id"),
        }))
    }

    /// Opens the customer self-service portal.
    #[instrument(skip(self, request))]
    pub async fn create_portal_session(
        &self,
        request: PortalSessionRequest,
    ) -> Result<Value, ServiceError> {
        if request.customer_id.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "customer_id is required".to_string(),
            ));
        }
        let return_url = self.redirect_url(request.return_url, "/account")?;

        let form = vec![
            ("customer".to_string(), request.customer_id),
            ("return_url".to_string(), return_url),
        ];
        let session = self.provider_post("billing_portal/sessions", &form).await?;
        Ok(json!({ "portal_url": session.get("url") }))
    }

    /// Current subscriptions for a provider customer.
    #[instrument(skip(self))]
    pub async fn subscription_status(&self, customer_id: &str) -> Result<Value, ServiceError> {
        if customer_id.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "customer_id is required".to_string(),
            ));
        }
        let subscriptions = self
            .provider_get(
                "subscriptions",
                &[
                    ("customer", customer_id.to_string()),
                    ("limit", PLAN_PAGE_LIMIT.to_string()),
                ],
            )
            .await?;

        let rows: Vec<Value> = subscriptions
            .pointer("/data")
            .and_then(Value::as_array)
            .map(|subs| {
                subs.iter()
                    .map(|sub| {
                        let items: Vec<Value> = sub
                            .pointer("/items/data")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items
                                    .iter()
                                    .map(|item| {
                                        json!({
                                            "id": item.get("id"),
                                            "product_id": item.pointer("/price/product"),
                                            "price_id": item.pointer("/price/id"),
                                            "unit_amount": item.pointer("/price/unit_amount"),
                                            "currency": item.pointer("/price/currency"),
                                            "quantity": item.get("quantity"),
                                        })
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        json!({
                            "id": sub.get("id"),
                            "status": sub.get("status"),
                            "current_period_start": sub.get("current_period_start"),
                            "current_period_end": sub.get("current_period_end"),
                            "cancel_at_period_end": sub.get("cancel_at_period_end"),
                            "items": items,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!(rows))
    }

    /// Reports metered usage against a subscription item.
    #[instrument(skip(self, request))]
    pub async fn track_usage(&self, request: UsageRequest) -> Result<Value, ServiceError> {
        if request.subscription_item_id.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "subscription_item_id is required".to_string(),
            ));
        }
        let path = format!(
            "subscription_items/{}/usage_records",
            request.subscription_item_id
        );
        let form = vec![
            ("quantity".to_string(), request.quantity.to_string()),
            ("timestamp".to_string(), "now".to_string()),
            (
                "action".to_string(),
                request.action.unwrap_or_else(|| "increment".to_string()),
            ),
        ];
        let record = self.provider_post(&path, &form).await?;
        Ok(json!({ "usage_record_id": record.get("id") }))
    }

    /// Verifies and dispatches one webhook delivery. Unknown event types
    /// are acknowledged without action so the provider stops retrying.
    #[instrument(skip(self, payload, signature))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), ServiceError> {
        let secret = self.settings.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError(
                "Billing webhook secret is not configured".to_string(),
            )
        })?;
        let signature = signature
            .ok_or_else(|| ServiceError::BadRequest("Missing webhook signature".to_string()))?;
        verify_signature(secret, payload, signature)?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid payload: {}", e)))?;
        let reference = event
            .data
            .object
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        match event.kind.as_str() {
            "checkout.session.completed" => {
                info!(%reference, "checkout session completed");
            }
            "invoice.paid" => {
                info!(%reference, "invoice paid");
                if let Some(sender) = &self.event_sender {
                    sender.send(Event::PaymentReceived { reference }).await?;
                }
            }
            "invoice.payment_failed" => {
                warn!(%reference, "invoice payment failed");
            }
            other => {
                info!(kind = %other, "ignoring unhandled webhook event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn service(webhook_secret: Option<&str>) -> BillingService {
        BillingService::new(
            BillingSettings {
                api_key: None,
                api_base: "https://billing.invalid/v1".to_string(),
                webhook_secret: webhook_secret.map(str::to_string),
                redirect_base: Some("https://app.example.com".to_string()),
            },
            None,
        )
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"type":"invoice.paid","data":{"object":{"id":"inv_1"}}}"#;
        let sig = sign_payload(SECRET, payload);
        assert!(verify_signature(SECRET, payload, &sig).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = br#"{"type":"invoice.paid"}"#;
        let sig = sign_payload(SECRET, payload);
        assert!(verify_signature(SECRET, b"{}", &sig).is_err());
        assert!(verify_signature(SECRET, payload, "not-hex").is_err());
    }

    #[tokio::test]
    async fn webhook_requires_configured_secret() {
        let err = service(None)
            .handle_webhook(b"{}", Some("00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn webhook_rejects_missing_signature() {
        let err = service(Some(SECRET))
            .handle_webhook(b"{}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn paid_invoice_is_acknowledged() {
        let payload = br#"{"type":"invoice.paid","data":{"object":{"id":"inv_9"}}}"#;
        let sig = sign_payload(SECRET, payload);
        service(Some(SECRET))
            .handle_webhook(payload, Some(&sig))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_calls_fail_without_an_api_key() {
        let err = service(None).list_plans().await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn checkout_requires_a_price_id() {
        let err = service(None)
            .create_checkout_session(CheckoutSessionRequest {
                price_id: " ".to_string(),
                success_url: None,
                cancel_url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn usage_requires_a_subscription_item() {
        let err = service(None)
            .track_usage(UsageRequest {
                subscription_item_id: String::new(),
                quantity: 5,
                action: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }
}
