use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use tourbook_core::money::format_amount;
use tourbook_core::payment::{
    IntentRequest, IntentStatus, PaymentAdapter, PaymentError, PaymentIntent, PaymentProvider,
    WebhookEvent, WebhookOutcome,
};

use crate::signature::verify_hex;

pub const PAYPAL_SANDBOX_BASE: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
    /// Checkout page the buyer lands on after approving; it calls the
    /// booking's capture endpoint.
    pub return_url: String,
    pub cancel_url: String,
}

impl PaypalConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            webhook_secret: webhook_secret.into(),
            api_base: PAYPAL_SANDBOX_BASE.to_string(),
            return_url: "http://localhost:3000/checkout/paypal/return".to_string(),
            cancel_url: "http://localhost:3000/checkout/paypal/cancel".to_string(),
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// PayPal Orders v2. Also carries UPI, which settles through the PayPal flow.
pub struct PaypalAdapter {
    config: PaypalConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    custom_id: Option<String>,
    amount: Option<Amount>,
    payments: Option<UnitPayments>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct UnitPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaypalEvent {
    id: String,
    event_type: String,
    resource: PaypalResource,
}

#[derive(Debug, Deserialize)]
struct PaypalResource {
    id: Option<String>,
    parent_payment: Option<String>,
    custom_id: Option<String>,
    custom: Option<String>,
    invoice_id: Option<String>,
    supplementary_data: Option<SupplementaryData>,
}

#[derive(Debug, Deserialize)]
struct SupplementaryData {
    related_ids: Option<RelatedIds>,
}

#[derive(Debug, Deserialize)]
struct RelatedIds {
    order_id: Option<String>,
}

pub fn parse_decimal(value: &str) -> Result<i64, PaymentError> {
    let invalid = || PaymentError::InvalidResponse(format!("bad amount '{}'", value));
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, "0"),
    };
    if frac.len() > 2 {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let frac: i64 = format!("{:0<2}", frac).parse().map_err(|_| invalid())?;
    Ok(whole * 100 + frac)
}

fn order_status(status: &str) -> IntentStatus {
    match status {
        "CREATED" | "SAVED" => IntentStatus::RequiresAction,
        "APPROVED" => IntentStatus::Processing,
        "COMPLETED" => IntentStatus::Succeeded,
        "VOIDED" => IntentStatus::Canceled,
        _ => IntentStatus::Failed,
    }
}

/// A completed order can still hold a declined or pending capture.
fn settled_status(order: &Order) -> IntentStatus {
    let status = order_status(&order.status);
    if status != IntentStatus::Succeeded {
        return status;
    }
    let captures = order.purchase_units.iter()
        .filter_map(|u| u.payments.as_ref())
        .flat_map(|p| p.captures.iter())
        .filter_map(|c| c.status.as_deref());
    for capture in captures {
        match capture {
            "DECLINED" | "FAILED" => return IntentStatus::Failed,
            "PENDING" => return IntentStatus::Processing,
            _ => {}
        }
    }
    status
}

impl PaypalAdapter {
    pub fn new(config: PaypalConfig) -> Result<Self, PaymentError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(PaymentError::NotConfigured("paypal client credentials".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self { config, http, token: Mutex::new(None) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self.http
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        let token: TokenResponse = Self::read(response).await?;

        // Refresh a minute before expiry.
        let expires_at = Utc::now() + ChronoDuration::seconds((token.expires_in - 60).max(0));
        *cached = Some(CachedToken { value: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }

    async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(PaymentError::Rejected { status: status.as_u16(), message });
        }
        response.json::<T>().await.map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }

    fn to_intent(order: Order) -> Result<PaymentIntent, PaymentError> {
        let approval_url = order.links.iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone());
        let unit = order.purchase_units.first();
        let booking_id = unit
            .and_then(|u| u.custom_id.as_deref())
            .and_then(|v| Uuid::parse_str(v).ok());
        let (amount_cents, currency) = match unit.and_then(|u| u.amount.as_ref()) {
            Some(amount) => (parse_decimal(&amount.value)?, amount.currency_code.clone()),
            None => (0, String::new()),
        };

        Ok(PaymentIntent {
            status: settled_status(&order),
            id: order.id,
            provider: PaymentProvider::Paypal,
            booking_id,
            amount_cents,
            currency,
            client_secret: None,
            approval_url,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PaymentAdapter for PaypalAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.booking_reference,
                "custom_id": request.booking_id.to_string(),
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_amount(request.amount_cents),
                }
            }],
            "application_context": {
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
                "user_action": "PAY_NOW",
            }
        });

        let response = self.http
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("order-{}-{}", request.booking_id, request.attempt))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let order: Order = Self::read(response).await?;
        tracing::info!("PayPal order {} created for {}", order.id, request.booking_reference);
        let mut intent = Self::to_intent(order)?;
        // Create responses omit purchase units.
        if intent.amount_cents == 0 {
            intent.amount_cents = request.amount_cents;
            intent.currency = request.currency.clone();
        }
        intent.booking_id.get_or_insert(request.booking_id);
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let token = self.access_token().await?;
        let response = self.http
            .get(self.url(&format!("/v2/checkout/orders/{}", intent_id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Self::to_intent(Self::read(response).await?)
    }

    async fn capture(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let token = self.access_token().await?;
        let response = self.http
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", intent_id)))
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("capture-{}", intent_id))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let intent = Self::to_intent(Self::read(response).await?)?;
        tracing::info!("PayPal order {} captured with status {:?}", intent.id, intent.status);
        Ok(intent)
    }

    async fn refund(&self, transaction_id: &str, amount_cents: i64, currency: &str) -> Result<String, PaymentError> {
        let token = self.access_token().await?;

        // Bookings store the order id; refunds go against its capture.
        let order_response = self.http
            .get(self.url(&format!("/v2/checkout/orders/{}", transaction_id)))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        let order: Order = Self::read(order_response).await?;
        let capture_id = order.purchase_units.iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| p.captures.iter())
            .map(|c| c.id.clone())
            .next()
            .ok_or_else(|| PaymentError::InvalidResponse(format!("order {} has no capture", transaction_id)))?;

        let body = serde_json::json!({
            "amount": { "currency_code": currency, "value": format_amount(amount_cents) }
        });
        let response = self.http
            .post(self.url(&format!("/v2/payments/captures/{}/refund", capture_id)))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("refund-{}", transaction_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let refund: RefundResponse = Self::read(response).await?;
        Ok(refund.id)
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<(), PaymentError> {
        verify_hex(payload, signature, &self.config.webhook_secret)
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookEvent>, PaymentError> {
        parse_paypal_event(payload)
    }
}

pub fn parse_paypal_event(payload: &[u8]) -> Result<Option<WebhookEvent>, PaymentError> {
    let event: PaypalEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let outcome = match event.event_type.as_str() {
        "PAYMENT.SALE.COMPLETED" | "PAYMENT.CAPTURE.COMPLETED" => WebhookOutcome::Succeeded,
        "PAYMENT.SALE.DENIED" | "PAYMENT.CAPTURE.DENIED" => WebhookOutcome::Failed,
        _ => return Ok(None),
    };

    let resource = event.resource;
    let order_id = resource.supplementary_data
        .as_ref()
        .and_then(|s| s.related_ids.as_ref())
        .and_then(|r| r.order_id.clone());
    let transaction_id = resource.parent_payment.clone()
        .or(order_id)
        .or_else(|| resource.id.clone())
        .ok_or_else(|| PaymentError::InvalidPayload("resource carries no payment id".to_string()))?;

    let booking_id = resource.custom_id.as_deref()
        .or(resource.custom.as_deref())
        .and_then(|v| Uuid::parse_str(v).ok());

    Ok(Some(WebhookEvent {
        event_id: event.id,
        event_type: event.event_type,
        provider: PaymentProvider::Paypal,
        outcome,
        transaction_id,
        booking_reference: resource.invoice_id,
        booking_id,
    }))
}
