use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use tourbook_core::payment::{
    IntentRequest, IntentStatus, PaymentAdapter, PaymentError, PaymentIntent, PaymentProvider,
    WebhookEvent, WebhookOutcome,
};

use crate::signature::{verify_stripe, DEFAULT_TOLERANCE_SECS};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub tolerance_secs: i64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: STRIPE_API_BASE.to_string(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

/// Card payments through Stripe PaymentIntents.
pub struct StripeAdapter {
    config: StripeConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeEventObject,
}

#[derive(Debug, Deserialize)]
struct StripeEventObject {
    id: String,
    /// Set on checkout sessions.
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn intent_status(status: &str) -> IntentStatus {
    match status {
        "requires_payment_method" => IntentStatus::RequiresPaymentMethod,
        "requires_confirmation" | "requires_action" => IntentStatus::RequiresAction,
        "processing" | "requires_capture" => IntentStatus::Processing,
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        _ => IntentStatus::Failed,
    }
}

impl StripeAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        if config.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured("stripe secret key".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(PaymentError::Rejected { status: status.as_u16(), message });
        }
        response.json::<T>().await.map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }

    fn to_intent(raw: StripeIntent) -> PaymentIntent {
        let booking_id = raw.metadata.get("booking_id").and_then(|v| Uuid::parse_str(v).ok());
        PaymentIntent {
            status: intent_status(&raw.status),
            id: raw.id,
            provider: PaymentProvider::Stripe,
            booking_id,
            amount_cents: raw.amount,
            currency: raw.currency.to_uppercase(),
            client_secret: raw.client_secret,
            approval_url: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PaymentAdapter for StripeAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let form = [
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("payment_method_types[]", "card".to_string()),
            ("description", request.description.clone()),
            ("receipt_email", request.customer_email.clone()),
            ("metadata[booking_id]", request.booking_id.to_string()),
            ("metadata[booking_reference]", request.booking_reference.clone()),
        ];

        let response = self.http
            .post(self.url("/v1/payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", format!("intent-{}-{}", request.booking_id, request.attempt))
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let raw: StripeIntent = Self::read(response).await?;
        tracing::info!("Stripe intent {} created for {}", raw.id, request.booking_reference);
        Ok(Self::to_intent(raw))
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self.http
            .get(self.url(&format!("/v1/payment_intents/{}", intent_id)))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Ok(Self::to_intent(Self::read(response).await?))
    }

    async fn refund(&self, transaction_id: &str, amount_cents: i64, _currency: &str) -> Result<String, PaymentError> {
        let form = [
            ("payment_intent", transaction_id.to_string()),
            ("amount", amount_cents.to_string()),
        ];
        let response = self.http
            .post(self.url("/v1/refunds"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", format!("refund-{}", transaction_id))
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let refund: StripeRefund = Self::read(response).await?;
        Ok(refund.id)
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<(), PaymentError> {
        verify_stripe(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.tolerance_secs,
            Utc::now().timestamp(),
        )
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<Option<WebhookEvent>, PaymentError> {
        parse_stripe_event(payload)
    }
}

/// Maps a Stripe event body to a webhook event, `None` for types we ignore.
pub fn parse_stripe_event(payload: &[u8]) -> Result<Option<WebhookEvent>, PaymentError> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let outcome = match event.type_.as_str() {
        "payment_intent.succeeded" | "checkout.session.completed" => WebhookOutcome::Succeeded,
        "payment_intent.payment_failed" | "payment_intent.canceled" => WebhookOutcome::Failed,
        _ => return Ok(None),
    };

    let object = event.data.object;
    let transaction_id = object.payment_intent.clone().unwrap_or_else(|| object.id.clone());

    Ok(Some(WebhookEvent {
        event_id: event.id,
        event_type: event.type_,
        provider: PaymentProvider::Stripe,
        outcome,
        transaction_id,
        booking_reference: object.metadata.get("booking_reference").cloned(),
        booking_id: object.metadata.get("booking_id").and_then(|v| Uuid::parse_str(v).ok()),
    }))
}
