use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::booking::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
    Manual,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
            PaymentProvider::Manual => "manual",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentProvider::Stripe),
            "paypal" => Ok(PaymentProvider::Paypal),
            "manual" => Ok(PaymentProvider::Manual),
            other => Err(PaymentError::InvalidResponse(format!("unknown provider '{}'", other))),
        }
    }
}

/// Provider-side state of a charge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl IntentStatus {
    /// The charge can no longer settle; a retry needs a new one.
    pub fn is_dead(&self) -> bool {
        matches!(self, IntentStatus::Canceled | IntentStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub customer_email: String,
    pub method: PaymentMethod,
    /// 1 for the first charge on a booking. Part of provider idempotency keys
    /// so a retry after a dead charge gets a fresh one.
    pub attempt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider's id (`pi_...`, PayPal order id, `TXN-...`).
    pub id: String,
    pub provider: PaymentProvider,
    pub booking_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    pub approval_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Succeeded,
    Failed,
}

/// A provider callback reduced to what the booking workflow acts on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub provider: PaymentProvider,
    pub outcome: WebhookOutcome,
    pub transaction_id: String,
    pub booking_reference: Option<String>,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider not configured: {0}")]
    NotConfigured(String),
    #[error("Operation not supported by {0}")]
    Unsupported(PaymentProvider),
    #[error("Provider request failed: {0}")]
    Transport(String),
    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
    #[error("Webhook signature invalid: {0}")]
    InvalidSignature(String),
    #[error("Webhook payload invalid: {0}")]
    InvalidPayload(String),
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Create a charge the customer completes out of band.
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError>;

    /// Current provider state of a charge created earlier.
    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    /// Settle a charge the customer has approved (PayPal orders).
    async fn capture(&self, _intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::Unsupported(self.provider()))
    }

    /// Refund a settled charge in full; returns the provider's refund id.
    async fn refund(&self, transaction_id: &str, amount_cents: i64, currency: &str) -> Result<String, PaymentError>;

    /// Settle synchronously (direct checkout).
    async fn process_payment(&self, _request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::Unsupported(self.provider()))
    }

    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> Result<(), PaymentError> {
        Err(PaymentError::Unsupported(self.provider()))
    }

    /// `Ok(None)` for event types that do not affect a booking.
    fn parse_webhook(&self, _payload: &[u8]) -> Result<Option<WebhookEvent>, PaymentError> {
        Err(PaymentError::Unsupported(self.provider()))
    }
}
