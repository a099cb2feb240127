use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use tourbook_core::payment::PaymentProvider;
use tourbook_core::CoreError;

use crate::error::AppError;
use crate::state::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const PAYPAL_SIGNATURE_HEADER: &str = "PayPal-Transmission-Sig";

/// POST /v1/webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle(&state, PaymentProvider::Stripe, STRIPE_SIGNATURE_HEADER, &headers, &body).await
}

/// POST /v1/webhooks/paypal
pub async fn handle_paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle(&state, PaymentProvider::Paypal, PAYPAL_SIGNATURE_HEADER, &headers, &body).await
}

async fn handle(
    state: &AppState,
    provider: PaymentProvider,
    header: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<Value>, AppError> {
    let count = |outcome: &str| {
        state.metrics.webhook_events.with_label_values(&[provider.as_str(), outcome]).inc();
    };

    let signature = headers.get(header).and_then(|v| v.to_str().ok()).unwrap_or_default();

    let event = match state.bookings.payments().verify_webhook(provider, body, signature) {
        Ok(Some(event)) => event,
        Ok(None) => {
            count("ignored");
            return Ok(Json(json!({ "status": "ignored" })));
        }
        Err(e) => {
            tracing::warn!("Rejected {} webhook: {}", provider, e);
            count("rejected");
            return Err(e.into());
        }
    };

    tracing::info!("Received {} webhook {} ({}) for {}", provider, event.event_id, event.event_type, event.transaction_id);

    match state.bookings.apply_webhook(&event).await {
        Ok(disposition) => {
            let label = serde_json::to_value(disposition)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "applied".to_string());
            count(&label);
            Ok(Json(json!({ "status": label })))
        }
        Err(CoreError::NotFound(msg)) => {
            tracing::warn!("{} webhook {} matched no booking: {}", provider, event.event_id, msg);
            count("unmatched");
            Err(AppError::NotFoundError(msg))
        }
        Err(e) => Err(e.into()),
    }
}
