use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tourbook_core::booking::{Booking, PaymentMethod};
use tourbook_core::payment::{IntentStatus, PaymentProvider};

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub provider: PaymentProvider,
    pub status: IntentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub client_secret: Option<String>,
    pub approval_url: Option<String>,
}

/// POST /v1/bookings/{id}/payment-intent
/// Starts a provider payment; the booking is confirmed by the provider webhook.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
    request: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    let Json(request) = request?;
    let intent = state.bookings
        .start_payment(&claims.sub, booking_id, request.payment_method)
        .await?;

    state.metrics.payments_started.with_label_values(&[intent.provider.as_str()]).inc();

    Ok(Json(PaymentIntentResponse {
        intent_id: intent.id,
        provider: intent.provider,
        status: intent.status,
        amount_cents: intent.amount_cents,
        currency: intent.currency,
        client_secret: intent.client_secret,
        approval_url: intent.approval_url,
    }))
}

/// POST /v1/bookings/{id}/pay
/// Direct checkout, confirms immediately.
pub async fn pay_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
    request: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let Json(request) = request?;
    let booking = state.bookings
        .pay_direct(&claims.sub, booking_id, request.payment_method)
        .await?;

    state.metrics.payments_started.with_label_values(&[PaymentProvider::Manual.as_str()]).inc();
    Ok(Json(booking))
}

/// POST /v1/bookings/{id}/capture
/// Called from the PayPal return page once the buyer approved the order.
pub async fn capture_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.capture_payment(&claims.sub, booking_id).await?))
}
