use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use tourbook_booking::VendorSummary;
use tourbook_core::booking::{Booking, BookingStatus, PaymentMethod};
use tourbook_shared::Masked;

use crate::error::AppError;
use crate::middleware::VendorClaims;
use crate::state::AppState;

/// A booking as the vendor sees it. Contact fields serialize in full but
/// never print in logs.
#[derive(Debug, Serialize)]
pub struct VendorBookingView {
    pub id: Uuid,
    pub booking_reference: String,
    pub tour_id: Uuid,
    pub tour_date_id: Option<Uuid>,
    pub full_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub participants: i32,
    pub special_requests: Option<String>,
    pub total_cents: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for VendorBookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            booking_reference: b.booking_reference,
            tour_id: b.tour_id,
            tour_date_id: b.tour_date_id,
            full_name: b.full_name,
            email: Masked(b.email),
            phone: Masked(b.phone),
            participants: b.participants,
            special_requests: b.special_requests,
            total_cents: b.total_cents,
            currency: b.currency,
            status: b.status,
            payment_method: b.payment_method,
            created_at: b.created_at,
        }
    }
}

/// GET /v1/vendor/bookings
pub async fn list_vendor_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<VendorClaims>,
) -> Result<Json<Vec<VendorBookingView>>, AppError> {
    let bookings = state.bookings.vendor_bookings(claims.vendor_id).await?;
    Ok(Json(bookings.into_iter().map(VendorBookingView::from).collect()))
}

/// GET /v1/vendor/summary
pub async fn vendor_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<VendorClaims>,
) -> Result<Json<VendorSummary>, AppError> {
    Ok(Json(state.bookings.vendor_summary(claims.vendor_id).await?))
}

/// POST /v1/vendor/bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<VendorClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<VendorBookingView>, AppError> {
    let booking = state.bookings.complete_booking(claims.vendor_id, booking_id).await?;
    Ok(Json(booking.into()))
}
