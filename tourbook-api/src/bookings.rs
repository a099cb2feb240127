use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use tourbook_booking::BookingDetail;
use tourbook_core::booking::Booking;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

/// GET /v1/bookings
pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.my_bookings(&claims.sub).await?))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingDetail>, AppError> {
    Ok(Json(state.bookings.booking_detail(&claims.sub, booking_id).await?))
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel_booking(&claims.sub, booking_id).await?))
}
