use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tourbook_booking::NewBooking;
use tourbook_catalog::{Category, Destination, PriceBreakdown, Tour, TourDate};
use tourbook_core::booking::Booking;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TourDetailResponse {
    #[serde(flatten)]
    pub tour: Tour,
    pub is_available: bool,
    pub availability: &'static str,
    pub currency: String,
    pub destination: Option<Destination>,
    pub category: Option<Category>,
    pub dates: Vec<TourDate>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub participants: i32,
    pub tour_date_id: Option<Uuid>,
}

/// GET /v1/tours/{slug}
pub async fn get_tour(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TourDetailResponse>, AppError> {
    let tour = state.bookings.tour_by_slug(&slug).await?;
    let dates = state.bookings.available_dates(tour.id).await?;
    let (destination, category) = state.bookings.tour_labels(&tour).await?;

    Ok(Json(TourDetailResponse {
        is_available: tour.is_available(),
        availability: tour.availability_label(),
        currency: state.bookings.currency().to_string(),
        destination,
        category,
        dates,
        tour,
    }))
}

/// GET /v1/tours/{slug}/quote
pub async fn quote(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    params: Result<Query<QuoteParams>, QueryRejection>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let Query(params) = params?;
    let tour = state.bookings.tour_by_slug(&slug).await?;
    let breakdown = state.bookings.quote(&tour, params.tour_date_id, params.participants).await?;
    Ok(Json(breakdown))
}

/// POST /v1/tours/{slug}/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(slug): Path<String>,
    request: Result<Json<NewBooking>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(request) = request?;
    let tour = state.bookings.tour_by_slug(&slug).await?;
    let booking = state.bookings.create_booking(&claims.sub, &tour, request).await?;
    state.metrics.bookings_created.inc();
    Ok((StatusCode::CREATED, Json(booking)))
}
