use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

/// GET /v1/bookings/{id}/invoice
pub async fn download_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let invoice = state.bookings.invoice(&claims.sub, booking_id).await?;
    let document = state.invoices.render(&invoice)?;

    let disposition = format!(
        "attachment; filename=\"invoice_{}.{}\"",
        invoice.booking_reference, document.extension
    );

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    ).into_response())
}
