use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use tourbook_core::booking::{Booking, BookingStatus};

/// Vendor dashboard figures over a set of bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorSummary {
    pub vendor_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub bookings_by_status: BTreeMap<String, u32>,
    pub participants: i64,
    /// Paid bookings only (confirmed or completed).
    pub gross_cents: i64,
    pub net_cents: i64,
    pub tax_cents: i64,
    pub currency: Option<String>,
}

pub fn summarize_vendor(vendor_id: Uuid, bookings: &[Booking]) -> VendorSummary {
    let mut bookings_by_status: BTreeMap<String, u32> = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ]
    .iter()
    .map(|s| (s.to_string(), 0))
    .collect();

    let mut summary = VendorSummary {
        vendor_id,
        generated_at: Utc::now(),
        bookings_by_status: BTreeMap::new(),
        participants: 0,
        gross_cents: 0,
        net_cents: 0,
        tax_cents: 0,
        currency: None,
    };

    for booking in bookings.iter().filter(|b| b.vendor_id == vendor_id) {
        *bookings_by_status.entry(booking.status.to_string()).or_insert(0) += 1;

        if matches!(booking.status, BookingStatus::Confirmed | BookingStatus::Completed) {
            summary.participants += booking.participants as i64;
            summary.gross_cents += booking.total_cents;
            summary.net_cents += booking.base_cents;
            summary.tax_cents += booking.gst_cents + booking.sgst_cents;
            summary.currency.get_or_insert_with(|| booking.currency.clone());
        }
    }

    summary.bookings_by_status = bookings_by_status;
    summary
}
