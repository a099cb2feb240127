use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use crate::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub invoice_number: String,
    pub booking_reference: String,
    pub issued_on: NaiveDate,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub tour_name: String,
    pub tour_start: Option<NaiveDate>,
    pub participants: i32,
    pub unit_price_cents: i64,
    pub base_cents: i64,
    pub gst_cents: i64,
    pub sgst_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub content_type: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Turns invoice data into a downloadable document (text, PDF, ...).
pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, invoice: &Invoice) -> CoreResult<RenderedDocument>;
}
