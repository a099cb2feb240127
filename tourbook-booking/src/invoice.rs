use chrono::{NaiveDate, Utc};
use std::fmt::Write;

use tourbook_catalog::{Tour, TourDate};
use tourbook_core::booking::{Booking, BookingStatus};
use tourbook_core::invoice::{Invoice, InvoiceRenderer, RenderedDocument};
use tourbook_core::money::format_amount;
use tourbook_core::{CoreError, CoreResult};

/// Only paid bookings are invoiced.
pub fn build_invoice(
    booking: &Booking,
    tour: &Tour,
    date: Option<&TourDate>,
    issued_on: NaiveDate,
) -> CoreResult<Invoice> {
    if !matches!(booking.status, BookingStatus::Confirmed | BookingStatus::Completed) {
        return Err(CoreError::Conflict(format!(
            "booking {} is {}; invoices are issued after payment",
            booking.booking_reference, booking.status
        )));
    }

    let participants = booking.participants.max(1) as i64;

    Ok(Invoice {
        invoice_number: format!("INV-{}", booking.booking_reference),
        booking_reference: booking.booking_reference.clone(),
        issued_on,
        customer_name: booking.full_name.clone(),
        customer_email: booking.email.clone(),
        customer_phone: booking.phone.clone(),
        tour_name: tour.name.clone(),
        tour_start: date.map(|d| d.start_date),
        participants: booking.participants,
        unit_price_cents: booking.base_cents / participants,
        base_cents: booking.base_cents,
        gst_cents: booking.gst_cents,
        sgst_cents: booking.sgst_cents,
        total_cents: booking.total_cents,
        currency: booking.currency.clone(),
        payment_method: booking.payment_method.to_string(),
        transaction_id: booking.transaction_id.clone(),
        status: booking.status.to_string(),
    })
}

pub fn build_invoice_today(booking: &Booking, tour: &Tour, date: Option<&TourDate>) -> CoreResult<Invoice> {
    build_invoice(booking, tour, date, Utc::now().date_naive())
}

/// Plain-text invoice. PDF output plugs in through `InvoiceRenderer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextInvoiceRenderer;

impl InvoiceRenderer for TextInvoiceRenderer {
    fn render(&self, invoice: &Invoice) -> CoreResult<RenderedDocument> {
        let mut out = String::new();
        write_text(&mut out, invoice)
            .map_err(|e| CoreError::InternalError(format!("invoice rendering failed: {}", e)))?;

        Ok(RenderedDocument {
            content_type: "text/plain; charset=utf-8".to_string(),
            extension: "txt".to_string(),
            bytes: out.into_bytes(),
        })
    }
}

fn write_text(out: &mut String, invoice: &Invoice) -> std::fmt::Result {
    let line = "-".repeat(48);
    let amount = |cents: i64| format!("{} {}", invoice.currency, format_amount(cents));

    writeln!(out, "INVOICE {}", invoice.invoice_number)?;
    writeln!(out, "Issued: {}", invoice.issued_on)?;
    writeln!(out, "Booking: {} ({})", invoice.booking_reference, invoice.status)?;
    writeln!(out, "{}", line)?;
    writeln!(out, "Billed to: {}", invoice.customer_name)?;
    writeln!(out, "Email:     {}", invoice.customer_email)?;
    writeln!(out, "Phone:     {}", invoice.customer_phone)?;
    writeln!(out, "{}", line)?;
    writeln!(out, "Tour:         {}", invoice.tour_name)?;
    if let Some(start) = invoice.tour_start {
        writeln!(out, "Departure:    {}", start)?;
    }
    writeln!(out, "Participants: {} x {}", invoice.participants, amount(invoice.unit_price_cents))?;
    writeln!(out, "{}", line)?;
    writeln!(out, "{:<20}{:>28}", "Base price", amount(invoice.base_cents))?;
    writeln!(out, "{:<20}{:>28}", "GST (5%)", amount(invoice.gst_cents))?;
    writeln!(out, "{:<20}{:>28}", "SGST (5%)", amount(invoice.sgst_cents))?;
    writeln!(out, "{:<20}{:>28}", "Total", amount(invoice.total_cents))?;
    writeln!(out, "{}", line)?;
    writeln!(out, "Paid by: {}", invoice.payment_method)?;
    if let Some(txn) = &invoice.transaction_id {
        writeln!(out, "Transaction: {}", txn)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tourbook_core::booking::PaymentMethod;
    use uuid::Uuid;

    fn tour() -> Tour {
        Tour {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            category_id: None,
            name: "Ladakh Monasteries".to_string(),
            slug: "ladakh-monasteries".to_string(),
            price_cents: 200_000,
            discount_price_cents: None,
            duration_days: 6,
            duration_nights: 5,
            group_size_min: 1,
            group_size_max: 10,
            is_active: true,
        }
    }

    fn booking(tour: &Tour, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            tour_id: tour.id,
            tour_date_id: None,
            vendor_id: tour.vendor_id,
            booking_reference: "9F3A0C1B".to_string(),
            full_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+919812345678".to_string(),
            participants: 2,
            special_requests: None,
            base_cents: 400_000,
            gst_cents: 20_000,
            sgst_cents: 20_000,
            total_cents: 440_000,
            currency: "INR".to_string(),
            status,
            payment_method: PaymentMethod::Upi,
            transaction_id: Some("TXN-0A1B2C3D4E5F".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_booking_is_not_invoiced() {
        let t = tour();
        let result = build_invoice_today(&booking(&t, BookingStatus::Pending), &t, None);
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[test]
    fn test_invoice_fields() {
        let t = tour();
        let issued = NaiveDate::from_ymd_opt(2030, 5, 1).unwrap();
        let invoice = build_invoice(&booking(&t, BookingStatus::Confirmed), &t, None, issued).unwrap();

        assert_eq!(invoice.invoice_number, "INV-9F3A0C1B");
        assert_eq!(invoice.unit_price_cents, 200_000);
        assert_eq!(invoice.total_cents, invoice.base_cents + invoice.gst_cents + invoice.sgst_cents);
        assert_eq!(invoice.payment_method, "upi");
    }

    #[test]
    fn test_text_rendering() {
        let t = tour();
        let invoice = build_invoice_today(&booking(&t, BookingStatus::Completed), &t, None).unwrap();
        let doc = TextInvoiceRenderer.render(&invoice).unwrap();
        let text = String::from_utf8(doc.bytes).unwrap();

        assert_eq!(doc.extension, "txt");
        assert!(text.contains("INVOICE INV-9F3A0C1B"));
        assert!(text.contains("INR 4400.00"));
        assert!(text.contains("Transaction: TXN-0A1B2C3D4E5F"));
    }
}
