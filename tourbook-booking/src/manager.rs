use std::sync::Arc;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use tourbook_catalog::{Category, Destination, PriceBreakdown, PricingEngine, Tour, TourDate};
use tourbook_core::booking::{Booking, BookingStatus, Payment, PaymentMethod, PaymentRecordStatus};
use tourbook_core::events::EventPublisher;
use tourbook_core::invoice::Invoice;
use tourbook_core::payment::{
    IntentRequest, IntentStatus, PaymentError, PaymentIntent, PaymentProvider, WebhookEvent,
    WebhookOutcome,
};
use tourbook_core::repository::{BookingRepository, TourRepository};
use tourbook_core::{CoreError, CoreResult};
use tourbook_shared::events::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingCreatedEvent, BookingEvent,
    PaymentFailedEvent,
};
use tourbook_shared::Masked;

use crate::finance::{summarize_vendor, VendorSummary};
use crate::invoice::build_invoice_today;
use crate::orchestrator::PaymentOrchestrator;
use crate::reference::{generate_reference, is_valid_reference};

pub const DEFAULT_REFERENCE_ATTEMPTS: u32 = 3;

/// Customer input for a new booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub tour_date_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub participants: i32,
    pub special_requests: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

impl NewBooking {
    fn validate(&self) -> CoreResult<()> {
        let name = self.full_name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(CoreError::ValidationError("full_name must be 1-100 characters".to_string()));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(CoreError::ValidationError("email is not a valid address".to_string())),
        }
        let phone = self.phone.trim();
        if phone.is_empty() || phone.chars().count() > 20 {
            return Err(CoreError::ValidationError("phone must be 1-20 characters".to_string()));
        }
        Ok(())
    }
}

/// What a webhook delivery did to the booking.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDisposition {
    Confirmed,
    PaymentFailed,
    AlreadyApplied,
    IgnoredCancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub payments: Vec<Payment>,
}

/// The booking workflow: pricing, creation, payment and status transitions.
pub struct BookingService {
    tours: Arc<dyn TourRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<PaymentOrchestrator>,
    events: Arc<dyn EventPublisher>,
    pricing: PricingEngine,
    reference_attempts: u32,
}

impl BookingService {
    pub fn new(
        tours: Arc<dyn TourRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<PaymentOrchestrator>,
        events: Arc<dyn EventPublisher>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            tours,
            bookings,
            payments,
            events,
            pricing,
            reference_attempts: DEFAULT_REFERENCE_ATTEMPTS,
        }
    }

    pub fn with_reference_attempts(mut self, attempts: u32) -> Self {
        self.reference_attempts = attempts.max(1);
        self
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    pub fn currency(&self) -> &str {
        self.pricing.currency()
    }

    pub async fn tour_by_slug(&self, slug: &str) -> CoreResult<Tour> {
        self.tours.get_tour_by_slug(slug).await?
            .ok_or_else(|| CoreError::NotFound(format!("tour '{}'", slug)))
    }

    pub async fn tour(&self, id: Uuid) -> CoreResult<Tour> {
        self.tours.get_tour(id).await?
            .ok_or_else(|| CoreError::NotFound(format!("tour {}", id)))
    }

    pub async fn available_dates(&self, tour_id: Uuid) -> CoreResult<Vec<TourDate>> {
        self.tours.list_tour_dates(tour_id).await
    }

    /// Destination and category records a tour points at, when they exist.
    pub async fn tour_labels(&self, tour: &Tour) -> CoreResult<(Option<Destination>, Option<Category>)> {
        let destination = self.tours.get_destination(tour.destination_id).await?;
        let category = match tour.category_id {
            Some(id) => self.tours.get_category(id).await?,
            None => None,
        };
        Ok((destination, category))
    }

    async fn tour_date(&self, id: Option<Uuid>) -> CoreResult<Option<TourDate>> {
        match id {
            Some(id) => self.tours.get_tour_date(id).await?
                .map(Some)
                .ok_or_else(|| CoreError::NotFound(format!("tour date {}", id))),
            None => Ok(None),
        }
    }

    pub async fn quote(
        &self,
        tour: &Tour,
        tour_date_id: Option<Uuid>,
        participants: i32,
    ) -> CoreResult<PriceBreakdown> {
        let date = self.tour_date(tour_date_id).await?;
        Ok(self.pricing.quote(tour, date.as_ref(), participants)?)
    }

    /// Prices the request and stores a `pending` booking, reserving seats on
    /// the chosen date.
    pub async fn create_booking(
        &self,
        user_id: &str,
        tour: &Tour,
        request: NewBooking,
    ) -> CoreResult<Booking> {
        request.validate()?;

        let date = self.tour_date(request.tour_date_id).await?;
        let price = self.pricing.quote(tour, date.as_ref(), request.participants)?;

        if let Some(d) = &date {
            let today: NaiveDate = Utc::now().date_naive();
            if !d.starts_after(today) {
                return Err(CoreError::ValidationError("Please select a future date.".to_string()));
            }
            if !d.has_seats_for(request.participants) {
                return Err(CoreError::Conflict(format!(
                    "Only {} seats left, {} requested",
                    d.available_seats, request.participants
                )));
            }
            self.tours.reserve_seats(d.id, request.participants).await?;
        }

        let booking = match self.insert_with_fresh_reference(user_id, tour, &request, &price).await {
            Ok(booking) => booking,
            Err(e) => {
                if let Some(d) = &date {
                    if let Err(release_err) = self.tours.release_seats(d.id, request.participants).await {
                        error!("Failed to release {} seats on {}: {}", request.participants, d.id, release_err);
                    }
                }
                return Err(e);
            }
        };

        info!(
            "Booking {} created for tour {} by {} ({} participants, total {})",
            booking.booking_reference, tour.slug, Masked(booking.email.clone()),
            booking.participants, booking.total_cents
        );

        self.announce(BookingEvent::Created(BookingCreatedEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            tour_id: booking.tour_id,
            vendor_id: booking.vendor_id,
            user_id: booking.user_id.clone(),
            participants: booking.participants,
            total_cents: booking.total_cents,
            currency: booking.currency.clone(),
            timestamp: Utc::now().timestamp(),
        })).await;

        Ok(booking)
    }

    async fn insert_with_fresh_reference(
        &self,
        user_id: &str,
        tour: &Tour,
        request: &NewBooking,
        price: &PriceBreakdown,
    ) -> CoreResult<Booking> {
        for attempt in 1..=self.reference_attempts {
            let now = Utc::now();
            let booking = Booking {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                tour_id: tour.id,
                tour_date_id: price.tour_date_id,
                vendor_id: tour.vendor_id,
                booking_reference: generate_reference(),
                full_name: request.full_name.trim().to_string(),
                email: request.email.trim().to_string(),
                phone: request.phone.trim().to_string(),
                participants: price.participants,
                special_requests: request.special_requests.clone().filter(|s| !s.trim().is_empty()),
                base_cents: price.base_cents,
                gst_cents: price.gst_cents,
                sgst_cents: price.sgst_cents,
                total_cents: price.total_cents,
                currency: price.currency.clone(),
                status: BookingStatus::Pending,
                payment_method: request.payment_method,
                transaction_id: None,
                created_at: now,
                updated_at: now,
            };

            match self.bookings.insert_booking(&booking).await {
                Ok(()) => return Ok(booking),
                Err(CoreError::DuplicateReference(reference)) => {
                    warn!("Booking reference {} collided (attempt {})", reference, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::Conflict("could not allocate a unique booking reference".to_string()))
    }

    /// Owner-scoped lookup. Other users' bookings read as not found.
    pub async fn booking_for_user(&self, user_id: &str, booking_id: Uuid) -> CoreResult<Booking> {
        match self.bookings.get_booking(booking_id).await? {
            Some(b) if b.is_owned_by(user_id) => Ok(b),
            _ => Err(CoreError::NotFound(format!("booking {}", booking_id))),
        }
    }

    pub async fn booking_detail(&self, user_id: &str, booking_id: Uuid) -> CoreResult<BookingDetail> {
        let booking = self.booking_for_user(user_id, booking_id).await?;
        let payments = self.bookings.list_payments(booking.id).await?;
        Ok(BookingDetail { booking, payments })
    }

    pub async fn my_bookings(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        self.bookings.list_user_bookings(user_id).await
    }

    fn intent_request(booking: &Booking, tour_name: &str, method: PaymentMethod, attempt: u32) -> IntentRequest {
        IntentRequest {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            amount_cents: booking.total_cents,
            currency: booking.currency.clone(),
            description: format!("{} x{} ({})", tour_name, booking.participants, booking.booking_reference),
            customer_email: booking.email.clone(),
            method,
            attempt,
        }
    }

    fn ensure_pending(booking: &Booking) -> CoreResult<()> {
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "booking {} is {}; only pending bookings accept payment",
                booking.booking_reference, booking.status
            )));
        }
        Ok(())
    }

    /// Creates a provider charge the customer completes in the browser. The
    /// booking stays `pending` until the provider's webhook arrives.
    ///
    /// An open charge with the same provider is handed back instead of
    /// creating another. Once that charge is dead, or after a failure, each
    /// retry is a new attempt with its own idempotency key.
    pub async fn start_payment(
        &self,
        user_id: &str,
        booking_id: Uuid,
        method: PaymentMethod,
    ) -> CoreResult<PaymentIntent> {
        let booking = self.booking_for_user(user_id, booking_id).await?;
        Self::ensure_pending(&booking)?;
        let tour = self.tour(booking.tour_id).await?;

        let provider = method.provider();
        let payments = self.bookings.list_payments(booking.id).await?;
        let open = payments.iter()
            .find(|p| p.provider == provider && p.status == PaymentRecordStatus::Pending);
        if let Some(open) = open {
            match self.payments.get_intent(provider, &open.transaction_id).await {
                Ok(intent) if !intent.status.is_dead() => {
                    info!("Resuming payment {} for booking {}", intent.id, booking.booking_reference);
                    return Ok(intent);
                }
                Ok(intent) => {
                    self.bookings.update_payment_status(
                        open.id,
                        &[PaymentRecordStatus::Pending],
                        PaymentRecordStatus::Failed,
                    ).await?;
                    info!(
                        "Payment {} for booking {} is {:?}; starting a new one",
                        intent.id, booking.booking_reference, intent.status
                    );
                }
                Err(PaymentError::Unsupported(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let attempt = payments.len() as u32 + 1;
        let request = Self::intent_request(&booking, &tour.name, method, attempt);
        let intent = self.payments.initialize_payment(&request).await?;

        match self.bookings.get_payment_by_transaction(&intent.id).await? {
            Some(existing) if existing.booking_id != booking.id => {
                return Err(CoreError::Conflict(format!(
                    "transaction {} belongs to another booking", intent.id
                )));
            }
            // The provider replayed a charge already on record.
            Some(_) => {}
            None => {
                let payment = Payment::new(&booking, method, intent.provider, intent.id.clone(), PaymentRecordStatus::Pending);
                self.bookings.insert_payment(&payment).await?;
            }
        }
        self.bookings.set_payment_details(booking.id, method, &intent.id).await?;

        info!(
            "Payment {} started for booking {} via {} (attempt {})",
            intent.id, booking.booking_reference, intent.provider, attempt
        );
        Ok(intent)
    }

    /// Settles the PayPal order the customer approved and applies the result
    /// the same way the provider's webhook would.
    pub async fn capture_payment(&self, user_id: &str, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.booking_for_user(user_id, booking_id).await?;
        if booking.status == BookingStatus::Confirmed {
            return Ok(booking);
        }
        Self::ensure_pending(&booking)?;

        let payment = self.bookings.list_payments(booking.id).await?
            .into_iter()
            .find(|p| p.provider == PaymentProvider::Paypal && p.status == PaymentRecordStatus::Pending)
            .ok_or_else(|| CoreError::Conflict(format!(
                "booking {} has no open PayPal order", booking.booking_reference
            )))?;

        let intent = self.payments.capture(payment.provider, &payment.transaction_id).await?;
        let outcome = match intent.status {
            IntentStatus::Succeeded => WebhookOutcome::Succeeded,
            IntentStatus::Failed | IntentStatus::Canceled => WebhookOutcome::Failed,
            other => {
                info!("Capture of {} for {} is {:?}", payment.transaction_id, booking.booking_reference, other);
                return self.booking_for_user(user_id, booking.id).await;
            }
        };

        let event = WebhookEvent {
            event_id: format!("capture-{}", payment.transaction_id),
            event_type: "order.capture".to_string(),
            provider: payment.provider,
            outcome,
            transaction_id: payment.transaction_id.clone(),
            booking_reference: Some(booking.booking_reference.clone()),
            booking_id: Some(booking.id),
        };
        let disposition = self.apply_webhook(&event).await?;
        info!("Captured {} for {}: {:?}", payment.transaction_id, booking.booking_reference, disposition);

        if outcome == WebhookOutcome::Failed {
            return Err(CoreError::PaymentError(PaymentError::Rejected {
                status: 402,
                message: "payment was declined".to_string(),
            }));
        }
        self.booking_for_user(user_id, booking.id).await
    }

    /// Direct checkout: settles immediately and confirms the booking.
    pub async fn pay_direct(
        &self,
        user_id: &str,
        booking_id: Uuid,
        method: PaymentMethod,
    ) -> CoreResult<Booking> {
        let booking = self.booking_for_user(user_id, booking_id).await?;
        Self::ensure_pending(&booking)?;
        let tour = self.tour(booking.tour_id).await?;

        let attempt = self.bookings.list_payments(booking.id).await?.len() as u32 + 1;
        let request = Self::intent_request(&booking, &tour.name, method, attempt);
        let intent = self.payments.process_direct(&request).await?;

        let status = match intent.status {
            IntentStatus::Succeeded => PaymentRecordStatus::Completed,
            IntentStatus::Processing | IntentStatus::RequiresAction => PaymentRecordStatus::Pending,
            _ => PaymentRecordStatus::Failed,
        };
        let payment = Payment::new(&booking, method, intent.provider, intent.id.clone(), status);
        self.bookings.insert_payment(&payment).await?;

        match status {
            PaymentRecordStatus::Completed => {
                self.bookings.set_payment_details(booking.id, method, &intent.id).await?;
                if !self.bookings.update_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed).await? {
                    return Err(CoreError::Conflict(format!(
                        "booking {} changed state during payment", booking.booking_reference
                    )));
                }
                info!("Booking {} confirmed by direct payment {}", booking.booking_reference, intent.id);
                self.announce_confirmed(&booking, &intent.id, intent.provider).await;
            }
            PaymentRecordStatus::Pending => {
                self.bookings.set_payment_details(booking.id, method, &intent.id).await?;
                info!("Direct payment {} for {} is still processing", intent.id, booking.booking_reference);
            }
            _ => {
                self.announce_payment_failed(&booking, &intent.id, intent.provider).await;
                return Err(CoreError::PaymentError(PaymentError::Rejected {
                    status: 402,
                    message: "payment was declined".to_string(),
                }));
            }
        }

        self.bookings.get_booking(booking.id).await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking.id)))
    }

    /// Applies a verified provider callback. Repeated deliveries are no-ops.
    pub async fn apply_webhook(&self, event: &WebhookEvent) -> CoreResult<WebhookDisposition> {
        let (booking, payment) = self.resolve_webhook_target(event).await?;

        match event.outcome {
            WebhookOutcome::Succeeded => {
                let settled = self.bookings.update_payment_status(
                    payment.id,
                    &[PaymentRecordStatus::Pending, PaymentRecordStatus::Failed],
                    PaymentRecordStatus::Completed,
                ).await?;

                match booking.status {
                    BookingStatus::Pending => {
                        self.bookings.set_payment_details(booking.id, payment.payment_method, &payment.transaction_id).await?;
                        if self.bookings.update_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed).await? {
                            info!(
                                "Booking {} confirmed via {} webhook {}",
                                booking.booking_reference, event.provider, event.event_id
                            );
                            self.announce_confirmed(&booking, &payment.transaction_id, event.provider).await;
                            Ok(WebhookDisposition::Confirmed)
                        } else {
                            Ok(WebhookDisposition::AlreadyApplied)
                        }
                    }
                    BookingStatus::Cancelled => {
                        warn!(
                            "Payment {} settled for cancelled booking {}; booking left cancelled",
                            payment.transaction_id, booking.booking_reference
                        );
                        Ok(WebhookDisposition::IgnoredCancelled)
                    }
                    BookingStatus::Confirmed | BookingStatus::Completed => {
                        if settled {
                            info!("Late settlement {} recorded for {}", payment.transaction_id, booking.booking_reference);
                        }
                        Ok(WebhookDisposition::AlreadyApplied)
                    }
                }
            }
            WebhookOutcome::Failed => {
                let failed = self.bookings.update_payment_status(
                    payment.id,
                    &[PaymentRecordStatus::Pending],
                    PaymentRecordStatus::Failed,
                ).await?;

                if failed {
                    warn!("Payment {} failed for booking {}", payment.transaction_id, booking.booking_reference);
                    self.announce_payment_failed(&booking, &payment.transaction_id, event.provider).await;
                    Ok(WebhookDisposition::PaymentFailed)
                } else {
                    Ok(WebhookDisposition::AlreadyApplied)
                }
            }
        }
    }

    /// Finds the payment by provider id, falling back to the booking named in
    /// the event metadata. A booking found that way without a matching payment
    /// row gets one recorded, so checkout sessions created elsewhere still land.
    async fn resolve_webhook_target(&self, event: &WebhookEvent) -> CoreResult<(Booking, Payment)> {
        if let Some(payment) = self.bookings.get_payment_by_transaction(&event.transaction_id).await? {
            let booking = self.bookings.get_booking(payment.booking_id).await?
                .ok_or_else(|| CoreError::NotFound(format!("booking {}", payment.booking_id)))?;
            return Ok((booking, payment));
        }

        let booking = match (event.booking_id, event.booking_reference.as_deref()) {
            (Some(id), _) => self.bookings.get_booking(id).await?,
            (None, Some(reference)) if is_valid_reference(reference) => {
                self.bookings.get_booking_by_reference(reference).await?
            }
            _ => None,
        };
        let booking = booking.ok_or_else(|| {
            CoreError::NotFound(format!("no booking for transaction {}", event.transaction_id))
        })?;

        let method = match event.provider {
            PaymentProvider::Stripe if booking.payment_method.provider() != PaymentProvider::Stripe => PaymentMethod::CreditCard,
            PaymentProvider::Paypal if booking.payment_method.provider() != PaymentProvider::Paypal => PaymentMethod::Paypal,
            _ => booking.payment_method,
        };
        let payment = Payment::new(&booking, method, event.provider, event.transaction_id.clone(), PaymentRecordStatus::Pending);
        self.bookings.insert_payment(&payment).await?;
        Ok((booking, payment))
    }

    /// Cancels a pending or confirmed booking, refunding settled payments and
    /// returning seats to the tour date.
    pub async fn cancel_booking(&self, user_id: &str, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.booking_for_user(user_id, booking_id).await?;

        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(CoreError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }

        let mut refunded_cents = 0;
        for payment in self.bookings.list_payments(booking.id).await? {
            if payment.status != PaymentRecordStatus::Completed {
                continue;
            }
            let refund_id = self.payments.refund(&payment).await?;
            self.bookings.update_payment_status(
                payment.id,
                &[PaymentRecordStatus::Completed],
                PaymentRecordStatus::Refunded,
            ).await?;
            refunded_cents += payment.amount_cents;
            info!("Refunded {} for {} ({})", payment.transaction_id, booking.booking_reference, refund_id);
        }

        if !self.bookings.update_booking_status(booking.id, booking.status, BookingStatus::Cancelled).await? {
            error!(
                "Booking {} changed state during cancellation; {} already refunded",
                booking.booking_reference, refunded_cents
            );
            return Err(CoreError::Conflict(format!(
                "booking {} changed state during cancellation", booking.booking_reference
            )));
        }

        if let Some(date_id) = booking.tour_date_id {
            if let Err(e) = self.tours.release_seats(date_id, booking.participants).await {
                error!("Failed to release seats for {}: {}", booking.booking_reference, e);
            }
        }

        info!("Booking {} cancelled (was {})", booking.booking_reference, booking.status);

        self.announce(BookingEvent::Cancelled(BookingCancelledEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            vendor_id: booking.vendor_id,
            previous_status: booking.status.to_string(),
            refunded_cents,
            timestamp: Utc::now().timestamp(),
        })).await;

        self.bookings.get_booking(booking.id).await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking.id)))
    }

    /// Invoice for one of the user's paid bookings.
    pub async fn invoice(&self, user_id: &str, booking_id: Uuid) -> CoreResult<Invoice> {
        let booking = self.booking_for_user(user_id, booking_id).await?;
        let tour = self.tour(booking.tour_id).await?;
        let date = match booking.tour_date_id {
            Some(id) => self.tours.get_tour_date(id).await?,
            None => None,
        };
        build_invoice_today(&booking, &tour, date.as_ref())
    }

    pub async fn vendor_bookings(&self, vendor_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.bookings.list_vendor_bookings(vendor_id).await
    }

    pub async fn vendor_summary(&self, vendor_id: Uuid) -> CoreResult<VendorSummary> {
        let bookings = self.bookings.list_vendor_bookings(vendor_id).await?;
        Ok(summarize_vendor(vendor_id, &bookings))
    }

    /// Vendor marks a confirmed booking as completed once the tour has run.
    pub async fn complete_booking(&self, vendor_id: Uuid, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = match self.bookings.get_booking(booking_id).await? {
            Some(b) if b.vendor_id == vendor_id => b,
            _ => return Err(CoreError::NotFound(format!("booking {}", booking_id))),
        };

        if !booking.status.can_transition_to(BookingStatus::Completed)
            || !self.bookings.update_booking_status(booking.id, BookingStatus::Confirmed, BookingStatus::Completed).await?
        {
            return Err(CoreError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Completed.to_string(),
            });
        }

        info!("Booking {} completed", booking.booking_reference);
        self.bookings.get_booking(booking.id).await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking.id)))
    }

    async fn announce_confirmed(&self, booking: &Booking, transaction_id: &str, provider: PaymentProvider) {
        self.announce(BookingEvent::Confirmed(BookingConfirmedEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            vendor_id: booking.vendor_id,
            transaction_id: Some(transaction_id.to_string()),
            provider: provider.to_string(),
            total_cents: booking.total_cents,
            timestamp: Utc::now().timestamp(),
        })).await;
    }

    async fn announce_payment_failed(&self, booking: &Booking, transaction_id: &str, provider: PaymentProvider) {
        self.announce(BookingEvent::PaymentFailed(PaymentFailedEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            transaction_id: transaction_id.to_string(),
            provider: provider.to_string(),
            timestamp: Utc::now().timestamp(),
        })).await;
    }

    /// Notification delivery never fails the workflow.
    async fn announce(&self, event: BookingEvent) {
        if let Err(e) = self.events.publish(&event).await {
            error!("Failed to publish {}: {}", event.topic(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;
    use tourbook_core::payment::PaymentAdapter;
    use tourbook_payments::ManualPaymentAdapter;
    use tourbook_store::{InMemoryBookingRepository, InMemoryEventPublisher, InMemoryTourRepository};

    const USER: &str = "user-1";

    /// Stripe stand-in. `get_intent` reports `status` for any id, or is
    /// unsupported while it is unset.
    #[derive(Default)]
    struct CardStub {
        refunds: Mutex<Vec<String>>,
        status: Mutex<Option<IntentStatus>>,
    }

    fn stub_intent(id: &str, provider: PaymentProvider, status: IntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: id.to_string(),
            provider,
            booking_id: None,
            amount_cents: 0,
            currency: "INR".to_string(),
            status,
            client_secret: None,
            approval_url: None,
            created_at: Utc::now(),
        }
    }

    #[async_trait]
    impl PaymentAdapter for CardStub {
        fn provider(&self) -> PaymentProvider {
            PaymentProvider::Stripe
        }

        async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
            Ok(PaymentIntent {
                id: format!("pi_{}_{}", request.booking_reference, request.attempt),
                provider: PaymentProvider::Stripe,
                booking_id: Some(request.booking_id),
                amount_cents: request.amount_cents,
                currency: request.currency.clone(),
                status: IntentStatus::RequiresPaymentMethod,
                client_secret: Some("pi_secret".to_string()),
                approval_url: None,
                created_at: Utc::now(),
            })
        }

        async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
            match *self.status.lock().unwrap() {
                Some(status) => Ok(stub_intent(intent_id, PaymentProvider::Stripe, status)),
                None => Err(PaymentError::Unsupported(PaymentProvider::Stripe)),
            }
        }

        async fn refund(&self, transaction_id: &str, _amount_cents: i64, _currency: &str) -> Result<String, PaymentError> {
            self.refunds.lock().unwrap().push(transaction_id.to_string());
            Ok(format!("re_{}", transaction_id))
        }
    }

    /// PayPal stand-in whose captures settle with `capture_status`.
    struct OrderStub {
        capture_status: Mutex<IntentStatus>,
    }

    #[async_trait]
    impl PaymentAdapter for OrderStub {
        fn provider(&self) -> PaymentProvider {
            PaymentProvider::Paypal
        }

        async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
            let mut intent = stub_intent(
                &format!("ORDER-{}-{}", request.booking_reference, request.attempt),
                PaymentProvider::Paypal,
                IntentStatus::RequiresAction,
            );
            intent.approval_url = Some(format!("https://paypal.test/approve/{}", intent.id));
            Ok(intent)
        }

        async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
            Ok(stub_intent(intent_id, PaymentProvider::Paypal, IntentStatus::RequiresAction))
        }

        async fn capture(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
            let status = *self.capture_status.lock().unwrap();
            Ok(stub_intent(intent_id, PaymentProvider::Paypal, status))
        }

        async fn refund(&self, transaction_id: &str, _amount_cents: i64, _currency: &str) -> Result<String, PaymentError> {
            Ok(format!("RF-{}", transaction_id))
        }
    }

    struct Fixture {
        service: BookingService,
        tours: Arc<InMemoryTourRepository>,
        events: Arc<InMemoryEventPublisher>,
        card: Arc<CardStub>,
        paypal: Arc<OrderStub>,
        tour: Tour,
        date: TourDate,
    }

    fn sample_tour() -> Tour {
        Tour {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            category_id: None,
            name: "Kerala Backwaters".to_string(),
            slug: "kerala-backwaters".to_string(),
            price_cents: 10_000,
            discount_price_cents: None,
            duration_days: 4,
            duration_nights: 3,
            group_size_min: 1,
            group_size_max: 8,
            is_active: true,
        }
    }

    fn date_for(tour: &Tour, days_ahead: i64, seats: i32) -> TourDate {
        let start = Utc::now().date_naive() + Duration::days(days_ahead);
        TourDate {
            id: Uuid::new_v4(),
            tour_id: tour.id,
            start_date: start,
            end_date: start + Duration::days(3),
            available_seats: seats,
            price_modifier: 1.0,
            is_guaranteed: true,
        }
    }

    async fn fixture_with(bookings: Arc<dyn BookingRepository>, events: Arc<InMemoryEventPublisher>) -> Fixture {
        let tours = Arc::new(InMemoryTourRepository::new());
        let tour = sample_tour();
        let date = date_for(&tour, 30, 5);
        tours.add_tour(tour.clone()).await;
        tours.add_tour_date(date.clone()).await;

        let card = Arc::new(CardStub::default());
        let paypal = Arc::new(OrderStub { capture_status: Mutex::new(IntentStatus::Succeeded) });
        let orchestrator = PaymentOrchestrator::new()
            .with_adapter(card.clone())
            .with_adapter(paypal.clone())
            .with_adapter(Arc::new(ManualPaymentAdapter::new()));

        let service = BookingService::new(
            tours.clone(),
            bookings,
            Arc::new(orchestrator),
            events.clone(),
            PricingEngine::default(),
        );

        Fixture { service, tours, events, card, paypal, tour, date }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryBookingRepository::new()), Arc::new(InMemoryEventPublisher::new())).await
    }

    fn request(date: &TourDate, participants: i32) -> NewBooking {
        NewBooking {
            tour_date_id: Some(date.id),
            full_name: "Asha Menon".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+91 98765 43210".to_string(),
            participants,
            special_requests: Some("  ".to_string()),
            payment_method: PaymentMethod::CreditCard,
        }
    }

    fn webhook(transaction_id: &str, outcome: WebhookOutcome) -> WebhookEvent {
        WebhookEvent {
            event_id: "evt_1".to_string(),
            event_type: "payment_intent.succeeded".to_string(),
            provider: PaymentProvider::Stripe,
            outcome,
            transaction_id: transaction_id.to_string(),
            booking_reference: None,
            booking_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_booking_prices_and_reserves() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 2)).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.base_cents, 20_000);
        assert_eq!(booking.gst_cents, 1_000);
        assert_eq!(booking.sgst_cents, 1_000);
        assert_eq!(booking.total_cents, 22_000);
        assert_eq!(booking.currency, "INR");
        assert_eq!(booking.vendor_id, f.tour.vendor_id);
        assert_eq!(booking.booking_reference.len(), 8);
        assert_eq!(booking.special_requests, None);
        assert!(booking.amounts_balance());

        let date = f.tours.get_tour_date(f.date.id).await.unwrap().unwrap();
        assert_eq!(date.available_seats, 3);

        let events = f.events.events().await;
        assert!(matches!(events.as_slice(), [BookingEvent::Created(e)] if e.booking_id == booking.id));
    }

    #[tokio::test]
    async fn test_create_booking_rejects_bad_input() {
        let f = fixture().await;

        let too_many = f.service.create_booking(USER, &f.tour, request(&f.date, 9)).await;
        assert!(matches!(too_many, Err(CoreError::ValidationError(_))));

        let zero = f.service.create_booking(USER, &f.tour, request(&f.date, 0)).await;
        assert!(matches!(zero, Err(CoreError::ValidationError(_))));

        let mut bad_email = request(&f.date, 1);
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            f.service.create_booking(USER, &f.tour, bad_email).await,
            Err(CoreError::ValidationError(_))
        ));

        let sold_out = f.service.create_booking(USER, &f.tour, request(&f.date, 6)).await;
        assert!(matches!(sold_out, Err(CoreError::Conflict(_))));

        assert!(f.service.my_bookings(USER).await.unwrap().is_empty());
        assert_eq!(f.tours.get_tour_date(f.date.id).await.unwrap().unwrap().available_seats, 5);
    }

    #[tokio::test]
    async fn test_create_booking_requires_future_date() {
        let f = fixture().await;
        let today = date_for(&f.tour, 0, 5);
        f.tours.add_tour_date(today.clone()).await;

        match f.service.create_booking(USER, &f.tour, request(&today, 1)).await {
            Err(CoreError::ValidationError(msg)) => assert_eq!(msg, "Please select a future date."),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_booking_without_date_uses_list_price() {
        let f = fixture().await;
        let mut req = request(&f.date, 3);
        req.tour_date_id = None;

        let booking = f.service.create_booking(USER, &f.tour, req).await.unwrap();
        assert_eq!(booking.tour_date_id, None);
        assert_eq!(booking.total_cents, 33_000);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_booking() {
        let f = fixture_with(
            Arc::new(InMemoryBookingRepository::new()),
            Arc::new(InMemoryEventPublisher::failing()),
        ).await;

        assert!(f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_users_cannot_see_booking() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();

        assert!(f.service.booking_detail(USER, booking.id).await.is_ok());
        assert!(matches!(
            f.service.booking_detail("user-2", booking.id).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            f.service.cancel_booking("user-2", booking.id).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_direct_payment_confirms_once() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 2)).await.unwrap();

        let paid = f.service.pay_direct(USER, booking.id, PaymentMethod::Upi).await.unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_method, PaymentMethod::Upi);
        assert!(paid.transaction_id.as_deref().unwrap().starts_with("TXN-"));

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.payments.len(), 1);
        assert_eq!(detail.payments[0].status, PaymentRecordStatus::Completed);
        assert_eq!(detail.payments[0].amount_cents, 22_000);

        assert!(matches!(
            f.service.pay_direct(USER, booking.id, PaymentMethod::Upi).await,
            Err(CoreError::Conflict(_))
        ));
        let events = f.events.events().await;
        assert!(matches!(events.last(), Some(BookingEvent::Confirmed(_))));
    }

    #[tokio::test]
    async fn test_webhook_confirms_and_replays_are_noops() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();

        let intent = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        assert_eq!(intent.provider, PaymentProvider::Stripe);
        assert_eq!(intent.amount_cents, booking.total_cents);

        let pending = f.service.booking_for_user(USER, booking.id).await.unwrap();
        assert_eq!(pending.status, BookingStatus::Pending);
        assert_eq!(pending.transaction_id.as_deref(), Some(intent.id.as_str()));

        let event = webhook(&intent.id, WebhookOutcome::Succeeded);
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::Confirmed);
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::AlreadyApplied);

        let confirmed = f.service.booking_for_user(USER, booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let confirmations = f.events.events().await.into_iter()
            .filter(|e| matches!(e, BookingEvent::Confirmed(_)))
            .count();
        assert_eq!(confirmations, 1);
    }

    #[tokio::test]
    async fn test_failed_webhook_keeps_booking_pending() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();
        let intent = f.service.start_payment(USER, booking.id, PaymentMethod::DebitCard).await.unwrap();

        let event = webhook(&intent.id, WebhookOutcome::Failed);
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::PaymentFailed);
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::AlreadyApplied);

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.booking.status, BookingStatus::Pending);
        assert_eq!(detail.payments[0].status, PaymentRecordStatus::Failed);

        // A later success on the same intent still confirms.
        let retry = webhook(&intent.id, WebhookOutcome::Succeeded);
        assert_eq!(f.service.apply_webhook(&retry).await.unwrap(), WebhookDisposition::Confirmed);
    }

    #[tokio::test]
    async fn test_webhook_falls_back_to_booking_metadata() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();

        let mut event = webhook("pi_external", WebhookOutcome::Succeeded);
        event.booking_reference = Some(booking.booking_reference.clone());
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::Confirmed);

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.payments[0].transaction_id, "pi_external");

        let orphan = webhook("pi_unknown", WebhookOutcome::Succeeded);
        assert!(matches!(f.service.apply_webhook(&orphan).await, Err(CoreError::NotFound(_))));

        let mut malformed = webhook("pi_other", WebhookOutcome::Succeeded);
        malformed.booking_reference = Some(booking.booking_reference.to_lowercase());
        assert!(matches!(f.service.apply_webhook(&malformed).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_retry_after_failed_payment() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();

        let first = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        let failed = webhook(&first.id, WebhookOutcome::Failed);
        assert_eq!(f.service.apply_webhook(&failed).await.unwrap(), WebhookDisposition::PaymentFailed);

        let second = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        assert_ne!(second.id, first.id);
        assert!(second.id.ends_with("_2"));

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.booking.transaction_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(detail.payments.len(), 2);

        let settled = webhook(&second.id, WebhookOutcome::Succeeded);
        assert_eq!(f.service.apply_webhook(&settled).await.unwrap(), WebhookDisposition::Confirmed);
    }

    #[tokio::test]
    async fn test_open_charge_is_resumed_until_dead() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();
        *f.card.status.lock().unwrap() = Some(IntentStatus::RequiresPaymentMethod);

        let first = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        let again = f.service.start_payment(USER, booking.id, PaymentMethod::DebitCard).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(f.service.booking_detail(USER, booking.id).await.unwrap().payments.len(), 1);

        *f.card.status.lock().unwrap() = Some(IntentStatus::Canceled);
        let fresh = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        assert_ne!(fresh.id, first.id);

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        let old = detail.payments.iter().find(|p| p.transaction_id == first.id).unwrap();
        assert_eq!(old.status, PaymentRecordStatus::Failed);
    }

    #[tokio::test]
    async fn test_capture_confirms_paypal_order() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 2)).await.unwrap();

        assert!(matches!(
            f.service.capture_payment(USER, booking.id).await,
            Err(CoreError::Conflict(_))
        ));

        let order = f.service.start_payment(USER, booking.id, PaymentMethod::Paypal).await.unwrap();
        assert!(order.approval_url.is_some());

        let confirmed = f.service.capture_payment(USER, booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.transaction_id.as_deref(), Some(order.id.as_str()));

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.payments[0].status, PaymentRecordStatus::Completed);

        // A late provider webhook for the same order changes nothing.
        let mut late = webhook(&order.id, WebhookOutcome::Succeeded);
        late.provider = PaymentProvider::Paypal;
        assert_eq!(f.service.apply_webhook(&late).await.unwrap(), WebhookDisposition::AlreadyApplied);
        assert_eq!(f.service.capture_payment(USER, booking.id).await.unwrap().status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_declined_capture_allows_new_order() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();
        *f.paypal.capture_status.lock().unwrap() = IntentStatus::Failed;

        let first = f.service.start_payment(USER, booking.id, PaymentMethod::Upi).await.unwrap();
        assert!(matches!(
            f.service.capture_payment(USER, booking.id).await,
            Err(CoreError::PaymentError(PaymentError::Rejected { status: 402, .. }))
        ));
        assert_eq!(
            f.service.booking_for_user(USER, booking.id).await.unwrap().status,
            BookingStatus::Pending
        );

        *f.paypal.capture_status.lock().unwrap() = IntentStatus::Succeeded;
        let second = f.service.start_payment(USER, booking.id, PaymentMethod::Upi).await.unwrap();
        assert_ne!(second.id, first.id);
        let confirmed = f.service.capture_payment(USER, booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_tour_labels() {
        let f = fixture().await;
        let destination = Destination {
            id: f.tour.destination_id,
            name: "Kerala".to_string(),
            slug: "kerala".to_string(),
            country: "India".to_string(),
            city: "Alleppey".to_string(),
            is_active: true,
        };
        f.tours.add_destination(destination.clone()).await;

        let (found, category) = f.service.tour_labels(&f.tour).await.unwrap();
        assert_eq!(found, Some(destination));
        assert_eq!(category, None);
    }

    #[tokio::test]
    async fn test_success_on_cancelled_booking_is_ignored() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();
        let intent = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        f.service.cancel_booking(USER, booking.id).await.unwrap();

        let event = webhook(&intent.id, WebhookOutcome::Succeeded);
        assert_eq!(f.service.apply_webhook(&event).await.unwrap(), WebhookDisposition::IgnoredCancelled);
        assert_eq!(
            f.service.booking_for_user(USER, booking.id).await.unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_cancel_refunds_and_releases_seats() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 2)).await.unwrap();
        let intent = f.service.start_payment(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        f.service.apply_webhook(&webhook(&intent.id, WebhookOutcome::Succeeded)).await.unwrap();

        let cancelled = f.service.cancel_booking(USER, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(*f.card.refunds.lock().unwrap(), vec![intent.id.clone()]);
        assert_eq!(f.tours.get_tour_date(f.date.id).await.unwrap().unwrap().available_seats, 5);

        let detail = f.service.booking_detail(USER, booking.id).await.unwrap();
        assert_eq!(detail.payments[0].status, PaymentRecordStatus::Refunded);

        match f.events.events().await.last() {
            Some(BookingEvent::Cancelled(e)) => {
                assert_eq!(e.refunded_cents, booking.total_cents);
                assert_eq!(e.previous_status, "confirmed");
            }
            other => panic!("expected cancellation event, got {:?}", other),
        }

        assert!(matches!(
            f.service.cancel_booking(USER, booking.id).await,
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_vendor_completes_confirmed_booking() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.unwrap();

        assert!(matches!(
            f.service.complete_booking(f.tour.vendor_id, booking.id).await,
            Err(CoreError::InvalidTransition { .. })
        ));

        f.service.pay_direct(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        assert!(matches!(
            f.service.complete_booking(Uuid::new_v4(), booking.id).await,
            Err(CoreError::NotFound(_))
        ));

        let done = f.service.complete_booking(f.tour.vendor_id, booking.id).await.unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        let summary = f.service.vendor_summary(f.tour.vendor_id).await.unwrap();
        assert_eq!(summary.bookings_by_status["completed"], 1);
        assert_eq!(summary.gross_cents, booking.total_cents);
    }

    #[tokio::test]
    async fn test_invoice_requires_payment() {
        let f = fixture().await;
        let booking = f.service.create_booking(USER, &f.tour, request(&f.date, 2)).await.unwrap();

        assert!(matches!(f.service.invoice(USER, booking.id).await, Err(CoreError::Conflict(_))));

        f.service.pay_direct(USER, booking.id, PaymentMethod::CreditCard).await.unwrap();
        let invoice = f.service.invoice(USER, booking.id).await.unwrap();
        assert_eq!(invoice.invoice_number, format!("INV-{}", booking.booking_reference));
        assert_eq!(invoice.tour_start, Some(f.date.start_date));
        assert_eq!(invoice.total_cents, 22_000);
    }

    /// Reports the first `collisions` inserts as reference clashes.
    struct CollidingBookings {
        inner: InMemoryBookingRepository,
        collisions: Mutex<u32>,
    }

    #[async_trait]
    impl BookingRepository for CollidingBookings {
        async fn insert_booking(&self, booking: &Booking) -> CoreResult<()> {
            {
                let mut left = self.collisions.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(CoreError::DuplicateReference(booking.booking_reference.clone()));
                }
            }
            self.inner.insert_booking(booking).await
        }
        async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
            self.inner.get_booking(id).await
        }
        async fn get_booking_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>> {
            self.inner.get_booking_by_reference(reference).await
        }
        async fn list_user_bookings(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
            self.inner.list_user_bookings(user_id).await
        }
        async fn list_vendor_bookings(&self, vendor_id: Uuid) -> CoreResult<Vec<Booking>> {
            self.inner.list_vendor_bookings(vendor_id).await
        }
        async fn update_booking_status(&self, id: Uuid, from: BookingStatus, to: BookingStatus) -> CoreResult<bool> {
            self.inner.update_booking_status(id, from, to).await
        }
        async fn set_payment_details(&self, id: Uuid, method: PaymentMethod, transaction_id: &str) -> CoreResult<()> {
            self.inner.set_payment_details(id, method, transaction_id).await
        }
        async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
            self.inner.insert_payment(payment).await
        }
        async fn get_payment_by_transaction(&self, transaction_id: &str) -> CoreResult<Option<Payment>> {
            self.inner.get_payment_by_transaction(transaction_id).await
        }
        async fn list_payments(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
            self.inner.list_payments(booking_id).await
        }
        async fn update_payment_status(&self, id: Uuid, from: &[PaymentRecordStatus], to: PaymentRecordStatus) -> CoreResult<bool> {
            self.inner.update_payment_status(id, from, to).await
        }
    }

    #[tokio::test]
    async fn test_reference_collisions_are_retried() {
        let repo = Arc::new(CollidingBookings {
            inner: InMemoryBookingRepository::new(),
            collisions: Mutex::new(2),
        });
        let f = fixture_with(repo, Arc::new(InMemoryEventPublisher::new())).await;
        assert!(f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await.is_ok());

        let exhausted = Arc::new(CollidingBookings {
            inner: InMemoryBookingRepository::new(),
            collisions: Mutex::new(3),
        });
        let f = fixture_with(exhausted, Arc::new(InMemoryEventPublisher::new())).await;
        assert!(matches!(
            f.service.create_booking(USER, &f.tour, request(&f.date, 1)).await,
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(f.tours.get_tour_date(f.date.id).await.unwrap().unwrap().available_seats, 5);
    }
}
