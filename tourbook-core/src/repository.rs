use async_trait::async_trait;
use uuid::Uuid;
use tourbook_catalog::{Category, Destination, Tour, TourDate};

use crate::booking::{Booking, BookingStatus, Payment, PaymentMethod, PaymentRecordStatus};
use crate::CoreResult;

/// Read access to the tour catalog plus seat bookkeeping on tour dates.
#[async_trait]
pub trait TourRepository: Send + Sync {
    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>>;

    async fn get_tour_by_slug(&self, slug: &str) -> CoreResult<Option<Tour>>;

    async fn get_tour_date(&self, id: Uuid) -> CoreResult<Option<TourDate>>;

    async fn get_destination(&self, id: Uuid) -> CoreResult<Option<Destination>>;

    async fn get_category(&self, id: Uuid) -> CoreResult<Option<Category>>;

    /// Dates with seats left, earliest first.
    async fn list_tour_dates(&self, tour_id: Uuid) -> CoreResult<Vec<TourDate>>;

    /// Fails with `CoreError::Conflict` when fewer than `seats` remain.
    async fn reserve_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()>;

    async fn release_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `CoreError::DuplicateReference` when the reference is taken.
    async fn insert_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn get_booking_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_user_bookings(&self, user_id: &str) -> CoreResult<Vec<Booking>>;

    /// Newest first.
    async fn list_vendor_bookings(&self, vendor_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set. Returns `false` when the booking was not in `from`.
    async fn update_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<bool>;

    async fn set_payment_details(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<()>;

    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()>;

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> CoreResult<Option<Payment>>;

    /// Newest first.
    async fn list_payments(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>>;

    /// Compare-and-set over any of `from`. Returns `false` when nothing changed.
    async fn update_payment_status(
        &self,
        id: Uuid,
        from: &[PaymentRecordStatus],
        to: PaymentRecordStatus,
    ) -> CoreResult<bool>;
}
