//! Process-local implementations of the repository and publisher traits,
//! used by tests and by the API when no database is configured.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use tourbook_catalog::{Category, Destination, SeatInventory, Tour, TourDate};
use tourbook_core::booking::{Booking, BookingStatus, Payment, PaymentMethod, PaymentRecordStatus};
use tourbook_core::events::EventPublisher;
use tourbook_core::repository::{BookingRepository, TourRepository};
use tourbook_core::{CoreError, CoreResult};
use tourbook_shared::events::BookingEvent;

#[derive(Default)]
struct CatalogState {
    destinations: HashMap<Uuid, Destination>,
    categories: HashMap<Uuid, Category>,
    tours: HashMap<Uuid, Tour>,
    dates: HashMap<Uuid, TourDate>,
    seats: SeatInventory,
}

#[derive(Default)]
pub struct InMemoryTourRepository {
    state: Mutex<CatalogState>,
}

impl InMemoryTourRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_destination(&self, destination: Destination) {
        self.state.lock().await.destinations.insert(destination.id, destination);
    }

    pub async fn add_category(&self, category: Category) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn add_tour(&self, tour: Tour) {
        self.state.lock().await.tours.insert(tour.id, tour);
    }

    pub async fn add_tour_date(&self, date: TourDate) {
        let mut state = self.state.lock().await;
        state.seats.initialize(date.id, date.available_seats);
        state.dates.insert(date.id, date);
    }

    fn with_seats(state: &CatalogState, date: &TourDate) -> TourDate {
        let mut date = date.clone();
        if let Some(available) = state.seats.available(&date.id) {
            date.available_seats = available;
        }
        date
    }
}

#[async_trait]
impl TourRepository for InMemoryTourRepository {
    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>> {
        Ok(self.state.lock().await.tours.get(&id).cloned())
    }

    async fn get_tour_by_slug(&self, slug: &str) -> CoreResult<Option<Tour>> {
        let state = self.state.lock().await;
        Ok(state.tours.values().find(|t| t.slug == slug).cloned())
    }

    async fn get_tour_date(&self, id: Uuid) -> CoreResult<Option<TourDate>> {
        let state = self.state.lock().await;
        Ok(state.dates.get(&id).map(|d| Self::with_seats(&state, d)))
    }

    async fn get_destination(&self, id: Uuid) -> CoreResult<Option<Destination>> {
        Ok(self.state.lock().await.destinations.get(&id).cloned())
    }

    async fn get_category(&self, id: Uuid) -> CoreResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_tour_dates(&self, tour_id: Uuid) -> CoreResult<Vec<TourDate>> {
        let state = self.state.lock().await;
        let mut dates: Vec<TourDate> = state.dates.values()
            .filter(|d| d.tour_id == tour_id)
            .map(|d| Self::with_seats(&state, d))
            .filter(|d| d.available_seats > 0)
            .collect();
        dates.sort_by_key(|d| d.start_date);
        Ok(dates)
    }

    async fn reserve_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()> {
        self.state.lock().await.seats.reserve(&tour_date_id, seats)?;
        Ok(())
    }

    async fn release_seats(&self, tour_date_id: Uuid, seats: i32) -> CoreResult<()> {
        self.state.lock().await.seats.release(&tour_date_id, seats)?;
        Ok(())
    }
}

#[derive(Default)]
struct BookingState {
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    state: Mutex<BookingState>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut items: Vec<T>, created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created(item)));
    items
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.bookings.values().any(|b| b.booking_reference == booking.booking_reference) {
            return Err(CoreError::DuplicateReference(booking.booking_reference.clone()));
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn get_booking_by_reference(&self, reference: &str) -> CoreResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state.bookings.values().find(|b| b.booking_reference == reference).cloned())
    }

    async fn list_user_bookings(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let items = state.bookings.values().filter(|b| b.user_id == user_id).cloned().collect();
        Ok(newest_first(items, |b: &Booking| b.created_at))
    }

    async fn list_vendor_bookings(&self, vendor_id: Uuid) -> CoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let items = state.bookings.values().filter(|b| b.vendor_id == vendor_id).cloned().collect();
        Ok(newest_first(items, |b: &Booking| b.created_at))
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.bookings.get_mut(&id) {
            Some(booking) if booking.status == from => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::NotFound(format!("booking {}", id))),
        }
    }

    async fn set_payment_details(
        &self,
        id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let booking = state.bookings.get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;
        booking.payment_method = method;
        booking.transaction_id = Some(transaction_id.to_string());
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.payments.values().any(|p| p.transaction_id == payment.transaction_id) {
            return Err(CoreError::Conflict(format!("payment {} already recorded", payment.transaction_id)));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> CoreResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state.payments.values().find(|p| p.transaction_id == transaction_id).cloned())
    }

    async fn list_payments(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let state = self.state.lock().await;
        let items = state.payments.values().filter(|p| p.booking_id == booking_id).cloned().collect();
        Ok(newest_first(items, |p: &Payment| p.created_at))
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: &[PaymentRecordStatus],
        to: PaymentRecordStatus,
    ) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.payments.get_mut(&id) {
            Some(payment) if from.contains(&payment.status) => {
                payment.status = to;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::NotFound(format!("payment {}", id))),
        }
    }
}

/// Keeps every published event; `fail` makes publishing error out.
#[derive(Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<BookingEvent>>,
    fail: bool,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { events: Mutex::new(Vec::new()), fail: true }
    }

    pub async fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()> {
        if self.fail {
            return Err(CoreError::InternalError("event transport unavailable".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tour_date(tour_id: Uuid, day: u32, seats: i32) -> TourDate {
        TourDate {
            id: Uuid::new_v4(),
            tour_id,
            start_date: NaiveDate::from_ymd_opt(2031, 3, day).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2031, 3, day + 4).unwrap(),
            available_seats: seats,
            price_modifier: 1.0,
            is_guaranteed: false,
        }
    }

    #[tokio::test]
    async fn test_seats_reserve_and_listing() {
        let repo = InMemoryTourRepository::new();
        let tour_id = Uuid::new_v4();
        let later = tour_date(tour_id, 20, 4);
        let sooner = tour_date(tour_id, 5, 2);
        repo.add_tour_date(later.clone()).await;
        repo.add_tour_date(sooner.clone()).await;

        let dates = repo.list_tour_dates(tour_id).await.unwrap();
        assert_eq!(dates[0].id, sooner.id);

        repo.reserve_seats(sooner.id, 2).await.unwrap();
        let dates = repo.list_tour_dates(tour_id).await.unwrap();
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].id, later.id);

        assert!(matches!(repo.reserve_seats(later.id, 5).await, Err(CoreError::Conflict(_))));
        repo.release_seats(sooner.id, 1).await.unwrap();
        assert_eq!(repo.get_tour_date(sooner.id).await.unwrap().unwrap().available_seats, 1);
    }

    #[tokio::test]
    async fn test_publisher_records_and_fails() {
        let event = BookingEvent::PaymentFailed(tourbook_shared::events::PaymentFailedEvent {
            booking_id: Uuid::new_v4(),
            booking_reference: "ABCD1234".to_string(),
            transaction_id: "pi_1".to_string(),
            provider: "stripe".to_string(),
            timestamp: Utc::now().timestamp(),
        });

        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&event).await.unwrap();
        assert_eq!(publisher.events().await.len(), 1);

        assert!(InMemoryEventPublisher::failing().publish(&event).await.is_err());
    }
}
