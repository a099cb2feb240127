use uuid::Uuid;

pub const TOPIC_BOOKING_CREATED: &str = "booking.created";
pub const TOPIC_BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";
pub const TOPIC_PAYMENT_FAILED: &str = "payment.failed";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub tour_id: Uuid,
    pub vendor_id: Uuid,
    pub user_id: String,
    pub participants: i32,
    pub total_cents: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub vendor_id: Uuid,
    pub transaction_id: Option<String>,
    pub provider: String,
    pub total_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub vendor_id: Uuid,
    pub previous_status: String,
    pub refunded_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PaymentFailedEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub transaction_id: String,
    pub provider: String,
    pub timestamp: i64,
}

/// Everything the booking workflow announces on the notification transport.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    Created(BookingCreatedEvent),
    Confirmed(BookingConfirmedEvent),
    Cancelled(BookingCancelledEvent),
    PaymentFailed(PaymentFailedEvent),
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::Created(_) => TOPIC_BOOKING_CREATED,
            BookingEvent::Confirmed(_) => TOPIC_BOOKING_CONFIRMED,
            BookingEvent::Cancelled(_) => TOPIC_BOOKING_CANCELLED,
            BookingEvent::PaymentFailed(_) => TOPIC_PAYMENT_FAILED,
        }
    }

    /// Partition key. Events for one booking stay ordered.
    pub fn key(&self) -> Uuid {
        match self {
            BookingEvent::Created(e) => e.booking_id,
            BookingEvent::Confirmed(e) => e.booking_id,
            BookingEvent::Cancelled(e) => e.booking_id,
            BookingEvent::PaymentFailed(e) => e.booking_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_and_tag() {
        let event = BookingEvent::PaymentFailed(PaymentFailedEvent {
            booking_id: Uuid::nil(),
            booking_reference: "A1B2C3D4".to_string(),
            transaction_id: "pi_123".to_string(),
            provider: "stripe".to_string(),
            timestamp: 0,
        });

        assert_eq!(event.topic(), "payment.failed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payment_failed");
        assert_eq!(json["transaction_id"], "pi_123");
    }
}
