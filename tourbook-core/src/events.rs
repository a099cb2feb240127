use async_trait::async_trait;
use tourbook_shared::events::BookingEvent;

use crate::CoreResult;

/// Notification transport for booking lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()>;
}
