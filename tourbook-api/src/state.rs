use std::sync::Arc;

use tourbook_booking::BookingService;
use tourbook_core::invoice::InvoiceRenderer;
use tourbook_store::app_config::BusinessRules;
use tourbook_store::RedisClient;

use crate::metrics::Metrics;
use crate::middleware::resiliency::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    /// Rate limiting is skipped when unset.
    pub redis: Option<Arc<RedisClient>>,
    pub invoices: Arc<dyn InvoiceRenderer>,
    pub metrics: Arc<Metrics>,
    pub resiliency: Arc<ResiliencyState>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
