use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub payments_started: IntCounterVec,
    pub webhook_events: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tourbook".to_string()), None)?;

        let bookings_created = IntCounter::new("bookings_created_total", "Bookings created")?;
        let payments_started = IntCounterVec::new(
            Opts::new("payments_started_total", "Payments started, by provider"),
            &["provider"],
        )?;
        let webhook_events = IntCounterVec::new(
            Opts::new("webhook_events_total", "Provider callbacks, by provider and outcome"),
            &["provider", "outcome"],
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(payments_started.clone()))?;
        registry.register(Box::new(webhook_events.clone()))?;

        Ok(Self { registry, bookings_created, payments_started, webhook_events })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render_with_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.bookings_created.inc();
        metrics.webhook_events.with_label_values(&["stripe", "confirmed"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("tourbook_bookings_created_total 1"));
        assert!(text.contains("tourbook_webhook_events_total{outcome=\"confirmed\",provider=\"stripe\"} 1"));
    }
}
