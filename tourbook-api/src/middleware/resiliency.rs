use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use crate::state::AppState;

pub const PAYMENT_FAILURE_THRESHOLD: usize = 5;
pub const PAYMENT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failing fast
    HalfOpen, // Letting one request through
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *self.state.write().await = CircuitState::HalfOpen;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

impl ResiliencyState {
    pub fn new() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payments", PAYMENT_FAILURE_THRESHOLD, PAYMENT_RESET_TIMEOUT),
        }
    }
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self::new()
    }
}

fn is_payment_route(path: &str) -> bool {
    path.starts_with("/v1/bookings/")
        && (path.ends_with("/pay") || path.ends_with("/payment-intent") || path.ends_with("/capture"))
}

/// Provider outages surface as 502 or 504. A 503 for an unconfigured
/// provider says nothing about provider health.
fn is_provider_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT)
}

/// Trips on provider failures answered by payment routes.
pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    if !is_payment_route(req.uri().path()) {
        return next.run(req).await.into_response();
    }

    let cb = &state.resiliency.payment_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("Circuit Breaker [{}] is OPEN", cb.name) })),
        ).into_response();
    }

    let response = next.run(req).await;

    if is_provider_failure(response.status()) {
        cb.record_failure().await;
    } else if response.status().is_success() {
        cb.record_success().await;
    }

    response.into_response()
}
