use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod invoices;
pub mod metrics;
pub mod middleware;
pub mod payments;
pub mod state;
pub mod tours;
pub mod vendor;
pub mod webhooks;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/v1/tours/{slug}", get(tours::get_tour))
        .route("/v1/tours/{slug}/quote", get(tours::quote))
        .route("/v1/webhooks/stripe", post(webhooks::handle_stripe_webhook))
        .route("/v1/webhooks/paypal", post(webhooks::handle_paypal_webhook));

    let customer = Router::new()
        .route("/v1/tours/{slug}/bookings", post(tours::create_booking))
        .route("/v1/bookings", get(bookings::list_my_bookings))
        .route("/v1/bookings/{id}", get(bookings::get_booking))
        .route("/v1/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/v1/bookings/{id}/payment-intent", post(payments::create_payment_intent))
        .route("/v1/bookings/{id}/pay", post(payments::pay_booking))
        .route("/v1/bookings/{id}/capture", post(payments::capture_payment))
        .route("/v1/bookings/{id}/invoice", get(invoices::download_invoice))
        .route_layer(from_fn_with_state(state.clone(), middleware::customer_auth_middleware));

    let vendor = Router::new()
        .route("/v1/vendor/bookings", get(vendor::list_vendor_bookings))
        .route("/v1/vendor/summary", get(vendor::vendor_summary))
        .route("/v1/vendor/bookings/{id}/complete", post(vendor::complete_booking))
        .route_layer(from_fn_with_state(state.clone(), middleware::vendor_auth_middleware));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(vendor)
        .layer(from_fn_with_state(state.clone(), middleware::resiliency::circuit_breaker_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
