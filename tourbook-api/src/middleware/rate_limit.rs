use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use tourbook_store::redis_repo::rate_limit_key;

use crate::state::AppState;

pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Fixed-window limit per client IP. Redis errors let the request through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    // Read from extensions so routers served without connect info still work.
    let ip = req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limit = state.business_rules.rate_limit_per_minute;
    match redis.check_rate_limit(&rate_limit_key(&ip), limit, RATE_LIMIT_WINDOW_SECS).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!("Rate limit exceeded for {}", ip);
            (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "Rate limit exceeded" }))).into_response()
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
            next.run(req).await
        }
    }
}
