use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_VENDOR: &str = "VENDOR";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

/// Enough of any token to read its role.
#[derive(Debug, Deserialize)]
struct RoleClaims {
    role: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VendorClaims {
    pub sub: String,
    pub role: String,
    pub vendor_id: Uuid,
    pub exp: usize,
}

fn decode_claims<T: DeserializeOwned>(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<T, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    decode::<T>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid or expired token".to_string())
    })
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims: CustomerClaims = decode_claims(&state, bearer)?;

    if claims.role != ROLE_CUSTOMER {
        return Err(AppError::AuthorizationError("Customer role required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Vendor Authentication Middleware
// ============================================================================

pub async fn vendor_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role: RoleClaims = decode_claims(&state, bearer.clone())?;
    if role.role != ROLE_VENDOR {
        return Err(AppError::AuthorizationError("Vendor role required".to_string()));
    }

    let claims: VendorClaims = decode_claims(&state, bearer)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
