pub mod auth;
pub mod rate_limit;
pub mod resiliency;

pub use auth::{customer_auth_middleware, vendor_auth_middleware, CustomerClaims, VendorClaims};
