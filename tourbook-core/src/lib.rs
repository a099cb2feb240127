pub mod booking;
pub mod events;
pub mod invoice;
pub mod money;
pub mod payment;
pub mod repository;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Booking reference already taken: {0}")]
    DuplicateReference(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Payment provider error: {0}")]
    PaymentError(#[from] payment::PaymentError),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<tourbook_catalog::PricingError> for CoreError {
    fn from(err: tourbook_catalog::PricingError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

impl From<tourbook_catalog::InventoryError> for CoreError {
    fn from(err: tourbook_catalog::InventoryError) -> Self {
        match err {
            tourbook_catalog::InventoryError::NotFound(id) => CoreError::NotFound(format!("tour date {}", id)),
            other => CoreError::Conflict(other.to_string()),
        }
    }
}
