use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tourbook_core::payment::PaymentError;
use tourbook_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    PaymentDeclined(String),
    #[error("{0}")]
    PaymentProviderError(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::PaymentProviderError(msg) => {
                tracing::error!("Payment provider failure: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Rejected { status: 402, message } => AppError::PaymentDeclined(message),
            PaymentError::InvalidSignature(_) | PaymentError::InvalidPayload(_) => {
                AppError::ValidationError(err.to_string())
            }
            PaymentError::NotConfigured(_) | PaymentError::Unsupported(_) => {
                AppError::ServiceUnavailable(err.to_string())
            }
            other => AppError::PaymentProviderError(other.to_string()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Forbidden(msg) => AppError::AuthorizationError(msg),
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            e @ CoreError::DuplicateReference(_) => AppError::ConflictError(e.to_string()),
            e @ CoreError::InvalidTransition { .. } => AppError::ConflictError(e.to_string()),
            CoreError::PaymentError(e) => AppError::from(e),
            CoreError::StorageError(msg) | CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (CoreError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CoreError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                CoreError::InvalidTransition { from: "cancelled".into(), to: "confirmed".into() },
                StatusCode::CONFLICT,
            ),
            (CoreError::StorageError("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_payment_error_mapping() {
        let declined = PaymentError::Rejected { status: 402, message: "declined".into() };
        assert_eq!(AppError::from(declined).status(), StatusCode::PAYMENT_REQUIRED);

        let upstream = PaymentError::Rejected { status: 500, message: "boom".into() };
        assert_eq!(AppError::from(upstream).status(), StatusCode::BAD_GATEWAY);

        let transport = CoreError::PaymentError(PaymentError::Transport("timeout".into()));
        assert_eq!(AppError::from(transport).status(), StatusCode::BAD_GATEWAY);

        let missing = PaymentError::NotConfigured("stripe".into());
        assert_eq!(AppError::from(missing).status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad_sig = PaymentError::InvalidSignature("mismatch".into());
        assert_eq!(AppError::from(bad_sig).status(), StatusCode::BAD_REQUEST);
    }
}
