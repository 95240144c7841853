use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error envelope returned by every handler.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Payment Required",
    "message": "Payment processing failed: card declined",
    "details": null,
    "support_contact": true,
    "request_id": "req-abc123xyz",
    "timestamp": "2026-08-08T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Payment Required")
    #[schema(example = "Payment Required")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Payment processing failed: card declined")]
    pub message: String,
    /// Additional error details (validation errors, step names)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// True when the caller must contact support instead of retrying;
    /// set for failures where a charge may already have been taken.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub support_contact: bool,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    // Payment gateway adapter
    #[error("Payment SDK failed to load within the polling budget")]
    SdkLoadTimeout,

    #[error("Card input creation failed: {0}")]
    CardCreationFailed(String),

    #[error("Card input could not attach to its mount: {0}")]
    CardAttachFailed(String),

    // Idempotency key manager
    #[error("Idempotency key space exhausted")]
    KeyExhaustion,

    // Booking orchestrator
    #[error("Booking creation failed: {0}")]
    BookingCreationFailed(String),

    #[error("Booking creation timed out")]
    BookingCreationTimeout,

    #[error("Card tokenization failed: {0}")]
    TokenizationFailed(String),

    #[error("Payment processing failed: {0}")]
    PaymentProcessingFailed(String),

    #[error("Payment could not be attached to the booking: {0}")]
    PaymentAttachFailed(String),

    #[error("A booking confirmation is already in flight")]
    SagaInFlight,

    // Ambient
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SdkLoadTimeout | Self::CardCreationFailed(_) | Self::CardAttachFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::KeyExhaustion => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BookingCreationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::BookingCreationTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::TokenizationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentProcessingFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::PaymentAttachFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SagaInFlight => StatusCode::CONFLICT,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::ConfigError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the failure happened at or after the deposit charge, where
    /// the gateway state is ambiguous and a retry risks a duplicate charge.
    /// Callers must show the contact-support variant instead of a retry prompt.
    pub fn requires_support_contact(&self) -> bool {
        matches!(
            self,
            Self::PaymentProcessingFailed(_) | Self::PaymentAttachFailed(_)
        )
    }

    /// True when the caller may safely start a fresh saga (new keys) to retry.
    pub fn retryable_with_new_saga(&self) -> bool {
        matches!(
            self,
            Self::SdkLoadTimeout
                | Self::CardCreationFailed(_)
                | Self::CardAttachFailed(_)
                | Self::BookingCreationFailed(_)
                | Self::BookingCreationTimeout
                | Self::TokenizationFailed(_)
        )
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::ConfigError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::KeyExhaustion => {
                "Could not allocate a unique request token; please try again".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.response_message();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error_message,
            details: None,
            support_contact: self.requires_support_contact(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
