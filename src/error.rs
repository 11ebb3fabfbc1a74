use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Notification signature mismatch. The caller must re-sign correctly;
    /// retrying the same payload will not help.
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payment committed but entitlement provisioning failed. Non-fatal to
    /// the payment record; needs operational follow-up.
    #[error("Activation failed: {0}")]
    Activation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable messages shared between handlers and tests.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const PACKAGE_NOT_FOUND: &str = "Package not found";
    pub const SUBSCRIPTION_NOT_FOUND: &str = "No active subscription";
    pub const ORDER_NOT_PENDING: &str = "Order can only be cancelled while pending";
    pub const INVALID_TRANSACTION_STATUS: &str = "Unknown transaction_status";
}

/// Structured error body. Internals (stack traces, datastore errors) are
/// never included here regardless of environment; they go to the logs.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::InvalidSignature => {
                (StatusCode::FORBIDDEN, "Invalid signature", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Activation(msg) => {
                // Distinct, actionable error class: money was taken but the
                // entitlement is missing. Alert loudly, answer blandly.
                tracing::error!("ACTIVATION FAILURE (paid without entitlement): {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Activation failed", None)
            }
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment gateway unavailable", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            success: false,
            message: message.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turn `Ok(None)` lookups into `NotFound` with a stable message.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Result<Option<T>> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self?.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}
