use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Shared error messages so handlers and tests agree on wording.
pub mod msg {
    pub const GATEWAY_NOT_CONFIGURED: &str = "Payment gateway is not configured";
    pub const WEBHOOK_SECRET_NOT_CONFIGURED: &str = "Webhook secret is not configured";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
    pub const MISSING_REFERENCE: &str = "reference is required";
    pub const INVALID_AMOUNT: &str = "amount must be a non-negative number";
    pub const PAYMENT_NOT_SUCCESSFUL: &str = "Payment was not successful";
    pub const ENROLLMENT_NOT_FOUND: &str = "Enrollment not found";
    pub const EBOOK_PURCHASE_NOT_FOUND: &str = "Ebook purchase not found";
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const CONTACT_SUPPORT: &str =
        "Payment received but could not be recorded. Retry the link or contact support with your reference.";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// The gateway reported a non-success status. Expected outcome, not a fault.
    #[error("Payment not successful: {status}")]
    PaymentNotSuccessful { status: String },

    /// The gateway rejected a request (bad amount, bad credentials, unknown reference).
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    /// A successful gateway event that cannot be correlated to a subject.
    #[error("Missing correlation metadata: {0}")]
    MissingMetadata(String),

    /// Payment confirmed by the gateway but the write failed. Carries the
    /// reference so the buyer can quote it to support.
    #[error("Could not record payment {reference}")]
    PersistenceFailed { reference: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Gateway(_) | AppError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PaymentNotSuccessful { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MissingMetadata(_)
            | AppError::PersistenceFailed { .. }
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let (error, details, status) = match &self {
            AppError::NotFound(msg) => ("Not found", Some(msg.clone()), None),
            AppError::BadRequest(msg) => ("Bad request", Some(msg.clone()), None),
            AppError::Unauthorized => ("Unauthorized", None, None),
            AppError::PaymentNotSuccessful { status } => (
                msg::PAYMENT_NOT_SUCCESSFUL,
                None,
                Some(status.clone()),
            ),
            AppError::Gateway(msg) => ("Payment gateway rejected the request", Some(msg.clone()), None),
            AppError::NotConfigured(what) => ("Service unavailable", Some(what.to_string()), None),
            AppError::MissingMetadata(msg) => {
                tracing::error!("Missing correlation metadata: {}", msg);
                ("Internal server error", None, None)
            }
            AppError::PersistenceFailed { reference } => (
                "Internal server error",
                Some(format!("{} (reference {})", msg::CONTACT_SUPPORT, reference)),
                None,
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ("Internal server error", None, None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                ("Internal server error", None, None)
            }
            AppError::Json(e) => ("Invalid JSON", Some(e.to_string()), None),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error", None, None)
            }
        };

        let body = ErrorResponse {
            ok: false,
            error: error.to_string(),
            details,
            status,
        };

        (status_code, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turn `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
