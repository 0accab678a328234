// src/errors.rs
use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::cab::LedgerError;
use crate::models::user::WalletError;
use crate::store::StoreError;

static EXPOSE_INTERNAL_DETAIL: OnceLock<bool> = OnceLock::new();

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized access: {0}")]
    Unauthorized(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Booking cannot be completed before its departure time")]
    BookingNotCompleted,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment verification failed for order {0}")]
    PaymentVerification(String),

    #[error("Payout failed: {0}")]
    Payout(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether `message` should carry the full error text. Called once at startup.
    pub fn expose_internal_detail(expose: bool) {
        let _ = EXPOSE_INTERNAL_DETAIL.set(expose);
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::AuthError => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            AppError::BookingNotCompleted => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentVerification(_) => StatusCode::BAD_REQUEST,
            AppError::Payout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(StoreError::WriteConflict(_)) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MongoDB(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized access",
            AppError::AuthError => "Authentication failed",
            AppError::NotFound(_) => "Resource not found",
            AppError::InvalidTransition(_) => "Invalid booking transition",
            AppError::BookingNotCompleted => "Booking not completed",
            AppError::Conflict(_) => "Conflict",
            AppError::ValidationError(_) => "Validation failed",
            AppError::PaymentVerification(_) => "Payment verification failed",
            AppError::Payout(_) => "Payout failed",
            AppError::Store(_) => "Database error",
            AppError::MongoDB(_) => "Database error",
            AppError::ExternalApi(_) => "External API error",
            AppError::ConfigurationError(_) => "Configuration error",
            AppError::Internal(_) => "Internal server error",
        }
    }

    /// Infrastructure failures whose text may leak internals.
    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Store(_)
                | AppError::MongoDB(_)
                | AppError::ExternalApi(_)
                | AppError::ConfigurationError(_)
                | AppError::Internal(_)
                | AppError::Payout(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let expose = *EXPOSE_INTERNAL_DETAIL.get().unwrap_or(&true);

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let message = if self.is_internal() && !expose {
            self.label().to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": self.label(),
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Overlap { .. } => AppError::Conflict(err.to_string()),
            LedgerError::UnknownBooking(_) => AppError::NotFound(err.to_string()),
        }
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::DuplicateEntry(_) | WalletError::PayoutInProgress(_) => {
                AppError::Conflict(err.to_string())
            }
            WalletError::NoPendingEntry(_) => AppError::InvalidTransition(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::ValidationError(format!("Invalid id: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn payout(msg: impl Into<String>) -> Self {
        AppError::Payout(msg.into())
    }

    pub fn external_api(msg: impl Into<String>) -> Self {
        AppError::ExternalApi(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
