use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api::middleware::auth::AuthError;
use crate::services::{booking::BookingError, checkout::CheckoutError, password::PasswordError};
use crate::services::{payment_gateway::GatewayError, storage::StorageError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment processor error: {0}")]
    PaymentGateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, error_message) = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentGateway(e) => {
                tracing::error!(error = %e, "Payment processor error");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            AppError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "File storage error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_debug,
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => AppError::Unauthorized,
            AuthError::SessionError(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::DatabaseError(e) => AppError::Database(e),
            BookingError::RefundFailed(e) => AppError::PaymentGateway(e),
            BookingError::TutorNotFound | BookingError::SessionNotFound => {
                AppError::NotFound(err.to_string())
            }
            BookingError::NotAStudent | BookingError::NotAllowed(_) => {
                AppError::Forbidden(err.to_string())
            }
            BookingError::InvalidTransition { .. } | BookingError::SlotTaken => {
                AppError::Conflict(err.to_string())
            }
            _ => AppError::Validation(err.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::DatabaseError(e) => AppError::Database(e),
            CheckoutError::Gateway(e) => AppError::PaymentGateway(e),
            CheckoutError::SessionNotFound => AppError::NotFound(err.to_string()),
            CheckoutError::NotTheStudent => AppError::Forbidden(err.to_string()),
            CheckoutError::NotPayable(_) | CheckoutError::AlreadyPaid => {
                AppError::Conflict(err.to_string())
            }
            CheckoutError::MissingCard
            | CheckoutError::InvalidCard(_)
            | CheckoutError::InvalidAmount => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// True when the error is a unique-constraint violation reported by Postgres.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
