//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Invalid request shape (bad id, malformed body)
    BadRequest(String),
    /// Typed booking failure from the service layer
    Booking(BookingError),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Booking(err) => booking_response(err),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

/// Map a booking error onto a status code and stable error code. Messages
/// for user errors are surfaced verbatim; repository failures collapse into
/// a generic 500 with the cause in `details`.
fn booking_response(err: BookingError) -> (StatusCode, ApiError) {
    let message = err.to_string();
    match err {
        BookingError::Validation(_) => {
            (StatusCode::BAD_REQUEST, ApiError::new("VALIDATION", message))
        }
        BookingError::LeadTime { .. } => {
            (StatusCode::BAD_REQUEST, ApiError::new("LEAD_TIME", message))
        }
        BookingError::OutsideAvailability => (
            StatusCode::BAD_REQUEST,
            ApiError::new("OUTSIDE_AVAILABILITY", message),
        ),
        BookingError::CancellationWindow { .. } => (
            StatusCode::BAD_REQUEST,
            ApiError::new("CANCELLATION_WINDOW", message),
        ),
        BookingError::Collision(_) => {
            (StatusCode::CONFLICT, ApiError::new("COLLISION", message))
        }
        BookingError::NoActivePackage => (
            StatusCode::CONFLICT,
            ApiError::new("NO_ACTIVE_PACKAGE", message),
        ),
        BookingError::NoCreditsAvailable => (
            StatusCode::CONFLICT,
            ApiError::new("NO_CREDITS_AVAILABLE", message),
        ),
        BookingError::AlreadyResolved => (
            StatusCode::CONFLICT,
            ApiError::new("ALREADY_RESOLVED", message),
        ),
        BookingError::NotFound(_) => {
            (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
        }
        BookingError::NotAuthorized => {
            (StatusCode::FORBIDDEN, ApiError::new("NOT_AUTHORIZED", message))
        }
        BookingError::Repository(cause) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("REPOSITORY_ERROR", "An internal storage error occurred.")
                .with_details(cause.to_string()),
        ),
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<crate::db::repository::RepositoryError> for AppError {
    fn from(err: crate::db::repository::RepositoryError) -> Self {
        AppError::Booking(BookingError::Repository(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
