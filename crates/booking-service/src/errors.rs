//! Booking service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages for storage, crypto and internal failures are generic on the wire;
//! the underlying cause is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `exclusion_violation` (overlapping owner slots).
const PG_EXCLUSION_VIOLATION: &str = "23P01";

/// Booking service error type.
///
/// Maps to HTTP status codes:
/// - AccountNotFound, NotFound: 404 Not Found
/// - MeetingWithYourself, BadRequest: 400 Bad Request
/// - TimeNotAvailable, DuplicateAccount: 409 Conflict
/// - Decryption: 403 Forbidden
/// - Database, Crypto, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Cannot schedule a meeting with yourself")]
    MeetingWithYourself,

    #[error("Time not available")]
    TimeNotAvailable,

    #[error("Decryption failed")]
    Decryption,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

impl BookingError {
    /// Returns the HTTP status code for this error (used for metrics labels).
    pub fn status_code(&self) -> u16 {
        match self {
            BookingError::AccountNotFound(_) | BookingError::NotFound(_) => 404,
            BookingError::MeetingWithYourself | BookingError::BadRequest(_) => 400,
            BookingError::TimeNotAvailable | BookingError::DuplicateAccount(_) => 409,
            BookingError::Decryption => 403,
            BookingError::Database(_) | BookingError::Crypto(_) | BookingError::Internal => 500,
        }
    }

    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            BookingError::MeetingWithYourself => "MEETING_WITH_YOURSELF",
            BookingError::TimeNotAvailable => "TIME_NOT_AVAILABLE",
            BookingError::Decryption => "DECRYPTION_FAILED",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            BookingError::BadRequest(_) => "BAD_REQUEST",
            BookingError::Database(_) => "DATABASE_ERROR",
            BookingError::Crypto(_) => "CRYPTO_ERROR",
            BookingError::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let message = match &self {
            BookingError::AccountNotFound(identifier) => {
                format!("No account found for '{}'", identifier)
            }
            BookingError::MeetingWithYourself => {
                "The scheduler cannot be the only owner of a meeting".to_string()
            }
            BookingError::TimeNotAvailable => {
                "The requested time is not available. Please pick another time.".to_string()
            }
            BookingError::Decryption => "Unable to decrypt with the provided key".to_string(),
            BookingError::NotFound(resource) => resource.clone(),
            BookingError::DuplicateAccount(address) => {
                format!("An account already exists for '{}'", address)
            }
            BookingError::BadRequest(reason) => reason.clone(),
            BookingError::Database(err) => {
                tracing::error!(target: "booking.database", error = %err, "Database operation failed");
                "An internal database error occurred".to_string()
            }
            BookingError::Crypto(err) => {
                tracing::error!(target: "booking.crypto", error = %err, "Cryptographic operation failed");
                "An internal cryptographic error occurred".to_string()
            }
            BookingError::Internal => "An internal error occurred".to_string(),
        };

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to BookingError.
///
/// Constraint violations carry domain meaning: a unique violation on the
/// accounts table is a duplicate account, an exclusion violation on the slots
/// table is a double booking.
impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(PG_EXCLUSION_VIOLATION) => return BookingError::TimeNotAvailable,
                Some(PG_UNIQUE_VIOLATION) => {
                    return BookingError::DuplicateAccount(
                        db_err.constraint().unwrap_or("unique constraint").to_string(),
                    )
                }
                _ => {}
            }
        }
        BookingError::Database(err.to_string())
    }
}
