//! # API Error Type
//!
//! Unified error type for the HTTP surface.
//!
//! ## Error Flow
//! ```text
//! ValidationError ─┐
//! CoreError ───────┼──► ApiError { code, message } ──► HTTP status + JSON
//! DbError ─────────┘
//! ```
//!
//! Every failure returns a structured `{ error, message }` body whose code
//! tells the caller whether to retry (`TRANSACTION_ERROR`), fix the input
//! (`VALIDATION_ERROR`), or surface a terminal message
//! (`INVALID_SALE_STATE`, `REFUND_EXCEEDS_ORIGINAL`, ...).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use meridian_core::{CoreError, ValidationError};
use meridian_db::DbError;

/// API error returned from handlers.
///
/// Serializes to the wire shape:
/// ```json
/// { "error": "INSUFFICIENT_STOCK", "message": "Insufficient stock for ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    #[serde(rename = "error")]
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or out-of-range input (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Requested quantity exceeds stock on hand (409)
    InsufficientStock,

    /// Sale status forbids the operation (409)
    InvalidSaleState,

    /// Requested refund exceeds the remaining refundable balance (409)
    RefundExceedsOriginal,

    /// Transient database contention; safe to retry (503)
    TransactionError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InsufficientStock
            | ErrorCode::InvalidSaleState
            | ErrorCode::RefundExceedsOriginal => StatusCode::CONFLICT,
            ErrorCode::TransactionError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Converts validation errors to API errors.
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts core business errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", id),
            CoreError::RefundNotFound(id) => ApiError::not_found("Refund", id),
            CoreError::InvalidSaleState { .. } | CoreError::NothingRefundable { .. } => {
                ApiError::new(ErrorCode::InvalidSaleState, err.to_string())
            }
            CoreError::RefundExceedsOriginal { .. } => {
                ApiError::new(ErrorCode::RefundExceedsOriginal, err.to_string())
            }
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::TransactionFailed(e) => {
                tracing::warn!("Transaction contention: {}", e);
                ApiError::new(
                    ErrorCode::TransactionError,
                    "Transaction could not complete, please retry",
                )
            }
            DbError::PoolExhausted => ApiError::new(
                ErrorCode::TransactionError,
                "Database is busy, please retry",
            ),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}
