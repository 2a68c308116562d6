//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! meridian-core errors (this file)
//! ├── CoreError        - Business rule violations (stock, refund bounds)
//! └── ValidationError  - Input validation failures
//!
//! meridian-db errors (separate crate)
//! └── DbError          - Database operation failures
//!
//! API errors (apps/api)
//! └── ApiError         - HTTP-facing { error, message } body
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual impls
//! 2. Context in error fields (ids, amounts), not in prose alone
//! 3. Errors are enum variants, never String
//! 4. Business-rule outcomes (insufficient stock, exceeded refund) are
//!    values to branch on, not panics

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the sale/refund workflows.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds the stock on hand for one
    /// (store, product) pair. Carries the shortfall for the caller.
    #[error(
        "Insufficient stock for product {product_id} at store {store_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        store_id: i64,
        product_id: i64,
        requested: i64,
        available: i64,
    },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Refund not found.
    #[error("Refund not found: {0}")]
    RefundNotFound(String),

    /// The sale's current status does not allow the requested operation
    /// (refunding a refunded/cancelled sale, completing a non-active sale,
    /// cancelling a sale that already has refunds).
    #[error("Sale {sale_id} is {status}, cannot perform operation")]
    InvalidSaleState { sale_id: String, status: String },

    /// Requested refund quantity exceeds the remaining refundable quantity
    /// for that product on that sale.
    #[error(
        "Refund of {requested} unit(s) of product {product_id} exceeds the \
         remaining refundable quantity ({remaining})"
    )]
    RefundExceedsOriginal {
        product_id: i64,
        requested: i64,
        remaining: i64,
    },

    /// A full-scope refund was requested but every line is already
    /// exhausted.
    #[error("Sale {sale_id} has nothing left to refund")]
    NothingRefundable { sale_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised at the boundary before any business
/// logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g. malformed UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same product appears more than once in one request.
    #[error("product {product_id} appears more than once")]
    DuplicateProduct { product_id: i64 },

    /// Client-declared total disagrees with the server-computed total
    /// beyond tolerance.
    #[error("declared total {declared_cents} does not match computed total {computed_cents}")]
    TotalMismatch {
        declared_cents: i64,
        computed_cents: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
