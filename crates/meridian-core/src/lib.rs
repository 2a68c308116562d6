//! # meridian-core: Pure Business Logic for Meridian
//!
//! The heart of the sale/refund transaction engine: all business rules as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Meridian Architecture                          │
//! │                                                                     │
//! │  HTTP (axum routes, apps/api)                                       │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Workflows (SaleService / RefundService, apps/api)                  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ★ meridian-core (THIS CRATE) ★                                     │
//! │    types • money • status • balance • validation                    │
//! │    NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS               │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  meridian-db (SQLite repositories, stock ledger)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, Refund, StockLevel, ...)
//! - [`money`] - Money type with integer cents arithmetic
//! - [`status`] - Status derivation and totals computation
//! - [`balance`] - Remaining refundable balance bookkeeping
//! - [`validation`] - Boundary validation of requests
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: deterministic, trivially testable
//! 2. **No I/O**: database and network live in other crates
//! 3. **Integer money**: all monetary values are cents (i64)
//! 4. **Explicit errors**: typed enums, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balance::RefundableBalance;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use status::{compute_sale_totals, derive_status, total_matches, Totals};
pub use status::REFUND_TOLERANCE_CENTS;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines allowed in a single sale request.
///
/// Keeps transaction sizes reasonable; oversized requests are a client
/// error, not a workload to absorb.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typo-ordering (1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum length of a refund reason.
pub const MAX_REASON_LENGTH: usize = 500;
