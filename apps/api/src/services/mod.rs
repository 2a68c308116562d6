//! # Service Layer
//!
//! The workflows of the transaction engine. Each service owns its
//! transaction boundaries: repositories contribute statements to a
//! transaction the service begins, and either everything commits or
//! nothing does.
//!
//! - [`sales::SaleService`] - sale creation, completion, cancellation
//! - [`refunds::RefundService`] - refund creation against a sale
//! - [`stock::StockService`] - stock lookup and receiving

pub mod refunds;
pub mod sales;
pub mod stock;

pub use refunds::{RefundService, RefundWithLines};
pub use sales::{SaleDetail, SaleService, SaleWithLines};
pub use stock::StockService;

use meridian_db::DbError;

/// True when an insert lost an idempotency-key race: another request with
/// the same key committed first. The caller resolves this by returning
/// the winner's row.
pub(crate) fn is_idempotency_conflict(err: &DbError) -> bool {
    matches!(err, DbError::UniqueViolation { field, .. } if field.contains("idempotency_key"))
}
