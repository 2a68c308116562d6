//! # Repository Module
//!
//! Database repository implementations for Meridian.
//!
//! ## Transaction Convention
//! ```text
//! SaleService / RefundService (apps/api)
//!      │  db.begin() → Transaction
//!      ▼
//! repository methods taking &mut SqliteConnection
//!      │  join the caller's transaction; commit/rollback is the
//!      │  caller's decision
//!      ▼
//! SQLite
//! ```
//!
//! Pool-based methods (`get_*`, `list_*`) are standalone read paths.
//!
//! ## Available Repositories
//!
//! - [`stock::StockRepository`] - the stock ledger (conditional decrement,
//!   increment, lookup)
//! - [`sale::SaleRepository`] - sale and sale line operations
//! - [`refund::RefundRepository`] - refund operations and refund-history
//!   aggregation

pub mod refund;
pub mod sale;
pub mod stock;
