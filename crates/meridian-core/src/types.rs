//! # Domain Types
//!
//! Core domain types for the sale/refund transaction engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Domain Types                                 │
//! │                                                                     │
//! │  ┌──────────────┐      ┌───────────────┐     ┌──────────────────┐  │
//! │  │     Sale     │ 1──N │   SaleLine    │     │   StockLevel     │  │
//! │  │  ──────────  │      │  ───────────  │     │  ──────────────  │  │
//! │  │  id (UUID)   │      │  product_id   │     │  (store_id,      │  │
//! │  │  store_id    │      │  quantity     │     │   product_id)    │  │
//! │  │  status      │      │  unit_price   │     │  quantity >= 0   │  │
//! │  │  total_cents │      └───────────────┘     └──────────────────┘  │
//! │  └──────┬───────┘                                                  │
//! │         │ 1──N                                                     │
//! │  ┌──────┴───────┐      ┌───────────────┐                           │
//! │  │    Refund    │ 1──N │  RefundLine   │                           │
//! │  │  id (UUID)   │      │  quantity     │                           │
//! │  │  sale_id     │      │  unit_price   │ (copied from sale line)   │
//! │  └──────────────┘      └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Sales and refunds carry UUID v4 ids used for relations; stores,
//! customers and products are referenced by external integer ids owned by
//! the catalog/store/user subsystems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle status of a sale.
///
/// ```text
/// active ──► completed ──► partially_refunded ──► refunded (terminal)
///    │            │                 ▲
///    │            └─────────────────┘ (refunds drive these transitions)
///    └──► cancelled (terminal, only before any refund)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale committed; stock decremented; no refunds yet.
    Active,
    /// Explicitly completed. Refund-wise synonymous with `Active`.
    Completed,
    /// Some but not all of the sale total has been refunded.
    PartiallyRefunded,
    /// The full sale total has been refunded. Terminal.
    Refunded,
    /// Sale cancelled and its stock restored. Terminal.
    Cancelled,
}

impl SaleStatus {
    /// Terminal states accept no further refunds or transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Refunded | SaleStatus::Cancelled)
    }

    /// States from which a refund may be created.
    #[inline]
    pub const fn is_refundable(&self) -> bool {
        matches!(
            self,
            SaleStatus::Active | SaleStatus::Completed | SaleStatus::PartiallyRefunded
        )
    }

    /// Stable string form, matching the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Active => "active",
            SaleStatus::Completed => "completed",
            SaleStatus::PartiallyRefunded => "partially_refunded",
            SaleStatus::Refunded => "refunded",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Active
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created atomically with its lines; after creation only `status` and
/// `updated_at` ever change. Never deleted (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub store_id: i64,
    pub customer_id: i64,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Tax rate in effect when the sale was created; refunds reuse it.
    pub tax_rate_bps: u32,
    /// Client-supplied key collapsing retried submissions into one effect.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the recorded tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a sale. Immutable once created.
///
/// `unit_price_cents` is frozen at sale time; refunds always reuse it
/// rather than re-pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// unit_price * quantity, precomputed at sale time.
    pub line_total_cents: i64,
    /// Entry order within the sale (0-based).
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Refund
// =============================================================================

/// A recorded reversal of part or all of a sale. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Refund {
    pub id: String,
    pub sale_id: String,
    pub store_id: i64,
    pub customer_id: i64,
    pub reason: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Refund Line
// =============================================================================

/// A line item in a refund.
///
/// Quantity is bounded by the original line quantity minus everything
/// previously refunded for the same product on the same sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RefundLine {
    pub id: String,
    pub refund_id: String,
    pub product_id: i64,
    pub quantity: i64,
    /// Copied from the original sale line, never re-priced.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Level
// =============================================================================

/// Quantity-on-hand counter for one product at one store.
///
/// Invariant: `quantity >= 0`, enforced by the ledger's conditional
/// decrement, not by callers checking first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub store_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Workflow Inputs
// =============================================================================

/// A requested sale line, validated at the boundary before entering the
/// workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSaleLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A validated sale creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub store_id: i64,
    pub customer_id: i64,
    pub lines: Vec<NewSaleLine>,
    /// Optional client-computed total, checked against the server-computed
    /// total within tolerance to catch client/server drift.
    pub declared_total_cents: Option<i64>,
    pub idempotency_key: Option<String>,
}

/// A requested refund line. Unit prices come from the original sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefundLine {
    pub product_id: i64,
    pub quantity: i64,
}

/// A validated refund creation request.
///
/// `lines: None` means "refund everything still refundable".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    pub sale_id: String,
    pub reason: String,
    pub lines: Option<Vec<NewRefundLine>>,
    pub idempotency_key: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Active);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SaleStatus::Refunded.is_terminal());
        assert!(SaleStatus::Cancelled.is_terminal());
        assert!(!SaleStatus::Active.is_terminal());
        assert!(!SaleStatus::PartiallyRefunded.is_terminal());
    }

    #[test]
    fn test_refundable_states() {
        assert!(SaleStatus::Active.is_refundable());
        assert!(SaleStatus::Completed.is_refundable());
        assert!(SaleStatus::PartiallyRefunded.is_refundable());
        assert!(!SaleStatus::Refunded.is_refundable());
        assert!(!SaleStatus::Cancelled.is_refundable());
    }

    #[test]
    fn test_status_as_str_roundtrip() {
        for status in [
            SaleStatus::Active,
            SaleStatus::Completed,
            SaleStatus::PartiallyRefunded,
            SaleStatus::Refunded,
            SaleStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
