//! # Status Derivation & Sale Totals
//!
//! The single place where a sale's lifecycle status is derived from its
//! refund history, and where sale totals are computed. Both the sale and
//! refund workflows call the same functions so the logic cannot diverge
//! across code paths.

use crate::money::Money;
use crate::types::{NewSaleLine, SaleStatus, TaxRate};

/// Rounding tolerance, in cents, for comparing cumulative refund totals
/// against the sale total (0.01 currency units).
pub const REFUND_TOLERANCE_CENTS: i64 = 1;

// =============================================================================
// Totals
// =============================================================================

/// Server-computed monetary totals for a sale or a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl Totals {
    /// Computes totals from a subtotal: tax is applied once to the
    /// subtotal at the given rate, total = subtotal + tax.
    pub fn from_subtotal(subtotal: Money, rate: TaxRate) -> Self {
        let tax = subtotal.calculate_tax(rate);
        Totals {
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: (subtotal + tax).cents(),
        }
    }
}

/// Computes the totals of a requested sale: subtotal is the sum of
/// `quantity * unit_price` over the lines in entry order.
pub fn compute_sale_totals(lines: &[NewSaleLine], rate: TaxRate) -> Totals {
    let subtotal = lines.iter().fold(Money::zero(), |acc, line| {
        acc + Money::from_cents(line.unit_price_cents).multiply_quantity(line.quantity)
    });
    Totals::from_subtotal(subtotal, rate)
}

/// Checks a client-declared total against the server-computed total.
///
/// Drift within the tolerance is accepted; the server-computed value is
/// what gets persisted either way.
pub fn total_matches(declared_cents: i64, computed_cents: i64) -> bool {
    (declared_cents - computed_cents).abs() <= REFUND_TOLERANCE_CENTS
}

// =============================================================================
// Status Derivation
// =============================================================================

/// Derives a sale's lifecycle status from its cumulative refunded total.
///
/// - no refunds recorded: `Active`
/// - cumulative refunds cover the total (within tolerance): `Refunded`
/// - anything in between: `PartiallyRefunded`
///
/// `refunded_cents` must be re-derived from persisted refund rows, never
/// from a cached running counter.
pub fn derive_status(total_cents: i64, refunded_cents: i64) -> SaleStatus {
    if refunded_cents <= 0 {
        SaleStatus::Active
    } else if refunded_cents + REFUND_TOLERANCE_CENTS >= total_cents {
        SaleStatus::Refunded
    } else {
        SaleStatus::PartiallyRefunded
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i64, quantity: i64, unit_price_cents: i64) -> NewSaleLine {
        NewSaleLine {
            product_id,
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_compute_sale_totals_no_tax() {
        // 3 x $9.99 = $29.97
        let totals = compute_sale_totals(&[line(10, 3, 999)], TaxRate::zero());
        assert_eq!(totals.subtotal_cents, 2997);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 2997);
    }

    #[test]
    fn test_compute_sale_totals_multi_line_with_tax() {
        // 2 x $5.00 + 3 x $2.00 = $16.00, 8.25% tax = $1.32
        let totals =
            compute_sale_totals(&[line(1, 2, 500), line(2, 3, 200)], TaxRate::from_bps(825));
        assert_eq!(totals.subtotal_cents, 1600);
        assert_eq!(totals.tax_cents, 132);
        assert_eq!(totals.total_cents, 1732);
    }

    #[test]
    fn test_total_matches_within_tolerance() {
        assert!(total_matches(2997, 2997));
        assert!(total_matches(2996, 2997));
        assert!(total_matches(2998, 2997));
        assert!(!total_matches(2995, 2997));
        assert!(!total_matches(3000, 2997));
    }

    #[test]
    fn test_derive_status_no_refunds() {
        assert_eq!(derive_status(2997, 0), SaleStatus::Active);
    }

    #[test]
    fn test_derive_status_partial() {
        assert_eq!(derive_status(2997, 999), SaleStatus::PartiallyRefunded);
    }

    #[test]
    fn test_derive_status_full() {
        assert_eq!(derive_status(2997, 2997), SaleStatus::Refunded);
    }

    #[test]
    fn test_derive_status_within_tolerance() {
        // 1 cent short still counts as fully refunded
        assert_eq!(derive_status(2997, 2996), SaleStatus::Refunded);
        // 2 cents short does not
        assert_eq!(derive_status(2997, 2995), SaleStatus::PartiallyRefunded);
    }
}
