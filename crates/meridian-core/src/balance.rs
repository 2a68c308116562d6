//! # Refundable Balance
//!
//! Pure bookkeeping for how much of a sale is still refundable, per
//! product. Balances are always rebuilt from the persisted sale lines and
//! the aggregated, persisted refund lines of that sale — never from a
//! cached running counter — so concurrent refunds cannot drift.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{NewRefundLine, SaleLine};

/// One product's refundable position on a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BalanceEntry {
    product_id: i64,
    original_quantity: i64,
    refunded_quantity: i64,
    unit_price_cents: i64,
}

impl BalanceEntry {
    #[inline]
    fn remaining(&self) -> i64 {
        self.original_quantity - self.refunded_quantity
    }
}

/// Remaining refundable quantities for every product on a sale, in sale
/// line entry order.
#[derive(Debug, Clone)]
pub struct RefundableBalance {
    entries: Vec<BalanceEntry>,
}

impl RefundableBalance {
    /// Builds the balance from a sale's lines and the per-product refunded
    /// quantities aggregated over all prior refunds of that sale.
    ///
    /// Sale validation guarantees one line per product, so lines map 1:1
    /// to entries.
    pub fn new(sale_lines: &[SaleLine], refunded_quantities: &[(i64, i64)]) -> Self {
        let entries = sale_lines
            .iter()
            .map(|line| {
                let refunded = refunded_quantities
                    .iter()
                    .find(|(product_id, _)| *product_id == line.product_id)
                    .map(|(_, quantity)| *quantity)
                    .unwrap_or(0);
                BalanceEntry {
                    product_id: line.product_id,
                    original_quantity: line.quantity,
                    refunded_quantity: refunded,
                    unit_price_cents: line.unit_price_cents,
                }
            })
            .collect();
        RefundableBalance { entries }
    }

    /// Remaining refundable quantity for a product; zero when the product
    /// is not on the sale.
    pub fn remaining_for(&self, product_id: i64) -> i64 {
        self.entries
            .iter()
            .find(|entry| entry.product_id == product_id)
            .map(BalanceEntry::remaining)
            .unwrap_or(0)
    }

    /// Original unit price for a product, if it is on the sale.
    pub fn unit_price_for(&self, product_id: i64) -> Option<i64> {
        self.entries
            .iter()
            .find(|entry| entry.product_id == product_id)
            .map(|entry| entry.unit_price_cents)
    }

    /// True when no line has any refundable quantity left.
    pub fn is_exhausted(&self) -> bool {
        self.entries.iter().all(|entry| entry.remaining() <= 0)
    }

    /// Resolves a full refund: every product's remaining quantity, in sale
    /// line order, skipping exhausted lines.
    pub fn resolve_full_scope(&self) -> Vec<NewRefundLine> {
        self.entries
            .iter()
            .filter(|entry| entry.remaining() > 0)
            .map(|entry| NewRefundLine {
                product_id: entry.product_id,
                quantity: entry.remaining(),
            })
            .collect()
    }

    /// Validates a requested refund scope against the remaining balances.
    ///
    /// A product absent from the sale has a remaining balance of zero and
    /// fails the same bound.
    pub fn check_requested(&self, requested: &[NewRefundLine]) -> CoreResult<()> {
        for line in requested {
            let remaining = self.remaining_for(line.product_id);
            if line.quantity > remaining {
                return Err(CoreError::RefundExceedsOriginal {
                    product_id: line.product_id,
                    requested: line.quantity,
                    remaining,
                });
            }
        }
        Ok(())
    }

    /// Subtotal of a refund scope at the ORIGINAL sale unit prices.
    ///
    /// Callers must have run `check_requested` first; an unknown product
    /// here would already have failed the quantity bound.
    pub fn subtotal_of(&self, scope: &[NewRefundLine]) -> Money {
        scope.iter().fold(Money::zero(), |acc, line| {
            let unit_price = self.unit_price_for(line.product_id).unwrap_or(0);
            acc + Money::from_cents(unit_price).multiply_quantity(line.quantity)
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sale_line(product_id: i64, quantity: i64, unit_price_cents: i64) -> SaleLine {
        SaleLine {
            id: format!("line-{product_id}"),
            sale_id: "sale-1".to_string(),
            product_id,
            quantity,
            unit_price_cents,
            line_total_cents: quantity * unit_price_cents,
            position: 0,
            created_at: Utc::now(),
        }
    }

    fn requested(product_id: i64, quantity: i64) -> NewRefundLine {
        NewRefundLine {
            product_id,
            quantity,
        }
    }

    #[test]
    fn test_remaining_without_prior_refunds() {
        let balance = RefundableBalance::new(&[sale_line(10, 3, 999)], &[]);
        assert_eq!(balance.remaining_for(10), 3);
        assert_eq!(balance.remaining_for(99), 0);
        assert!(!balance.is_exhausted());
    }

    #[test]
    fn test_remaining_after_prior_refund() {
        let balance = RefundableBalance::new(&[sale_line(10, 3, 999)], &[(10, 2)]);
        assert_eq!(balance.remaining_for(10), 1);
    }

    #[test]
    fn test_exhausted() {
        let balance = RefundableBalance::new(&[sale_line(10, 3, 999)], &[(10, 3)]);
        assert!(balance.is_exhausted());
        assert!(balance.resolve_full_scope().is_empty());
    }

    #[test]
    fn test_resolve_full_scope_preserves_line_order() {
        let balance = RefundableBalance::new(
            &[sale_line(20, 2, 500), sale_line(10, 3, 999)],
            &[(20, 2)],
        );
        let scope = balance.resolve_full_scope();
        assert_eq!(scope.len(), 1);
        assert_eq!(scope[0].product_id, 10);
        assert_eq!(scope[0].quantity, 3);
    }

    #[test]
    fn test_check_requested_within_bounds() {
        let balance = RefundableBalance::new(&[sale_line(10, 3, 999)], &[(10, 1)]);
        assert!(balance.check_requested(&[requested(10, 2)]).is_ok());
    }

    #[test]
    fn test_check_requested_exceeds_remaining() {
        // 2 units remain after a prior refund of the others
        let balance = RefundableBalance::new(&[sale_line(10, 6, 999)], &[(10, 4)]);
        let err = balance.check_requested(&[requested(10, 4)]).unwrap_err();
        match err {
            CoreError::RefundExceedsOriginal {
                product_id,
                requested,
                remaining,
            } => {
                assert_eq!(product_id, 10);
                assert_eq!(requested, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_requested_unknown_product() {
        let balance = RefundableBalance::new(&[sale_line(10, 3, 999)], &[]);
        let err = balance.check_requested(&[requested(42, 1)]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::RefundExceedsOriginal {
                product_id: 42,
                remaining: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_subtotal_uses_original_prices() {
        let balance = RefundableBalance::new(
            &[sale_line(10, 3, 999), sale_line(20, 2, 500)],
            &[],
        );
        let subtotal = balance.subtotal_of(&[requested(10, 1), requested(20, 2)]);
        assert_eq!(subtotal.cents(), 999 + 1000);
    }
}
