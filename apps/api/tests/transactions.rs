//! Integration tests for the sale/refund transaction engine.
//!
//! Each test runs against a fresh file-backed SQLite database so that
//! concurrent transactions behave as they do in production (WAL mode,
//! serialized writers).

use std::sync::Arc;

use tempfile::TempDir;

use meridian_api::invalidation::NoopInvalidator;
use meridian_api::{AppState, ErrorCode};
use meridian_core::{NewRefund, NewRefundLine, NewSale, NewSaleLine, SaleStatus, TaxRate};
use meridian_db::{Database, DbConfig};

async fn setup() -> (AppState, TempDir) {
    setup_with_tax(TaxRate::zero()).await
}

async fn setup_with_tax(rate: TaxRate) -> (AppState, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db = Database::new(DbConfig::new(dir.path().join("meridian.db")))
        .await
        .expect("failed to open database");
    let state = AppState::new(db, Arc::new(NoopInvalidator), rate);
    (state, dir)
}

fn sale_request(store_id: i64, lines: Vec<(i64, i64, i64)>) -> NewSale {
    NewSale {
        store_id,
        customer_id: 7,
        lines: lines
            .into_iter()
            .map(|(product_id, quantity, unit_price_cents)| NewSaleLine {
                product_id,
                quantity,
                unit_price_cents,
            })
            .collect(),
        declared_total_cents: None,
        idempotency_key: None,
    }
}

fn full_refund(sale_id: &str) -> NewRefund {
    NewRefund {
        sale_id: sale_id.to_string(),
        reason: "customer returned items".to_string(),
        lines: None,
        idempotency_key: None,
    }
}

fn partial_refund(sale_id: &str, lines: Vec<(i64, i64)>) -> NewRefund {
    NewRefund {
        sale_id: sale_id.to_string(),
        reason: "customer returned items".to_string(),
        lines: Some(
            lines
                .into_iter()
                .map(|(product_id, quantity)| NewRefundLine {
                    product_id,
                    quantity,
                })
                .collect(),
        ),
        idempotency_key: None,
    }
}

// =============================================================================
// Sale Creation
// =============================================================================

#[tokio::test]
async fn sale_decrements_stock_and_computes_total() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let result = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    assert_eq!(result.sale.total_cents, 2997);
    assert_eq!(result.sale.status, SaleStatus::Active);
    assert_eq!(result.lines.len(), 1);
    assert_eq!(result.lines[0].line_total_cents, 2997);
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 2);
}

#[tokio::test]
async fn sale_fails_when_stock_insufficient() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 2).await.unwrap();

    let err = state
        .sales
        .create_sale(sale_request(1, vec![(10, 10, 999)]))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    // shortfall reported back to the caller
    assert!(err.message.contains("available 2"));
    assert!(err.message.contains("requested 10"));
    // nothing was mutated
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 2);
}

#[tokio::test]
async fn multi_line_sale_is_all_or_nothing() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();
    state.stock.set_level(1, 20, 1).await.unwrap();

    // Line 1 would succeed; line 2 cannot. Neither may leave a trace.
    let err = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999), (20, 2, 500)]))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);
    assert_eq!(state.stock.get_level(1, 20).await.unwrap(), 1);
}

#[tokio::test]
async fn sale_rejects_empty_and_malformed_lines() {
    let (state, _dir) = setup().await;

    let err = state
        .sales
        .create_sale(sale_request(1, vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let err = state
        .sales
        .create_sale(sale_request(1, vec![(10, 0, 999)]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let err = state
        .sales
        .create_sale(sale_request(1, vec![(10, 1, -5)]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[tokio::test]
async fn sale_rejects_mismatched_declared_total() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let mut request = sale_request(1, vec![(10, 3, 999)]);
    request.declared_total_cents = Some(9999);

    let err = state.sales.create_sale(request).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    // rejected before any stock mutation
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);
}

#[tokio::test]
async fn sale_accepts_declared_total_within_tolerance() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let mut request = sale_request(1, vec![(10, 3, 999)]);
    request.declared_total_cents = Some(2996); // 1 cent off

    let result = state.sales.create_sale(request).await.unwrap();
    // server-computed total wins
    assert_eq!(result.sale.total_cents, 2997);
}

#[tokio::test]
async fn sale_applies_configured_tax_rate() {
    let (state, _dir) = setup_with_tax(TaxRate::from_bps(825)).await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let result = state
        .sales
        .create_sale(sale_request(1, vec![(10, 2, 500)]))
        .await
        .unwrap();

    assert_eq!(result.sale.subtotal_cents, 1000);
    assert_eq!(result.sale.tax_cents, 83);
    assert_eq!(result.sale.total_cents, 1083);
}

#[tokio::test]
async fn concurrent_sales_on_same_stock_one_wins() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let first = state.sales.clone();
    let second = state.sales.clone();
    let (r1, r2) = tokio::join!(
        first.create_sale(sale_request(1, vec![(10, 3, 999)])),
        second.create_sale(sale_request(1, vec![(10, 3, 999)]))
    );

    let results = [r1, r2];
    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok_count, 1, "exactly one of the two sales must succeed");

    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one sale must have failed");
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 2);
}

#[tokio::test]
async fn sale_idempotency_key_collapses_retries() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let mut request = sale_request(1, vec![(10, 3, 999)]);
    request.idempotency_key = Some("checkout-42".to_string());

    let first = state.sales.create_sale(request.clone()).await.unwrap();
    let second = state.sales.create_sale(request).await.unwrap();

    assert_eq!(first.sale.id, second.sale.id);
    // stock decremented exactly once
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 2);
}

// =============================================================================
// Refunds
// =============================================================================

#[tokio::test]
async fn full_refund_restores_stock_and_marks_sale_refunded() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    let refund = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap();

    assert_eq!(refund.refund.total_cents, 2997);
    assert_eq!(refund.lines.len(), 1);
    assert_eq!(refund.lines[0].quantity, 3);
    // price copied from the sale line, not re-priced
    assert_eq!(refund.lines[0].unit_price_cents, 999);

    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);

    let detail = state.sales.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::Refunded);
}

#[tokio::test]
async fn partial_refund_marks_sale_partially_refunded() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();
    state.stock.set_level(1, 20, 5).await.unwrap();

    // line A: qty 2, line B: qty 3
    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 2, 999), (20, 3, 500)]))
        .await
        .unwrap();
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 3);
    assert_eq!(state.stock.get_level(1, 20).await.unwrap(), 2);

    // refund 1 unit of line A only
    let refund = state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(10, 1)]))
        .await
        .unwrap();

    assert_eq!(refund.refund.total_cents, 999);
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 4);
    // line B untouched
    assert_eq!(state.stock.get_level(1, 20).await.unwrap(), 2);

    let detail = state.sales.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::PartiallyRefunded);
}

#[tokio::test]
async fn refund_cannot_exceed_remaining_refundable_quantity() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 10).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 6, 999)]))
        .await
        .unwrap();

    // refund 4 of 6, leaving 2 refundable
    state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(10, 4)]))
        .await
        .unwrap();

    // attempting 4 more must fail: only 2 remain
    let err = state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(10, 4)]))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::RefundExceedsOriginal);
    assert!(err.message.contains("remaining refundable quantity (2)"));
}

#[tokio::test]
async fn sequential_partial_refunds_reach_refunded_status() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 10).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 6, 999)]))
        .await
        .unwrap();

    state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(10, 4)]))
        .await
        .unwrap();

    let detail = state.sales.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::PartiallyRefunded);

    // a full-scope refund picks up exactly the remaining 2 units
    let refund = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap();
    assert_eq!(refund.lines[0].quantity, 2);

    let detail = state.sales.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::Refunded);
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 10);
}

#[tokio::test]
async fn refunded_sale_accepts_no_further_refunds() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap();

    let err = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidSaleState);
    // stock unchanged by the rejected refund
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);
}

#[tokio::test]
async fn refund_of_unknown_sale_is_not_found() {
    let (state, _dir) = setup().await;

    let err = state
        .refunds
        .create_refund(full_refund("2d9e1f39-0c0f-4c0e-a6a3-31337cafe000"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn refund_of_product_not_on_sale_is_rejected() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    let err = state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(99, 1)]))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::RefundExceedsOriginal);
}

#[tokio::test]
async fn refund_uses_sale_recorded_tax_rate() {
    let (state, _dir) = setup_with_tax(TaxRate::from_bps(825)).await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 2, 500)]))
        .await
        .unwrap();
    assert_eq!(sale.sale.total_cents, 1083);

    let refund = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap();

    assert_eq!(refund.refund.subtotal_cents, 1000);
    assert_eq!(refund.refund.tax_cents, 83);
    assert_eq!(refund.refund.total_cents, 1083);

    let detail = state.sales.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(detail.sale.status, SaleStatus::Refunded);
}

#[tokio::test]
async fn refund_idempotency_key_collapses_retries() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    let mut request = full_refund(&sale.sale.id);
    request.idempotency_key = Some("return-42".to_string());

    let first = state.refunds.create_refund(request.clone()).await.unwrap();
    let second = state.refunds.create_refund(request).await.unwrap();

    assert_eq!(first.refund.id, second.refund.id);
    // stock restored exactly once
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);
}

// =============================================================================
// Completion & Cancellation
// =============================================================================

#[tokio::test]
async fn completed_sale_remains_refundable() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    let completed = state.sales.complete_sale(&sale.sale.id).await.unwrap();
    assert_eq!(completed.status, SaleStatus::Completed);

    let refund = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap();
    assert_eq!(refund.refund.total_cents, 2997);
}

#[tokio::test]
async fn cancel_restores_stock_and_blocks_refunds() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 2);

    let cancelled = state.sales.cancel_sale(&sale.sale.id).await.unwrap();
    assert_eq!(cancelled.status, SaleStatus::Cancelled);
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 5);

    let err = state
        .refunds
        .create_refund(full_refund(&sale.sale.id))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSaleState);
}

#[tokio::test]
async fn cancel_is_rejected_once_a_refund_exists() {
    let (state, _dir) = setup().await;
    state.stock.set_level(1, 10, 5).await.unwrap();

    let sale = state
        .sales
        .create_sale(sale_request(1, vec![(10, 3, 999)]))
        .await
        .unwrap();

    state
        .refunds
        .create_refund(partial_refund(&sale.sale.id, vec![(10, 1)]))
        .await
        .unwrap();

    let err = state.sales.cancel_sale(&sale.sale.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSaleState);
    // refunded unit stays restored, sold units stay decremented
    assert_eq!(state.stock.get_level(1, 10).await.unwrap(), 3);
}
