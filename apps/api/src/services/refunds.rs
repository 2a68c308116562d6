//! # Refund Workflow
//!
//! Converts a refund request into durable state: a refund with its lines,
//! the matching stock restorations, and the sale's recomputed lifecycle
//! status — all in one transaction.
//!
//! ## Refund Creation
//! ```text
//! validate request ──► idempotency replay check
//!        │
//!        ▼
//! ┌──────────────────── ONE TRANSACTION ────────────────────┐
//! │  load sale            (not found / terminal? error out) │
//! │  rebuild refundable balance from persisted rows         │
//! │  resolve scope        (omitted lines = all remaining)   │
//! │  check bounds         (per-product quantity limits)     │
//! │  for each refunded line: stock.increment()              │
//! │  insert refund header + lines                           │
//! │  recompute cumulative refunded total from rows          │
//! │  derive and persist the sale's new status               │
//! └──────────────────────── COMMIT ─────────────────────────┘
//!        │
//!        ▼
//! fire-and-forget cache invalidation (failure only logged)
//! ```
//!
//! Refund totals always use the ORIGINAL sale's unit prices and the tax
//! rate recorded on the sale; nothing is re-priced at refund time.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use meridian_core::{
    derive_status, validation, CoreError, NewRefund, Refund, RefundLine, RefundableBalance,
    Totals,
};
use meridian_db::repository::refund::{generate_refund_id, generate_refund_line_id};
use meridian_db::Database;

use crate::error::ApiError;
use crate::invalidation::{spawn_invalidation, stock_keys, InvalidationSink};
use crate::services::is_idempotency_conflict;

/// A refund together with its lines, in entry order.
#[derive(Debug, Clone)]
pub struct RefundWithLines {
    pub refund: Refund,
    pub lines: Vec<RefundLine>,
}

/// The refund workflow service.
#[derive(Clone)]
pub struct RefundService {
    db: Database,
    invalidator: Arc<dyn InvalidationSink>,
}

impl RefundService {
    /// Creates a new RefundService.
    pub fn new(db: Database, invalidator: Arc<dyn InvalidationSink>) -> Self {
        RefundService { db, invalidator }
    }

    /// Creates a refund against a sale: stock restoration, refund rows and
    /// the sale's status update commit together, or not at all.
    pub async fn create_refund(&self, request: NewRefund) -> Result<RefundWithLines, ApiError> {
        validation::validate_new_refund(&request)?;

        // Replay of an already-processed submission returns the stored
        // refund
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.db.refunds().get_by_idempotency_key(key).await? {
                debug!(refund_id = %existing.id, "Idempotent refund replay");
                let lines = self.db.refunds().get_lines(&existing.id).await?;
                return Ok(RefundWithLines {
                    refund: existing,
                    lines,
                });
            }
        }

        let mut tx = self.db.begin().await?;

        let sale = self
            .db
            .sales()
            .fetch_by_id(&mut tx, &request.sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(request.sale_id.clone()))?;

        if !sale.status.is_refundable() {
            return Err(CoreError::InvalidSaleState {
                sale_id: sale.id,
                status: sale.status.as_str().to_string(),
            }
            .into());
        }

        // The authoritative refund history comes from persisted rows read
        // inside this transaction, never from a cached counter.
        let sale_lines = self.db.sales().fetch_lines(&mut tx, &sale.id).await?;
        let refunded = self
            .db
            .refunds()
            .refunded_quantities(&mut tx, &sale.id)
            .await?;
        let balance = RefundableBalance::new(&sale_lines, &refunded);

        let scope = match &request.lines {
            Some(lines) => {
                balance.check_requested(lines)?;
                lines.clone()
            }
            None => {
                let scope = balance.resolve_full_scope();
                if scope.is_empty() {
                    return Err(CoreError::NothingRefundable {
                        sale_id: sale.id.clone(),
                    }
                    .into());
                }
                scope
            }
        };

        let totals = Totals::from_subtotal(balance.subtotal_of(&scope), sale.tax_rate());

        let now = Utc::now();
        let refund = Refund {
            id: generate_refund_id(),
            sale_id: sale.id.clone(),
            store_id: sale.store_id,
            customer_id: sale.customer_id,
            reason: request.reason.trim().to_string(),
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            idempotency_key: request.idempotency_key.clone(),
            created_at: now,
        };

        for line in &scope {
            self.db
                .stock()
                .increment(&mut tx, sale.store_id, line.product_id, line.quantity)
                .await?;
        }

        if let Err(err) = self.db.refunds().insert_refund(&mut tx, &refund).await {
            // A concurrent submission with the same idempotency key won the
            // insert race; its committed refund is the single effect.
            if is_idempotency_conflict(&err) {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback after idempotency conflict failed");
                }
                return self.replay_by_key(&request, err).await;
            }
            return Err(err.into());
        }

        let mut lines = Vec::with_capacity(scope.len());
        for (position, requested) in scope.iter().enumerate() {
            let unit_price_cents = balance.unit_price_for(requested.product_id).unwrap_or(0);
            let line = RefundLine {
                id: generate_refund_line_id(),
                refund_id: refund.id.clone(),
                product_id: requested.product_id,
                quantity: requested.quantity,
                unit_price_cents,
                line_total_cents: unit_price_cents * requested.quantity,
                position: position as i64,
                created_at: now,
            };
            self.db.refunds().insert_line(&mut tx, &line).await?;
            lines.push(line);
        }

        // Cumulative total re-derived from rows, including the refund just
        // inserted; the shared derivation decides the new status.
        let cumulative = self
            .db
            .refunds()
            .refunded_total_cents(&mut tx, &sale.id)
            .await?;
        let status = derive_status(sale.total_cents, cumulative);
        self.db
            .sales()
            .update_status(&mut tx, &sale.id, status, now)
            .await?;

        tx.commit().await.map_err(meridian_db::DbError::from)?;

        info!(
            refund_id = %refund.id,
            sale_id = %refund.sale_id,
            total_cents = refund.total_cents,
            sale_status = status.as_str(),
            "Refund created"
        );

        spawn_invalidation(
            self.invalidator.clone(),
            stock_keys(sale.store_id, lines.iter().map(|line| line.product_id)),
        );

        Ok(RefundWithLines { refund, lines })
    }

    async fn replay_by_key(
        &self,
        request: &NewRefund,
        original: meridian_db::DbError,
    ) -> Result<RefundWithLines, ApiError> {
        let key = request
            .idempotency_key
            .as_deref()
            .ok_or_else(|| ApiError::from(original))?;

        match self.db.refunds().get_by_idempotency_key(key).await? {
            Some(refund) => {
                debug!(refund_id = %refund.id, "Idempotent refund replay after insert race");
                let lines = self.db.refunds().get_lines(&refund.id).await?;
                Ok(RefundWithLines { refund, lines })
            }
            None => Err(meridian_db::DbError::TransactionFailed(
                "concurrent duplicate submission".to_string(),
            )
            .into()),
        }
    }

    /// Loads a refund with its lines.
    pub async fn get_refund(&self, refund_id: &str) -> Result<RefundWithLines, ApiError> {
        let refund = self
            .db
            .refunds()
            .get_by_id(refund_id)
            .await?
            .ok_or_else(|| CoreError::RefundNotFound(refund_id.to_string()))?;

        let lines = self.db.refunds().get_lines(refund_id).await?;

        Ok(RefundWithLines { refund, lines })
    }
}
