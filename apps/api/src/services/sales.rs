//! # Sale Workflow
//!
//! Converts a validated purchase request into durable state: a sale header
//! with its lines, and the matching stock decrements — all in one
//! transaction.
//!
//! ## Sale Creation
//! ```text
//! validate request ──► compute totals ──► idempotency replay check
//!        │
//!        ▼
//! ┌──────────────────── ONE TRANSACTION ────────────────────┐
//! │  for each line (request order):                         │
//! │      stock.try_decrement()                              │
//! │          └── Insufficient? ROLLBACK, return error       │
//! │  insert sale header (status: active)                    │
//! │  insert every sale line                                 │
//! └──────────────────────── COMMIT ─────────────────────────┘
//!        │
//!        ▼
//! fire-and-forget cache invalidation (failure only logged)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use meridian_core::{
    compute_sale_totals, derive_status, total_matches, validation, CoreError, NewSale, Refund,
    RefundLine, Sale, SaleLine, SaleStatus, TaxRate, ValidationError,
};
use meridian_db::repository::sale::{generate_sale_id, generate_sale_line_id};
use meridian_db::{Database, StockDecrement};

use crate::error::ApiError;
use crate::invalidation::{spawn_invalidation, stock_keys, InvalidationSink};
use crate::services::is_idempotency_conflict;

/// A sale together with its lines, in entry order.
#[derive(Debug, Clone)]
pub struct SaleWithLines {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

/// Full read model of a sale: lines plus refund history.
#[derive(Debug, Clone)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub refunds: Vec<(Refund, Vec<RefundLine>)>,
}

/// The sale workflow service.
#[derive(Clone)]
pub struct SaleService {
    db: Database,
    invalidator: Arc<dyn InvalidationSink>,
    tax_rate: TaxRate,
}

impl SaleService {
    /// Creates a new SaleService.
    pub fn new(db: Database, invalidator: Arc<dyn InvalidationSink>, tax_rate: TaxRate) -> Self {
        SaleService {
            db,
            invalidator,
            tax_rate,
        }
    }

    /// Creates a sale: all stock decrements and all rows, or nothing.
    pub async fn create_sale(&self, request: NewSale) -> Result<SaleWithLines, ApiError> {
        validation::validate_new_sale(&request)?;

        let totals = compute_sale_totals(&request.lines, self.tax_rate);

        // Defense-in-depth against client/server drift; the server-computed
        // total is what gets persisted either way.
        if let Some(declared) = request.declared_total_cents {
            if !total_matches(declared, totals.total_cents) {
                return Err(ValidationError::TotalMismatch {
                    declared_cents: declared,
                    computed_cents: totals.total_cents,
                }
                .into());
            }
        }

        // Replay of an already-processed submission returns the stored sale
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.db.sales().get_by_idempotency_key(key).await? {
                debug!(sale_id = %existing.id, "Idempotent sale replay");
                let lines = self.db.sales().get_lines(&existing.id).await?;
                return Ok(SaleWithLines {
                    sale: existing,
                    lines,
                });
            }
        }

        let now = Utc::now();
        let sale = Sale {
            id: generate_sale_id(),
            store_id: request.store_id,
            customer_id: request.customer_id,
            status: derive_status(totals.total_cents, 0),
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            tax_rate_bps: self.tax_rate.bps(),
            idempotency_key: request.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;

        // Lines are processed in request order; the first shortfall aborts
        // the whole sale with no partial stock mutation.
        for line in &request.lines {
            let outcome = self
                .db
                .stock()
                .try_decrement(&mut tx, request.store_id, line.product_id, line.quantity)
                .await?;

            if let StockDecrement::Insufficient { available } = outcome {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback after insufficient stock failed");
                }
                return Err(CoreError::InsufficientStock {
                    store_id: request.store_id,
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                }
                .into());
            }
        }

        if let Err(err) = self.db.sales().insert_sale(&mut tx, &sale).await {
            // A concurrent submission with the same idempotency key won the
            // insert race; its committed sale is the single effect.
            if is_idempotency_conflict(&err) {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback after idempotency conflict failed");
                }
                return self.replay_by_key(&request, err).await;
            }
            return Err(err.into());
        }

        let mut lines = Vec::with_capacity(request.lines.len());
        for (position, requested) in request.lines.iter().enumerate() {
            let line = SaleLine {
                id: generate_sale_line_id(),
                sale_id: sale.id.clone(),
                product_id: requested.product_id,
                quantity: requested.quantity,
                unit_price_cents: requested.unit_price_cents,
                line_total_cents: requested.unit_price_cents * requested.quantity,
                position: position as i64,
                created_at: now,
            };
            self.db.sales().insert_line(&mut tx, &line).await?;
            lines.push(line);
        }

        tx.commit().await.map_err(meridian_db::DbError::from)?;

        info!(
            sale_id = %sale.id,
            store_id = sale.store_id,
            total_cents = sale.total_cents,
            line_count = lines.len(),
            "Sale created"
        );

        spawn_invalidation(
            self.invalidator.clone(),
            stock_keys(sale.store_id, lines.iter().map(|line| line.product_id)),
        );

        Ok(SaleWithLines { sale, lines })
    }

    async fn replay_by_key(
        &self,
        request: &NewSale,
        original: meridian_db::DbError,
    ) -> Result<SaleWithLines, ApiError> {
        let key = request
            .idempotency_key
            .as_deref()
            .ok_or_else(|| ApiError::from(original))?;

        match self.db.sales().get_by_idempotency_key(key).await? {
            Some(sale) => {
                debug!(sale_id = %sale.id, "Idempotent sale replay after insert race");
                let lines = self.db.sales().get_lines(&sale.id).await?;
                Ok(SaleWithLines { sale, lines })
            }
            None => Err(meridian_db::DbError::TransactionFailed(
                "concurrent duplicate submission".to_string(),
            )
            .into()),
        }
    }

    /// Loads a sale with its lines and full refund history.
    pub async fn get_sale(&self, sale_id: &str) -> Result<SaleDetail, ApiError> {
        let sale = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        let lines = self.db.sales().get_lines(sale_id).await?;

        let mut refunds = Vec::new();
        for refund in self.db.refunds().list_for_sale(sale_id).await? {
            let refund_lines = self.db.refunds().get_lines(&refund.id).await?;
            refunds.push((refund, refund_lines));
        }

        Ok(SaleDetail {
            sale,
            lines,
            refunds,
        })
    }

    /// Marks an active sale as completed.
    pub async fn complete_sale(&self, sale_id: &str) -> Result<Sale, ApiError> {
        let mut tx = self.db.begin().await?;

        let mut sale = self
            .db
            .sales()
            .fetch_by_id(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.status != SaleStatus::Active {
            return Err(CoreError::InvalidSaleState {
                sale_id: sale.id,
                status: sale.status.as_str().to_string(),
            }
            .into());
        }

        let now = Utc::now();
        self.db
            .sales()
            .update_status(&mut tx, sale_id, SaleStatus::Completed, now)
            .await?;

        tx.commit().await.map_err(meridian_db::DbError::from)?;

        sale.status = SaleStatus::Completed;
        sale.updated_at = now;

        info!(sale_id = %sale.id, "Sale completed");

        spawn_invalidation(
            self.invalidator.clone(),
            crate::invalidation::sale_keys(sale.store_id, &sale.id),
        );

        Ok(sale)
    }

    /// Cancels a sale and restores its stock.
    ///
    /// Only allowed before any refund exists; a partially refunded sale
    /// must be unwound through further refunds instead.
    pub async fn cancel_sale(&self, sale_id: &str) -> Result<Sale, ApiError> {
        let mut tx = self.db.begin().await?;

        let mut sale = self
            .db
            .sales()
            .fetch_by_id(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        let cancellable = matches!(sale.status, SaleStatus::Active | SaleStatus::Completed);
        if !cancellable || self.db.refunds().sale_has_refunds(&mut tx, sale_id).await? {
            return Err(CoreError::InvalidSaleState {
                sale_id: sale.id,
                status: sale.status.as_str().to_string(),
            }
            .into());
        }

        let lines = self.db.sales().fetch_lines(&mut tx, sale_id).await?;
        for line in &lines {
            self.db
                .stock()
                .increment(&mut tx, sale.store_id, line.product_id, line.quantity)
                .await?;
        }

        let now = Utc::now();
        self.db
            .sales()
            .update_status(&mut tx, sale_id, SaleStatus::Cancelled, now)
            .await?;

        tx.commit().await.map_err(meridian_db::DbError::from)?;

        sale.status = SaleStatus::Cancelled;
        sale.updated_at = now;

        info!(sale_id = %sale.id, "Sale cancelled, stock restored");

        spawn_invalidation(
            self.invalidator.clone(),
            stock_keys(sale.store_id, lines.iter().map(|line| line.product_id)),
        );

        Ok(sale)
    }
}
