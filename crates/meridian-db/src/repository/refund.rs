//! # Refund Repository
//!
//! Database operations for refunds and refund lines, plus the aggregation
//! queries the refund workflow uses to re-derive a sale's refund history.
//!
//! Refunds are append-only: no update or delete methods exist.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use meridian_core::{Refund, RefundLine};

/// Repository for refund database operations.
#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

const REFUND_COLUMNS: &str = r#"
    id, sale_id, store_id, customer_id, reason,
    subtotal_cents, tax_cents, total_cents,
    idempotency_key, created_at
"#;

const REFUND_LINE_COLUMNS: &str = r#"
    id, refund_id, product_id, quantity,
    unit_price_cents, line_total_cents, position, created_at
"#;

impl RefundRepository {
    /// Creates a new RefundRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Inserts a refund header within the caller's transaction.
    pub async fn insert_refund(
        &self,
        conn: &mut SqliteConnection,
        refund: &Refund,
    ) -> DbResult<()> {
        debug!(id = %refund.id, sale_id = %refund.sale_id, "Inserting refund");

        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, sale_id, store_id, customer_id, reason,
                subtotal_cents, tax_cents, total_cents,
                idempotency_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.sale_id)
        .bind(refund.store_id)
        .bind(refund.customer_id)
        .bind(&refund.reason)
        .bind(refund.subtotal_cents)
        .bind(refund.tax_cents)
        .bind(refund.total_cents)
        .bind(&refund.idempotency_key)
        .bind(refund.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one refund line within the caller's transaction.
    pub async fn insert_line(
        &self,
        conn: &mut SqliteConnection,
        line: &RefundLine,
    ) -> DbResult<()> {
        debug!(refund_id = %line.refund_id, product_id = line.product_id, "Inserting refund line");

        sqlx::query(
            r#"
            INSERT INTO refund_lines (
                id, refund_id, product_id, quantity,
                unit_price_cents, line_total_cents, position, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.id)
        .bind(&line.refund_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(line.position)
        .bind(line.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a refund by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refund)
    }

    /// Gets a refund by its idempotency key.
    pub async fn get_by_idempotency_key(&self, key: &str) -> DbResult<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE idempotency_key = ?1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refund)
    }

    /// Gets all lines for a refund, in entry order.
    pub async fn get_lines(&self, refund_id: &str) -> DbResult<Vec<RefundLine>> {
        let lines = sqlx::query_as::<_, RefundLine>(&format!(
            "SELECT {REFUND_LINE_COLUMNS} FROM refund_lines WHERE refund_id = ?1 ORDER BY position"
        ))
        .bind(refund_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists all refunds of a sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Refund>> {
        let refunds = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE sale_id = ?1 ORDER BY created_at"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    /// Sums the totals of all persisted refunds of a sale, within the
    /// caller's transaction.
    ///
    /// The refund workflow derives the cumulative refunded amount from
    /// these rows on every request; there is no cached running counter to
    /// drift.
    pub async fn refunded_total_cents(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(total_cents) FROM refunds WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Aggregates refunded quantity per product over all refunds of a
    /// sale, within the caller's transaction.
    pub async fn refunded_quantities(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<(i64, i64)>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT rl.product_id, SUM(rl.quantity)
            FROM refund_lines rl
            INNER JOIN refunds r ON r.id = rl.refund_id
            WHERE r.sale_id = ?1
            GROUP BY rl.product_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// True when the sale has at least one refund, within the caller's
    /// transaction. Used to guard cancellation.
    pub async fn sale_has_refunds(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refunds WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count > 0)
    }
}

/// Generates a new refund ID.
pub fn generate_refund_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new refund line ID.
pub fn generate_refund_line_id() -> String {
    Uuid::new_v4().to_string()
}
