//! # Stock Ledger Repository
//!
//! The single shared mutable resource in the transaction engine: one
//! quantity counter per (store, product) pair.
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               Conditional Decrement (one statement)                 │
//! │                                                                     │
//! │  ❌ WRONG: check-then-act across two round trips                    │
//! │     SELECT quantity FROM stock_levels WHERE ...        (reads 5)   │
//! │     UPDATE stock_levels SET quantity = 5 - 3 WHERE ... (races!)    │
//! │                                                                     │
//! │  ✅ CORRECT: decision inside the write itself                       │
//! │     UPDATE stock_levels SET quantity = quantity - 3                │
//! │     WHERE store_id = ? AND product_id = ? AND quantity >= 3        │
//! │                                                                     │
//! │  Two concurrent sales against stock 5, each wanting 3:             │
//! │  the writers serialize, the second sees quantity 2 and matches     │
//! │  zero rows. Exactly one succeeds; stock never goes negative.       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutating methods take `&mut SqliteConnection` so their effects join the
//! caller's transaction and roll back with it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The full amount was deducted.
    Applied,
    /// Nothing was deducted; `available` is the quantity at decision time
    /// (zero when the stock row does not exist yet).
    Insufficient { available: i64 },
}

/// Repository for stock ledger operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Atomically decrements stock if at least `amount` is available.
    ///
    /// The availability check and the write are one statement; there is no
    /// window where another transaction can observe the counter between
    /// them. On failure nothing is mutated and the current quantity is
    /// reported back for the error message.
    pub async fn try_decrement(
        &self,
        conn: &mut SqliteConnection,
        store_id: i64,
        product_id: i64,
        amount: i64,
    ) -> DbResult<StockDecrement> {
        debug!(store_id, product_id, amount, "Attempting stock decrement");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE stock_levels
            SET quantity = quantity - ?3, updated_at = ?4
            WHERE store_id = ?1 AND product_id = ?2 AND quantity >= ?3
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> = sqlx::query_scalar(
                "SELECT quantity FROM stock_levels WHERE store_id = ?1 AND product_id = ?2",
            )
            .bind(store_id)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

            return Ok(StockDecrement::Insufficient {
                available: available.unwrap_or(0),
            });
        }

        Ok(StockDecrement::Applied)
    }

    /// Atomically adds `amount` to the counter, creating the row lazily.
    ///
    /// Restoring stock has no upper bound check; a missing row starts
    /// from zero.
    pub async fn increment(
        &self,
        conn: &mut SqliteConnection,
        store_id: i64,
        product_id: i64,
        amount: i64,
    ) -> DbResult<()> {
        debug!(store_id, product_id, amount, "Incrementing stock");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO stock_levels (store_id, product_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (store_id, product_id)
            DO UPDATE SET
                quantity = quantity + excluded.quantity,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Read-only quantity lookup for availability display.
    ///
    /// Never used for decrement decisions; those happen inside
    /// [`try_decrement`](Self::try_decrement) itself.
    pub async fn get(&self, store_id: i64, product_id: i64) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_levels WHERE store_id = ?1 AND product_id = ?2",
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Sets the counter to an absolute quantity (stock receiving or
    /// adjustment), creating the row if needed.
    pub async fn set_quantity(
        &self,
        store_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(store_id, product_id, quantity, "Setting stock level");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO stock_levels (store_id, product_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (store_id, product_id)
            DO UPDATE SET
                quantity = excluded.quantity,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_row_is_zero() {
        let db = setup().await;
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 5).await.unwrap();
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 5);

        // absolute overwrite
        db.stock().set_quantity(1, 10, 2).await.unwrap();
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_success() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 5).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = db.stock().try_decrement(&mut tx, 1, 10, 3).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, StockDecrement::Applied);
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_insufficient_reports_available() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 2).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = db.stock().try_decrement(&mut tx, 1, 10, 10).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, StockDecrement::Insufficient { available: 2 });
        // nothing was mutated
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_missing_row() {
        let db = setup().await;

        let mut tx = db.begin().await.unwrap();
        let outcome = db.stock().try_decrement(&mut tx, 1, 99, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, StockDecrement::Insufficient { available: 0 });
    }

    #[tokio::test]
    async fn test_decrement_exact_amount() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 3).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let outcome = db.stock().try_decrement(&mut tx, 1, 10, 3).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, StockDecrement::Applied);
        assert_eq!(db.stock().get(1, 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_creates_row_lazily() {
        let db = setup().await;

        let mut tx = db.begin().await.unwrap();
        db.stock().increment(&mut tx, 2, 20, 4).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.stock().get(2, 20).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_increment_adds_to_existing() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 2).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        db.stock().increment(&mut tx, 1, 10, 3).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.stock().get(1, 10).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_rolled_back_decrement_leaves_stock_untouched() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 5).await.unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            let outcome = db.stock().try_decrement(&mut tx, 1, 10, 3).await.unwrap();
            assert_eq!(outcome, StockDecrement::Applied);
            // dropped without commit
        }

        assert_eq!(db.stock().get(1, 10).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_pairs_are_independent() {
        let db = setup().await;
        db.stock().set_quantity(1, 10, 5).await.unwrap();
        db.stock().set_quantity(2, 10, 7).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        db.stock().try_decrement(&mut tx, 1, 10, 5).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.stock().get(1, 10).await.unwrap(), 0);
        assert_eq!(db.stock().get(2, 10).await.unwrap(), 7);
    }
}
