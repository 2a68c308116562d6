//! # Stock Service
//!
//! Availability display and stock receiving. Neither path participates in
//! sale/refund decisions: decrements happen inside the sale transaction
//! via the ledger's conditional update, never from a read here.

use std::sync::Arc;

use tracing::info;

use meridian_core::{validation, ValidationError};
use meridian_db::Database;

use crate::error::ApiError;
use crate::invalidation::{spawn_invalidation, InvalidationSink};

/// Stock lookup and receiving service.
#[derive(Clone)]
pub struct StockService {
    db: Database,
    invalidator: Arc<dyn InvalidationSink>,
}

impl StockService {
    /// Creates a new StockService.
    pub fn new(db: Database, invalidator: Arc<dyn InvalidationSink>) -> Self {
        StockService { db, invalidator }
    }

    /// Current quantity on hand; zero for pairs never stocked.
    pub async fn get_level(&self, store_id: i64, product_id: i64) -> Result<i64, ApiError> {
        validation::validate_entity_id("store_id", store_id)?;
        validation::validate_entity_id("product_id", product_id)?;

        Ok(self.db.stock().get(store_id, product_id).await?)
    }

    /// Sets the quantity on hand (stock receiving / adjustment).
    pub async fn set_level(
        &self,
        store_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<i64, ApiError> {
        validation::validate_entity_id("store_id", store_id)?;
        validation::validate_entity_id("product_id", product_id)?;

        if quantity < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "quantity".to_string(),
            }
            .into());
        }

        self.db
            .stock()
            .set_quantity(store_id, product_id, quantity)
            .await?;

        info!(store_id, product_id, quantity, "Stock level set");

        spawn_invalidation(
            self.invalidator.clone(),
            vec![format!("cache:stock:{store_id}:{product_id}")],
        );

        Ok(quantity)
    }
}
