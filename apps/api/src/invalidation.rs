//! # Cache Invalidation
//!
//! Best-effort invalidation of cached store/product/sale resources after a
//! committed transaction.
//!
//! ## Fire-and-Forget Policy
//! ```text
//! Workflow transaction ──► COMMIT        (durable state is final here)
//!        │
//!        ▼
//! tokio::spawn(invalidate keys)          (response does NOT wait)
//!        │
//!        ├── ok: cache entries gone
//!        └── err: logged and swallowed   (never rolls back the workflow)
//! ```
//!
//! Keys containing `*` are expanded with SCAN before deletion; plain keys
//! are deleted directly.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{debug, warn};

/// Cache invalidation failure. Only ever logged.
#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A sink that deletes cached entries by key or key pattern.
#[async_trait]
pub trait InvalidationSink: Send + Sync {
    async fn invalidate(&self, keys: &[String]) -> Result<(), InvalidationError>;
}

// =============================================================================
// Redis Implementation
// =============================================================================

/// Redis-backed invalidation sink.
pub struct RedisInvalidator {
    client: redis::Client,
}

impl RedisInvalidator {
    /// Creates a sink from a Redis connection string.
    pub fn new(url: &str) -> Result<Self, InvalidationError> {
        let client = redis::Client::open(url)?;
        Ok(RedisInvalidator { client })
    }
}

#[async_trait]
impl InvalidationSink for RedisInvalidator {
    async fn invalidate(&self, keys: &[String]) -> Result<(), InvalidationError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for key in keys {
            if key.contains('*') {
                // Pattern key: expand with SCAN, delete in batches
                let mut cursor: u64 = 0;
                loop {
                    let (next, matched): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(key)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn)
                        .await?;

                    if !matched.is_empty() {
                        let _: () = conn.del(matched).await?;
                    }

                    cursor = next;
                    if cursor == 0 {
                        break;
                    }
                }
            } else {
                let _: () = conn.del(key).await?;
            }
        }

        debug!(count = keys.len(), "Cache invalidation complete");
        Ok(())
    }
}

// =============================================================================
// No-op Implementation
// =============================================================================

/// Sink used when no Redis is configured (and in tests).
pub struct NoopInvalidator;

#[async_trait]
impl InvalidationSink for NoopInvalidator {
    async fn invalidate(&self, _keys: &[String]) -> Result<(), InvalidationError> {
        Ok(())
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatches an invalidation after the caller's transaction has
/// committed. Returns immediately; failures are logged, never propagated.
pub fn spawn_invalidation(sink: Arc<dyn InvalidationSink>, keys: Vec<String>) {
    tokio::spawn(async move {
        if let Err(e) = sink.invalidate(&keys).await {
            warn!(error = %e, "Cache invalidation failed (ignored)");
        }
    });
}

/// Keys affected by a sale or refund touching the given products.
pub fn stock_keys(store_id: i64, product_ids: impl IntoIterator<Item = i64>) -> Vec<String> {
    let mut keys: Vec<String> = product_ids
        .into_iter()
        .map(|product_id| format!("cache:stock:{store_id}:{product_id}"))
        .collect();
    keys.push(format!("cache:store:{store_id}:sales:*"));
    keys
}

/// Keys affected by a change to one sale's lifecycle.
pub fn sale_keys(store_id: i64, sale_id: &str) -> Vec<String> {
    vec![
        format!("cache:sale:{sale_id}"),
        format!("cache:store:{store_id}:sales:*"),
    ]
}
