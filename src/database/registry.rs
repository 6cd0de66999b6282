//! Process-wide registry of pooled connections, keyed by canonical descriptor.
//!
//! # Concurrency
//!
//! Each key maps to an `Arc<OnceCell<_>>` slot holding the outcome of one
//! connect attempt. The slot is inserted before the handshake starts and acts
//! as the in-flight marker: concurrent callers for the same key await the same
//! `get_or_init` and all receive that attempt's result, success or failure.
//! The map shard lock is only held to fetch or insert the slot, never across
//! an await, so keys that hash to different entries do not wait on each other.
//!
//! A failed attempt is handed to every caller already waiting on it, then its
//! slot is dropped from the map. The next call for that key starts a fresh
//! attempt.
//!
//! # Lifecycle
//!
//! Pools are created on first use and closed only by [`PoolRegistry::close_all`].
//! There is no idle eviction and no health check at this level.

use crate::database::descriptor::ConnectionDescriptor;
use crate::database::pool::{PoolMetrics, PoolMetricsSnapshot};
use crate::database::traits::{Connector, DatabaseDriver};
use crate::error::{DatabaseError, DbResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// A live pool for one descriptor. Owned by the registry, borrowed per query.
pub struct PooledConnection {
    key: String,
    target: String,
    driver: Arc<dyn DatabaseDriver>,
    created_at: DateTime<Utc>,
}

impl PooledConnection {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Redacted endpoint description for logs.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn driver(&self) -> &Arc<dyn DatabaseDriver> {
        &self.driver
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("target", &self.target)
            .field("driver", &self.driver.name())
            .field("created_at", &self.created_at)
            .finish()
    }
}

type Slot = Arc<OnceCell<DbResult<Arc<PooledConnection>>>>;

pub struct PoolRegistry {
    connector: Arc<dyn Connector>,
    pools: DashMap<String, Slot>,
    metrics: PoolMetrics,
}

impl PoolRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            pools: DashMap::new(),
            metrics: PoolMetrics::new(),
        }
    }

    /// Return the pool for `descriptor`, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns the connector's error unchanged. Callers that were waiting on
    /// the same attempt get the same error. Nothing is cached for the
    /// descriptor afterwards.
    #[instrument(skip_all, fields(pool = %descriptor.display_target()))]
    pub async fn acquire(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> DbResult<Arc<PooledConnection>> {
        let key = descriptor.canonical_key();
        let slot = self.slot(&key);

        if let Some(Ok(pooled)) = slot.get() {
            debug!("Reusing existing pool");
            return Ok(Arc::clone(pooled));
        }

        let result = slot
            .get_or_init(|| self.create(key.clone(), descriptor))
            .await
            .clone();

        if result.is_err() {
            self.discard_failed_slot(&key, &slot);
        }

        result
    }

    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.pools.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.pools.entry(key.to_string()).or_default().value())
    }

    fn discard_failed_slot(&self, key: &str, slot: &Slot) {
        // Only the slot that failed; a newer attempt may already sit under the key.
        let removed = self
            .pools
            .remove_if(key, |_, current| Arc::ptr_eq(current, slot));
        if removed.is_some() {
            debug!("Discarded slot after failed connect");
        }
    }

    async fn create(
        &self,
        key: String,
        descriptor: &ConnectionDescriptor,
    ) -> DbResult<Arc<PooledConnection>> {
        let target = descriptor.display_target();
        info!("Creating connection pool for {}", target);

        match self.connector.connect(descriptor).await {
            Ok(driver) => {
                self.metrics.record_connection_created();
                info!("Connection pool ready for {} ({})", target, driver.name());
                Ok(Arc::new(PooledConnection {
                    key,
                    target,
                    driver,
                    created_at: Utc::now(),
                }))
            }
            Err(e) => {
                self.metrics.record_connection_error();
                warn!("Failed to connect to {}: {}", target, e);
                Err(e)
            }
        }
    }

    /// Close every pool and empty the registry.
    ///
    /// A creation still in flight is awaited and its pool closed with the
    /// rest; callers of that attempt receive a pool that is already closed.
    /// An attempt that was abandoned is resolved as failed instead. All closes
    /// run concurrently and are awaited. A failing close is logged and does
    /// not stop the others.
    pub async fn close_all(&self) {
        let keys: Vec<String> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        let mut closing = JoinSet::new();

        for key in keys {
            if let Some((_, slot)) = self.pools.remove(&key) {
                closing.spawn(async move {
                    let outcome = slot
                        .get_or_init(|| async {
                            Err(DatabaseError::other("Connection registry is closed"))
                        })
                        .await;
                    match outcome {
                        Ok(pooled) => {
                            let result = pooled.driver.close().await;
                            Some((Arc::clone(pooled), result))
                        }
                        Err(_) => None,
                    }
                });
            }
        }

        info!("Closing {} connection pool slot(s)", closing.len());

        while let Some(joined) = closing.join_next().await {
            match joined {
                Ok(Some((pooled, Ok(())))) => {
                    self.metrics.record_connection_closed();
                    debug!("Closed pool for {}", pooled.target);
                }
                Ok(Some((pooled, Err(e)))) => {
                    warn!("Failed to close pool for {}: {}", pooled.target, e);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Pool close task failed: {}", e);
                }
            }
        }

        let metrics = self.metrics_snapshot();
        info!(
            connections_created = metrics.connections_created,
            connections_closed = metrics.connections_closed,
            connection_errors = metrics.connection_errors,
            queries_executed = metrics.queries_executed,
            query_errors = metrics.query_errors,
            "Connection registry closed"
        );
    }

    /// Number of established pools.
    pub fn len(&self) -> usize {
        self.pools
            .iter()
            .filter(|entry| matches!(entry.value().get(), Some(Ok(_))))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, descriptor: &ConnectionDescriptor) -> bool {
        self.pools
            .get(&descriptor.canonical_key())
            .is_some_and(|slot| matches!(slot.get(), Some(Ok(_))))
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> PoolMetricsSnapshot {
        self.metrics.snapshot()
    }
}
