//! Runs one statement against the pool for a descriptor.

use crate::database::classifier::{ClassifiedError, classify};
use crate::database::descriptor::ConnectionDescriptor;
use crate::database::registry::PoolRegistry;
use crate::database::result::Row;
use crate::error::{DatabaseError, DbResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

pub struct QueryExecutor {
    registry: Arc<PoolRegistry>,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(registry: Arc<PoolRegistry>, query_timeout: Duration) -> Self {
        Self {
            registry,
            query_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Executes `sql` on the pool for `descriptor` and returns the first
    /// result set.
    ///
    /// Any failure, whether connecting, running the statement or timing out,
    /// comes back classified. Nothing is retried here; callers decide from
    /// [`ClassifiedError::is_transient`].
    #[instrument(skip_all, fields(pool = %descriptor.display_target()))]
    pub async fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        sql: &str,
    ) -> Result<Vec<Row>, ClassifiedError> {
        let start = Instant::now();

        match self.execute(descriptor, sql).await {
            Ok(rows) => {
                debug!(
                    "Query returned {} row(s) in {:?}",
                    rows.len(),
                    start.elapsed()
                );
                Ok(rows)
            }
            Err(e) => {
                let classified = classify(&e);
                warn!(
                    kind = %classified.kind(),
                    transient = classified.is_transient(),
                    "Query failed: {}",
                    classified.message()
                );
                Err(classified)
            }
        }
    }

    async fn execute(&self, descriptor: &ConnectionDescriptor, sql: &str) -> DbResult<Vec<Row>> {
        let pooled = self.registry.acquire(descriptor).await?;
        let metrics = self.registry.metrics();

        debug!("Executing query: {}", sql);

        match timeout(self.query_timeout, pooled.driver().execute_query(sql)).await {
            Ok(Ok(rows)) => {
                metrics.record_query_executed();
                Ok(rows)
            }
            Ok(Err(e)) => {
                metrics.record_query_error();
                Err(e)
            }
            Err(_) => {
                metrics.record_query_error();
                Err(DatabaseError::query_timeout(
                    self.query_timeout.as_millis() as u64
                ))
            }
        }
    }
}
