//! Database driver traits.

use crate::database::descriptor::ConnectionDescriptor;
use crate::database::result::Row;
use crate::error::DbResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A live, pooled connection to one database endpoint.
///
/// Implementations: [`MssqlDriver`](crate::database::MssqlDriver).
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Returns the driver name (e.g., "mssql").
    fn name(&self) -> &'static str;

    /// Executes a statement on a session checked out for this call only and
    /// returns its first result set in driver order.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`](crate::error::DatabaseError) decoded from the
    /// driver failure.
    async fn execute_query(&self, query: &str) -> DbResult<Vec<Row>>;

    /// Closes the underlying pool. Called once, at shutdown.
    async fn close(&self) -> DbResult<()>;
}

/// Opens a driver for a descriptor, performing the connect handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, descriptor: &ConnectionDescriptor)
    -> DbResult<Arc<dyn DatabaseDriver>>;
}
