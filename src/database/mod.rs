//! Database layer.
//!
//! Connection arguments are resolved into a [`ConnectionDescriptor`], the
//! [`PoolRegistry`] keeps one pool per distinct descriptor, and the
//! [`QueryExecutor`] runs statements against it. Every driver failure leaves
//! this module as a [`ClassifiedError`].

pub mod classifier;
pub mod descriptor;
pub mod executor;
pub mod mssql;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{ClassifiedError, ErrorKind, NetworkCode, OriginalCode, classify, is_transient};
pub use descriptor::{ConnectionDescriptor, ConnectionFields};
pub use executor::QueryExecutor;
pub use mssql::{MssqlConnector, MssqlDriver};
pub use pool::{PoolConfig, PoolMetrics, PoolMetricsSnapshot};
pub use registry::{PoolRegistry, PooledConnection};
pub use resolver::{ConnectionArgs, ConnectionConfigResolver};
pub use result::{CellValue, Row};
pub use traits::{Connector, DatabaseDriver};
