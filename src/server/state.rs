//! Server state management.

use crate::config::ServerConfig;
use crate::database::{Connector, MssqlConnector, PoolRegistry, QueryExecutor};
use crate::protocol::ClientInfo;
use crate::tools::ToolRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the handler needs, built once at startup.
///
/// The pool registry is shared with the binary, which closes it at shutdown.
pub struct ServerState {
    pub config: ServerConfig,
    pub pools: Arc<PoolRegistry>,
    pub executor: Arc<QueryExecutor>,
    pub tools: ToolRegistry,
    initialized: AtomicBool,
    client_info: RwLock<Option<ClientInfo>>,
}

impl ServerState {
    pub fn builder() -> ServerStateBuilder {
        ServerStateBuilder::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: Option<ClientInfo>) {
        *self.client_info.write() = client_info;
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }
}

#[derive(Default)]
pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    connector: Option<Arc<dyn Connector>>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the SQL Server connector, e.g. with an in-memory one.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> ServerState {
        let config = self.config.unwrap_or_default();
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(MssqlConnector::new(config.pool.clone())));

        let pools = Arc::new(PoolRegistry::new(connector));
        let executor = Arc::new(QueryExecutor::new(
            Arc::clone(&pools),
            config.pool.query_timeout,
        ));
        let tools = crate::tools::create_registry(Arc::clone(&executor));

        ServerState {
            config,
            pools,
            executor,
            tools,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
        }
    }
}
