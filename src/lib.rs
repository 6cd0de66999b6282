//! MCP server exposing a single `query` tool for Microsoft SQL Server.
//!
//! Each call names its own endpoint. Pools are created lazily, one per distinct
//! set of connection parameters, and shared by every later call with the same
//! parameters. Driver failures come back to the caller as classified errors
//! with a stable kind and a transient flag.
//!
//! # Example
//!
//! ```no_run
//! use mssql_mcp_server::{
//!     config::ServerConfig,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerState},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::builder().from_env()?.build()?;
//!     let state = Arc::new(ServerState::builder().config(config).build());
//!     let pools = Arc::clone(&state.pools);
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .build()?;
//!
//!     server.run().await?;
//!     pools.close_all().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use database::{
    ClassifiedError, ConnectionConfigResolver, ConnectionDescriptor, ErrorKind, PoolConfig,
    PoolRegistry, QueryExecutor, classify,
};
pub use error::{McpError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use server::{McpHandler, ServerState, ServerStateBuilder};
