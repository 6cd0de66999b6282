//! MCP tool definitions and registry.

pub mod query;
pub mod registry;

pub use query::{QueryArgs, QueryTool};
pub use registry::{ToolHandler, ToolRegistry};

use crate::database::QueryExecutor;
use std::sync::Arc;

/// Create and register all tools.
pub fn create_registry(executor: Arc<QueryExecutor>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(QueryTool::new(executor));
    registry
}
