//! The `query` tool: run one statement against a SQL Server endpoint.

use crate::database::{ConnectionArgs, ConnectionConfigResolver, QueryExecutor};
use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, Tool};
use crate::tools::registry::ToolHandler;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
pub struct QueryArgs {
    #[serde(flatten)]
    pub connection: ConnectionArgs,
    pub query: String,
}

pub struct QueryTool {
    executor: Arc<QueryExecutor>,
}

impl QueryTool {
    pub const NAME: &'static str = "query";

    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for QueryTool {
    fn definition(&self) -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(
                "Execute a SQL statement against Microsoft SQL Server and return the first \
                result set as a JSON array of records. Provide either 'connectionString', or \
                'host', 'username' and 'password'. Connections are pooled per distinct set of \
                connection parameters and reused across calls."
                    .into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "connectionString": {
                        "type": "string",
                        "description": "ADO.NET style connection string. Takes precedence over the discrete fields."
                    },
                    "host": {
                        "type": "string",
                        "description": "Server host name or address"
                    },
                    "port": {
                        "type": "integer",
                        "description": "Server port (default: 1433)",
                        "minimum": 1,
                        "maximum": 65535
                    },
                    "database": {
                        "type": "string",
                        "description": "Database name (default: master)"
                    },
                    "username": {
                        "type": "string",
                        "description": "SQL Server login"
                    },
                    "password": {
                        "type": "string",
                        "description": "Password for the login"
                    },
                    "query": {
                        "type": "string",
                        "description": "The SQL statement to execute"
                    },
                    "encrypt": {
                        "type": "boolean",
                        "description": "Require TLS for the whole session (default: false)"
                    },
                    "trustServerCertificate": {
                        "type": "boolean",
                        "description": "Accept the server certificate without validation (default: true)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "query"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: QueryArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        args.connection.validate()?;

        let descriptor = ConnectionConfigResolver::resolve(&args.connection);
        debug!("Resolved connection to {}", descriptor.display_target());

        let result = match self.executor.run(&descriptor, &args.query).await {
            Ok(rows) => CallToolResult::json(&rows),
            Err(e) => CallToolResult::error(format!("Database error: {}", e)),
        };
        Ok(result)
    }
}
