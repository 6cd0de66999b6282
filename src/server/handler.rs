//! MCP request handler implementation.

use crate::error::ProtocolResult;
use crate::protocol::{
    CallToolParams, CallToolResult, Handler, InitializeParams, InitializeResult, ListToolsResult,
    MCP_VERSION, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::server::state::ServerState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "SQL Server MCP server. Use the 'query' tool to run a statement. \
    Pass either 'connectionString', or 'host', 'username' and 'password' \
    (optionally 'port', 'database', 'encrypt', 'trustServerCertificate'). \
    Connections are pooled per distinct set of connection parameters. \
    Failures are reported as 'Database error: <message> [kind=..., code=..., transient=...]'; \
    transient=true means the same call may succeed if retried.";

/// MCP request handler that processes protocol messages.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        match &params.client_info {
            Some(client) => info!("Initialize request from {} v{}", client.name, client.version),
            None => info!("Initialize request from unnamed client"),
        }
        debug!(
            "Client protocol {}, capabilities: {}",
            params.protocol_version, params.capabilities
        );

        self.state.set_initialized(params.client_info);

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(INSTRUCTIONS.into()),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Server initialized successfully");
        Ok(())
    }

    async fn shutdown(&self) -> ProtocolResult<()> {
        info!("Shutdown request received");
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        debug!("Tool call: {}", params.name);

        match self.state.tools.execute(params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Tool call rejected: {}", e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}
