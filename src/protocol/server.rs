//! MCP server loop with lifecycle management.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Server created but not initialized.
    Created,
    /// Initialize request received, awaiting initialized notification.
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// MCP Server.
pub struct McpServer<H: Handler> {
    info: ServerInfo,
    handler: Arc<H>,
    state: RwLock<Lifecycle>,
}

impl<H: Handler + 'static> McpServer<H> {
    pub fn new(handler: H, info: ServerInfo) -> Self {
        Self {
            info,
            handler: Arc::new(handler),
            state: RwLock::new(Lifecycle::Created),
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub async fn state(&self) -> Lifecycle {
        *self.state.read().await
    }

    /// Run the server over stdin/stdout.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(&self) -> Result<()> {
        self.run_with_transport(Arc::new(StdioTransport::stdio()))
            .await
    }

    /// Serve until end of input or a `shutdown` request.
    ///
    /// `tools/call` requests run on their own tasks so a slow statement does
    /// not hold up the next message. Everything else is answered in order.
    /// In-flight calls are awaited before returning.
    pub async fn run_with_transport<T: Transport + 'static>(&self, transport: Arc<T>) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );

        let dispatcher = Dispatcher::new(Arc::clone(&self.handler));
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    error!("Tool call task failed: {}", e);
                }
            }

            let message = match transport.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(
                    e @ (ProtocolError::ParseError | ProtocolError::InvalidRequest(_)),
                )) => {
                    let response =
                        JsonRpcResponse::error(None, JsonRpcError::new(e.code(), e.to_string()));
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            let request = match message {
                Message::Request(request) => request,
                Message::Response(response) => {
                    warn!("Unexpected response received: {:?}", response.id);
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let method = request.method.clone();
            self.advance(&method).await;

            if method == "tools/call" {
                let dispatcher = dispatcher.clone();
                let transport = Arc::clone(&transport);
                in_flight.spawn(async move {
                    let response = dispatcher.dispatch(request).await;
                    if !is_notification && let Err(e) = transport.write_response(&response).await
                    {
                        error!("Failed to send response: {}", e);
                    }
                });
                continue;
            }

            let response = dispatcher.dispatch(request).await;
            if !is_notification && let Err(e) = transport.write_response(&response).await {
                error!("Failed to send response: {}", e);
            }

            if method == "shutdown" {
                info!("Shutdown request received");
                break;
            }
        }

        *self.state.write().await = Lifecycle::ShuttingDown;

        if !in_flight.is_empty() {
            info!("Waiting for {} in-flight tool call(s)", in_flight.len());
        }
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!("Tool call task failed: {}", e);
            }
        }

        *self.state.write().await = Lifecycle::Stopped;
        info!("Server stopped");
        Ok(())
    }

    async fn advance(&self, method: &str) {
        let mut state = self.state.write().await;
        match method {
            "initialize" if *state == Lifecycle::Created => {
                *state = Lifecycle::Initializing;
            }
            "initialized" | "notifications/initialized" if *state == Lifecycle::Initializing => {
                *state = Lifecycle::Running;
                info!("Server initialized and running");
            }
            "shutdown" => {
                *state = Lifecycle::ShuttingDown;
            }
            _ => {}
        }
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
}

impl<H: Handler + 'static> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl<H: Handler + 'static> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}
