//! MCP server binary entry point.

use anyhow::Result;
use mssql_mcp_server::{
    config::ServerConfig,
    protocol::McpServerBuilder,
    server::{McpHandler, ServerState},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::builder().from_env()?.build()?;
    info!(
        max_size = config.pool.max_size,
        connection_timeout_ms = config.pool.connection_timeout.as_millis() as u64,
        query_timeout_ms = config.pool.query_timeout.as_millis() as u64,
        "Pool settings loaded"
    );

    let state = Arc::new(ServerState::builder().config(config).build());
    let pools = Arc::clone(&state.pools);

    let server = McpServerBuilder::new()
        .handler(McpHandler::new(Arc::clone(&state)))
        .name(state.config.name.to_string())
        .version(state.config.version.to_string())
        .build()?;

    info!("MCP server running on stdio");

    let signalled = tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
            false
        }
        signal = wait_for_signal() => {
            info!("Received {}, shutting down", signal);
            true
        }
    };

    pools.close_all().await;

    info!("Server shutdown complete");

    // A pending stdin read would keep the runtime alive past this point.
    if signalled {
        std::process::exit(0);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            return match tokio::signal::ctrl_c().await {
                Ok(()) => "SIGINT",
                Err(_) => std::future::pending().await,
            };
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => "SIGINT",
            Err(_) => std::future::pending().await,
        },
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl-C",
        Err(_) => std::future::pending().await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mssql_mcp_server=info,warn"));

    // JSON to stderr; stdout carries the protocol.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
