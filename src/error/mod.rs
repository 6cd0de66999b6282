//! Error types for the MCP server.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.
//! Database failures never travel through [`McpError`]: the driver boundary decodes
//! them into [`DatabaseError`] and the classifier turns that into a tool result.

use crate::database::classifier::NetworkCode;
use std::borrow::Cow;
use thiserror::Error;

/// Main error type for the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: invalid JSON")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::InternalError(_) => -32603,
        }
    }
}

/// Failure reported by a database driver, decoded into a driver-agnostic shape.
///
/// This is the only error the classifier looks at. Drivers fill in whatever they
/// know: a server error number, a network-level code, and the raw message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DatabaseError {
    pub number: Option<i32>,
    pub network: Option<NetworkCode>,
    pub message: String,
}

impl DatabaseError {
    /// Error number used for a connect attempt that ran out of time.
    pub const CONNECTION_TIMEOUT: i32 = -1;
    /// Error number used for a statement that ran out of time.
    pub const QUERY_TIMEOUT: i32 = -2;

    /// Error raised by the server with an error number.
    pub fn server(number: i32, message: impl Into<String>) -> Self {
        Self {
            number: Some(number),
            network: None,
            message: message.into(),
        }
    }

    /// Error raised by the network layer.
    pub fn network(code: NetworkCode, message: impl Into<String>) -> Self {
        Self {
            number: None,
            network: Some(code),
            message: message.into(),
        }
    }

    /// Error with nothing but a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            number: None,
            network: None,
            message: message.into(),
        }
    }

    pub fn connection_timeout(after_ms: u64) -> Self {
        Self::server(
            Self::CONNECTION_TIMEOUT,
            format!("Failed to connect within {}ms", after_ms),
        )
    }

    pub fn query_timeout(after_ms: u64) -> Self {
        Self::server(
            Self::QUERY_TIMEOUT,
            format!("Query timeout after {}ms", after_ms),
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for DatabaseError.
pub type DbResult<T> = std::result::Result<T, DatabaseError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
