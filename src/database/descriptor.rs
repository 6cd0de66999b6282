//! Canonical description of how to reach one database.

use serde_json::json;
use std::fmt;

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_DATABASE: &str = "master";

/// How to connect to one database. Immutable once resolved.
///
/// Equality is defined by [`canonical_key`](Self::canonical_key), which is also
/// the pool registry key.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Opaque ADO.NET style connection string, passed to the driver untouched.
    Raw { connection_string: String },
    /// Discrete connection fields with defaults already applied.
    Fields(ConnectionFields),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionFields {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl ConnectionDescriptor {
    pub fn raw(connection_string: impl Into<String>) -> Self {
        Self::Raw {
            connection_string: connection_string.into(),
        }
    }

    /// Stable serialized form used as the pooling key.
    ///
    /// The descriptor is rendered as a JSON object whose keys are sorted
    /// lexicographically, with a `kind` tag of `raw` or `fields`:
    ///
    /// ```text
    /// {"connectionString":"...","kind":"raw"}
    /// {"database":..,"encrypt":..,"host":..,"kind":"fields","password":..,"port":..,"trustServerCertificate":..,"username":..}
    /// ```
    ///
    /// `serde_json::Map` is ordered by key, so the output does not depend on
    /// the order fields are listed in.
    pub fn canonical_key(&self) -> String {
        let value = match self {
            Self::Raw { connection_string } => json!({
                "kind": "raw",
                "connectionString": connection_string,
            }),
            Self::Fields(f) => json!({
                "kind": "fields",
                "host": f.host,
                "port": f.port,
                "database": f.database,
                "username": f.username,
                "password": f.password,
                "encrypt": f.encrypt,
                "trustServerCertificate": f.trust_server_certificate,
            }),
        };
        value.to_string()
    }

    /// Redacted target for logs: never includes secrets.
    pub fn display_target(&self) -> String {
        match self {
            Self::Raw { .. } => "<connection string>".to_string(),
            Self::Fields(f) => format!("{}@{}:{}/{}", f.username, f.host, f.port, f.database),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw { .. } => f
                .debug_struct("Raw")
                .field("connection_string", &"<redacted>")
                .finish(),
            Self::Fields(fields) => fields.fmt(f),
        }
    }
}

impl fmt::Debug for ConnectionFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fields")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}
