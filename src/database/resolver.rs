//! Turns caller-supplied connection arguments into a [`ConnectionDescriptor`].
//!
//! Defaults for port, database and TLS flags are applied here and nowhere else.

use crate::database::descriptor::{
    ConnectionDescriptor, ConnectionFields, DEFAULT_DATABASE, DEFAULT_PORT,
};
use crate::error::ToolError;
use serde::Deserialize;

/// Connection half of the `query` tool arguments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionArgs {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub encrypt: Option<bool>,
    #[serde(default)]
    pub trust_server_certificate: Option<bool>,
}

impl ConnectionArgs {
    /// Either `connectionString`, or all of `host`, `username` and `password`.
    ///
    /// An empty connection string counts as absent.
    pub fn validate(&self) -> Result<(), ToolError> {
        let has_fields =
            self.host.is_some() && self.username.is_some() && self.password.is_some();

        if self.connection_string().is_some() || has_fields {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(
                "Either connectionString OR (host, username, and password) must be provided"
                    .into(),
            ))
        }
    }

    fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref().filter(|s| !s.is_empty())
    }
}

pub struct ConnectionConfigResolver;

impl ConnectionConfigResolver {
    /// Resolve validated arguments into a descriptor.
    ///
    /// A non-empty connection string wins over every other field. Port `0`
    /// means the default port. Missing discrete
    /// fields can only occur if [`ConnectionArgs::validate`] was skipped; they
    /// resolve to empty strings and fail at connect time.
    pub fn resolve(args: &ConnectionArgs) -> ConnectionDescriptor {
        if let Some(connection_string) = args.connection_string() {
            return ConnectionDescriptor::raw(connection_string);
        }

        ConnectionDescriptor::Fields(ConnectionFields {
            host: args.host.clone().unwrap_or_default(),
            port: args.port.filter(|&p| p != 0).unwrap_or(DEFAULT_PORT),
            database: args
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            username: args.username.clone().unwrap_or_default(),
            password: args.password.clone().unwrap_or_default(),
            encrypt: args.encrypt.unwrap_or(false),
            trust_server_certificate: args.trust_server_certificate.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> ConnectionArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let descriptor = ConnectionConfigResolver::resolve(&args(serde_json::json!({
            "host": "localhost",
            "username": "sa",
            "password": "x",
            "query": "SELECT 1"
        })));

        assert_eq!(
            descriptor,
            ConnectionDescriptor::Fields(ConnectionFields {
                host: "localhost".into(),
                port: 1433,
                database: "master".into(),
                username: "sa".into(),
                password: "x".into(),
                encrypt: false,
                trust_server_certificate: true,
            })
        );
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let descriptor = ConnectionConfigResolver::resolve(&args(serde_json::json!({
            "host": "db.internal",
            "port": 50872,
            "database": "sales",
            "username": "report",
            "password": "pw",
            "encrypt": true,
            "trustServerCertificate": false
        })));

        let ConnectionDescriptor::Fields(fields) = descriptor else {
            panic!("expected discrete fields");
        };
        assert_eq!(fields.port, 50872);
        assert_eq!(fields.database, "sales");
        assert!(fields.encrypt);
        assert!(!fields.trust_server_certificate);
    }

    #[test]
    fn test_connection_string_ignores_other_fields() {
        let with_extras = ConnectionConfigResolver::resolve(&args(serde_json::json!({
            "connectionString": "Server=localhost;Database=test;User Id=sa;Password=test;",
            "host": "elsewhere",
            "port": 1500,
            "database": "other",
            "username": "u",
            "password": "p"
        })));
        let bare = ConnectionConfigResolver::resolve(&args(serde_json::json!({
            "connectionString": "Server=localhost;Database=test;User Id=sa;Password=test;"
        })));

        assert_eq!(
            with_extras,
            ConnectionDescriptor::raw("Server=localhost;Database=test;User Id=sa;Password=test;")
        );
        assert_eq!(with_extras.canonical_key(), bare.canonical_key());
    }

    #[test]
    fn test_empty_connection_string_falls_back_to_fields() {
        let input = args(serde_json::json!({
            "connectionString": "",
            "host": "localhost",
            "port": 0,
            "username": "sa",
            "password": "x"
        }));
        assert!(input.validate().is_ok());

        let ConnectionDescriptor::Fields(fields) = ConnectionConfigResolver::resolve(&input) else {
            panic!("expected discrete fields");
        };
        assert_eq!(fields.host, "localhost");
        assert_eq!(fields.port, 1433);

        let err = args(serde_json::json!({"connectionString": ""}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Either connectionString"));
    }

    #[test]
    fn test_validate() {
        assert!(
            args(serde_json::json!({"connectionString": "Server=x"}))
                .validate()
                .is_ok()
        );
        assert!(
            args(serde_json::json!({"host": "h", "username": "u", "password": "p"}))
                .validate()
                .is_ok()
        );

        let err = args(serde_json::json!({"host": "h", "username": "u"}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Either connectionString"));

        assert!(ConnectionArgs::default().validate().is_err());
    }
}
