//! Configuration types and builders.

use crate::database::PoolConfig;
use crate::error::{ConfigError, Result};
use std::borrow::Cow;
use std::env;
use std::time::Duration;

/// Environment variable for the per-pool connection limit.
pub const ENV_POOL_MAX_SIZE: &str = "MSSQL_POOL_MAX_SIZE";
/// Environment variable for the connect timeout, in milliseconds.
pub const ENV_CONNECTION_TIMEOUT_MS: &str = "MSSQL_CONNECTION_TIMEOUT_MS";
/// Environment variable for the statement timeout, in milliseconds.
pub const ENV_QUERY_TIMEOUT_MS: &str = "MSSQL_QUERY_TIMEOUT_MS";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub pool: PoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            pool: PoolConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn max_size(mut self, max_size: u32) -> Self {
        self.config.pool.max_size = max_size;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.connection_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.query_timeout = timeout;
        self
    }

    /// Build from environment variables.
    pub fn from_env(self) -> Result<Self> {
        self.from_vars(|key| env::var(key).ok())
    }

    /// Apply overrides from any key/value source. Unset keys keep their value.
    pub fn from_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(max_size) = var(ENV_POOL_MAX_SIZE) {
            self.config.pool.max_size = parse_number(ENV_POOL_MAX_SIZE, &max_size)?;
        }

        if let Some(ms) = var(ENV_CONNECTION_TIMEOUT_MS) {
            self.config.pool.connection_timeout =
                Duration::from_millis(parse_number(ENV_CONNECTION_TIMEOUT_MS, &ms)?);
        }

        if let Some(ms) = var(ENV_QUERY_TIMEOUT_MS) {
            self.config.pool.query_timeout =
                Duration::from_millis(parse_number(ENV_QUERY_TIMEOUT_MS, &ms)?);
        }

        Ok(self)
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()).into());
        }
        if self.config.pool.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size".into(),
                message: "Pool size must be greater than 0".into(),
            }
            .into());
        }
        if self.config.pool.connection_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "connection_timeout".into(),
                message: "Timeout must be greater than 0".into(),
            }
            .into());
        }
        if self.config.pool.query_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "query_timeout".into(),
                message: "Timeout must be greater than 0".into(),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.into(),
            message: format!("'{}' is not a valid number", raw).into(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::builder().build().unwrap();
        assert_eq!(config.name, "mssql-mcp-server");
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.pool, PoolConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .name("custom")
            .max_size(4)
            .query_timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.name, "custom");
        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.pool.query_timeout, Duration::from_secs(30));
        assert_eq!(config.pool.connection_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_from_vars() {
        let config = ServerConfig::builder()
            .from_vars(vars(&[
                (ENV_POOL_MAX_SIZE, "25"),
                (ENV_CONNECTION_TIMEOUT_MS, "5000"),
                (ENV_QUERY_TIMEOUT_MS, " 60000 "),
            ]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.pool.max_size, 25);
        assert_eq!(config.pool.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.pool.query_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = ServerConfig::builder()
            .from_vars(vars(&[(ENV_POOL_MAX_SIZE, "ten")]))
            .err()
            .unwrap();

        assert!(matches!(
            err,
            McpError::Config(ConfigError::InvalidValue { ref field, .. }) if field == ENV_POOL_MAX_SIZE
        ));
    }

    #[test]
    fn test_validation() {
        assert!(ServerConfig::builder().max_size(0).build().is_err());
        assert!(
            ServerConfig::builder()
                .connection_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            ServerConfig::builder()
                .query_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(ServerConfig::builder().name("").build().is_err());
    }
}
