//! MSSQL driver using `tiberius` and `bb8` connection pool.

use crate::database::classifier::NetworkCode;
use crate::database::descriptor::{ConnectionDescriptor, ConnectionFields};
use crate::database::pool::PoolConfig;
use crate::database::result::{CellValue, Row};
use crate::database::traits::{Connector, DatabaseDriver};
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use bb8::{Pool, RunError};
use bb8_tiberius::ConnectionManager;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tiberius::{
    AuthMethod, ColumnType, Config, EncryptionLevel, FromSql, Row as TiberiusRow, Uuid,
};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

const APPLICATION_NAME: &str = env!("CARGO_PKG_NAME");

impl From<tiberius::error::Error> for DatabaseError {
    fn from(e: tiberius::error::Error) -> Self {
        match e {
            tiberius::error::Error::Server(token) => {
                Self::server(token.code() as i32, token.message())
            }
            tiberius::error::Error::Io { kind, message } => {
                match NetworkCode::from_io(kind, &message) {
                    Some(code) => Self::network(code, message),
                    None => Self::other(message),
                }
            }
            other => Self::other(other.to_string()),
        }
    }
}

impl From<bb8_tiberius::Error> for DatabaseError {
    fn from(e: bb8_tiberius::Error) -> Self {
        match e {
            bb8_tiberius::Error::Tiberius(e) => e.into(),
            bb8_tiberius::Error::Io(e) => {
                let message = e.to_string();
                match NetworkCode::from_io(e.kind(), &message) {
                    Some(code) => Self::network(code, message),
                    None => Self::other(message),
                }
            }
        }
    }
}

fn decode_run_error(e: RunError<bb8_tiberius::Error>, waited: Duration) -> DatabaseError {
    match e {
        RunError::User(e) => e.into(),
        RunError::TimedOut => DatabaseError::connection_timeout(waited.as_millis() as u64),
    }
}

/// Build the driver configuration for a descriptor.
fn tiberius_config(descriptor: &ConnectionDescriptor) -> DbResult<Config> {
    let mut config = match descriptor {
        ConnectionDescriptor::Raw { connection_string } => {
            Config::from_ado_string(connection_string)?
        }
        ConnectionDescriptor::Fields(fields) => fields_config(fields),
    };
    config.application_name(APPLICATION_NAME);
    Ok(config)
}

fn fields_config(fields: &ConnectionFields) -> Config {
    let mut config = Config::new();
    config.host(&fields.host);
    config.port(fields.port);
    config.database(&fields.database);
    config.authentication(AuthMethod::sql_server(&fields.username, &fields.password));

    if fields.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }
    if fields.trust_server_certificate {
        config.trust_cert();
    }
    config
}

/// Opens one [`MssqlDriver`] per descriptor, all sharing the same pool settings.
#[derive(Debug, Clone, Default)]
pub struct MssqlConnector {
    config: PoolConfig,
}

impl MssqlConnector {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> DbResult<Arc<dyn DatabaseDriver>> {
        let driver = MssqlDriver::connect(descriptor, &self.config).await?;
        Ok(Arc::new(driver))
    }
}

/// MSSQL database driver.
pub struct MssqlDriver {
    pool: Mutex<Option<Pool<ConnectionManager>>>,
    connection_timeout: Duration,
}

impl MssqlDriver {
    /// Creates the pool and verifies connectivity with one handshake.
    ///
    /// The probe session is opened outside the pool so a login or network
    /// failure surfaces as the driver error instead of a pool timeout.
    pub async fn connect(descriptor: &ConnectionDescriptor, config: &PoolConfig) -> DbResult<Self> {
        info!("Connecting to MSSQL: {}", descriptor.display_target());

        let manager = ConnectionManager::new(tiberius_config(descriptor)?);
        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .retry_connection(false)
            .build_unchecked(manager);

        let probe = timeout(config.connection_timeout, pool.dedicated_connection())
            .await
            .map_err(|_| {
                DatabaseError::connection_timeout(config.connection_timeout.as_millis() as u64)
            })??;
        drop(probe);

        info!(
            "MSSQL connection pool created with size {}",
            config.max_size
        );

        Ok(Self {
            pool: Mutex::new(Some(pool)),
            connection_timeout: config.connection_timeout,
        })
    }

    fn pool(&self) -> DbResult<Pool<ConnectionManager>> {
        self.pool
            .lock()
            .clone()
            .ok_or_else(|| DatabaseError::other("Connection pool is closed"))
    }

    fn convert_row(row: &TiberiusRow, columns: &[String]) -> Row {
        let mut converted = Row::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            converted.push(name.as_str(), Self::get_cell_value(row, i));
        }
        converted
    }

    /// Extract cell value from Tiberius row.
    ///
    /// Each getter fails on a type mismatch and yields `Some(None)` on SQL NULL
    /// of its own type, so the first match wins and a typed NULL stops the
    /// chain. A column no getter accepts is reported by [`Self::unmapped_cell`].
    fn get_cell_value(row: &TiberiusRow, index: usize) -> CellValue {
        if let Some(val) = typed::<i32>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::Int(v as i64));
        }
        if let Some(val) = typed::<i64>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Int);
        }
        if let Some(val) = typed::<i16>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::Int(v as i64));
        }
        if let Some(val) = typed::<u8>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::Int(v as i64));
        }
        if let Some(val) = typed::<f64>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Float);
        }
        if let Some(val) = typed::<f32>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::Float(v as f64));
        }
        if let Some(val) = typed::<bool>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Bool);
        }
        if let Some(val) = typed::<&str>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::String(v.to_string()));
        }
        if let Some(val) = typed::<Decimal>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Decimal);
        }
        if let Some(val) = typed::<NaiveDateTime>(row, index) {
            return val.map_or(CellValue::Null, |v| {
                CellValue::DateTime(DateTime::from_naive_utc_and_offset(v, Utc))
            });
        }
        if let Some(val) = typed::<DateTime<FixedOffset>>(row, index) {
            return val.map_or(CellValue::Null, CellValue::DateTimeOffset);
        }
        if let Some(val) = typed::<NaiveDate>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Date);
        }
        if let Some(val) = typed::<NaiveTime>(row, index) {
            return val.map_or(CellValue::Null, CellValue::Time);
        }
        if let Some(val) = typed::<Uuid>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::String(v.to_string()));
        }
        if let Some(val) = typed::<&[u8]>(row, index) {
            return val.map_or(CellValue::Null, |v| CellValue::Bytes(v.to_vec()));
        }

        let column_type = row.columns().get(index).map(|c| c.column_type());
        Self::unmapped_cell(index, column_type)
    }

    /// Columns such as `xml` or `sql_variant` have no JSON mapping and are
    /// returned as null.
    fn unmapped_cell(index: usize, column_type: Option<ColumnType>) -> CellValue {
        debug!(
            column = index,
            column_type = ?column_type,
            "Unsupported column type, returning null"
        );
        CellValue::Null
    }
}

/// `None` on a type mismatch, `Some(None)` on SQL NULL.
fn typed<'a, T: FromSql<'a>>(row: &'a TiberiusRow, index: usize) -> Option<Option<T>> {
    row.try_get::<T, _>(index).ok()
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn name(&self) -> &'static str {
        "mssql"
    }

    #[instrument(skip(self), fields(db = "mssql"))]
    async fn execute_query(&self, query: &str) -> DbResult<Vec<Row>> {
        let pool = self.pool()?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| decode_run_error(e, self.connection_timeout))?;

        let rows = conn.simple_query(query).await?.into_first_result().await?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(rows
            .iter()
            .map(|r| Self::convert_row(r, &columns))
            .collect())
    }

    async fn close(&self) -> DbResult<()> {
        let pool = self
            .pool
            .lock()
            .take()
            .ok_or_else(|| DatabaseError::other("Connection pool is already closed"))?;

        let state = pool.state();
        debug!(
            "Dropping pool with {} connection(s), {} idle",
            state.connections, state.idle_connections
        );
        drop(pool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tiberius::error::Error as TiberiusError;

    fn fields() -> ConnectionFields {
        ConnectionFields {
            host: "db.internal".into(),
            port: 1444,
            database: "sales".into(),
            username: "app".into(),
            password: "secret".into(),
            encrypt: true,
            trust_server_certificate: false,
        }
    }

    #[test]
    fn test_fields_config_address() {
        let config = tiberius_config(&ConnectionDescriptor::Fields(fields())).unwrap();
        assert_eq!(config.get_addr(), "db.internal:1444");
    }

    #[test]
    fn test_raw_config_address() {
        let descriptor = ConnectionDescriptor::raw(
            "Server=tcp:sql.example.com,1455;Database=app;User Id=sa;Password=x;",
        );
        let config = tiberius_config(&descriptor).unwrap();
        assert_eq!(config.get_addr(), "sql.example.com:1455");
    }

    #[test]
    fn test_refused_io_error_decodes_to_network_code() {
        let err: DatabaseError = TiberiusError::Io {
            kind: io::ErrorKind::ConnectionRefused,
            message: "Connection refused (os error 111)".into(),
        }
        .into();

        assert_eq!(err.network, Some(NetworkCode::ConnectionRefused));
        assert!(err.number.is_none());
        assert_eq!(err.message, "Connection refused (os error 111)");
    }

    #[test]
    fn test_unrecognised_io_error_keeps_message() {
        let err: DatabaseError = TiberiusError::Io {
            kind: io::ErrorKind::InvalidData,
            message: "unexpected packet".into(),
        }
        .into();

        assert!(err.network.is_none());
        assert!(err.number.is_none());
        assert_eq!(err.message, "unexpected packet");
    }

    #[test]
    fn test_pool_io_error_decodes_to_network_code() {
        let err: DatabaseError =
            bb8_tiberius::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "timed out")).into();
        assert_eq!(err.network, Some(NetworkCode::TimedOut));
    }

    #[test]
    fn test_unmapped_column_is_null() {
        assert_eq!(
            MssqlDriver::unmapped_cell(3, Some(ColumnType::Xml)),
            CellValue::Null
        );
        assert_eq!(MssqlDriver::unmapped_cell(0, None), CellValue::Null);
    }

    #[test]
    fn test_pool_timeout_decodes_to_connection_timeout() {
        let err = decode_run_error(RunError::TimedOut, Duration::from_millis(1500));
        assert_eq!(err.number, Some(DatabaseError::CONNECTION_TIMEOUT));
        assert_eq!(err.message, "Failed to connect within 1500ms");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_connect() {
        // Port 1 on localhost refuses connections on any sane test host.
        let descriptor = ConnectionDescriptor::Fields(ConnectionFields {
            host: "127.0.0.1".into(),
            port: 1,
            encrypt: false,
            ..fields()
        });
        let config = PoolConfig {
            connection_timeout: Duration::from_secs(2),
            ..PoolConfig::default()
        };

        let err = MssqlConnector::new(config)
            .connect(&descriptor)
            .await
            .err()
            .unwrap();
        assert!(err.network.is_some() || err.number == Some(DatabaseError::CONNECTION_TIMEOUT));
    }
}
