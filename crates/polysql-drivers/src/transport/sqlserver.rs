// SPDX-License-Identifier: Apache-2.0

//! SQL Server transport over a single tiberius `Client`
//!
//! tiberius binds parameters positionally as `@P1..@Pn`, while the dialect
//! names them `@p0..`; command text is rewritten once when the command is
//! created. Every execution goes through `sp_executesql`, so the server
//! reuses the cached plan when a command runs again.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polysql_core::{
    Command, Connection, ConnectionConfig, DataReader, DataTable, DbType, EngineError,
    EngineResult, Parameter, Value,
};
use rust_decimal::Decimal;
use tiberius::error::Error as TdsError;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;
use uuid::Uuid;

use super::{parse_date, parse_datetime, parse_datetime_offset, parse_time};

type MssqlClient = Client<Compat<TcpStream>>;

const LOGIN_FAILED: u32 = 18456;
const INCORRECT_SYNTAX: u32 = 102;

pub struct SqlServerTransport {
    config: Config,
    client: Option<Arc<Mutex<MssqlClient>>>,
}

impl SqlServerTransport {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(Self::build_config(config))
    }

    /// Build a tiberius Config from a ConnectionConfig.
    pub(crate) fn build_config(config: &ConnectionConfig) -> Config {
        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(config.port);
        tds.authentication(AuthMethod::sql_server(
            &config.username,
            config.password.expose(),
        ));
        if let Some(db) = config.database.as_deref().filter(|db| !db.is_empty()) {
            tds.database(db);
        }
        tds.encryption(if config.ssl {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });
        tds.trust_cert();
        tds
    }
}

#[async_trait]
impl Connection for SqlServerTransport {
    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> EngineResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let addr = self.config.get_addr();
        let tcp = TcpStream::connect(&addr).await.map_err(|e| {
            EngineError::connection_failed(format!("Failed to connect to {addr} - {e}"))
        })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(classify_error)?;
        self.client = Some(Arc::new(Mutex::new(client)));
        Ok(())
    }

    async fn close(&mut self) -> EngineResult<()> {
        let Some(shared) = self.client.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(shared) {
            Ok(client) => client
                .into_inner()
                .close()
                .await
                .map_err(|e| EngineError::connection_failed(e.to_string())),
            Err(_) => {
                debug!("SQL Server commands still alive; connection closes when they drop");
                Ok(())
            }
        }
    }

    fn create_command(&mut self, text: &str) -> EngineResult<Box<dyn Command>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| EngineError::connection_failed("SQL Server connection is not open"))?;
        Ok(Box::new(SqlServerCommand {
            text: text.to_string(),
            positional: to_positional(text),
            parameters: Vec::new(),
            timeout: None,
            client: Arc::clone(client),
        }))
    }
}

struct SqlServerCommand {
    text: String,
    positional: String,
    parameters: Vec<Parameter>,
    timeout: Option<Duration>,
    client: Arc<Mutex<MssqlClient>>,
}

impl SqlServerCommand {
    fn build(&self) -> Query<'_> {
        let mut query = Query::new(self.positional.as_str());
        for parameter in &self.parameters {
            bind_param(&mut query, parameter);
        }
        query
    }

    async fn fetch(&self) -> EngineResult<DataTable> {
        let mut client = self.client.lock().await;
        let query = self.build();
        with_timeout(self.timeout, async {
            let mut stream = query.query(&mut *client).await?;
            let columns: Vec<String> = stream
                .columns()
                .await?
                .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            let rows = stream.into_first_result().await?;
            Ok(to_table(columns, &rows))
        })
        .await
    }
}

#[async_trait]
impl Command for SqlServerCommand {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    async fn execute_non_query(&mut self) -> EngineResult<u64> {
        let mut client = self.client.lock().await;
        let query = self.build();
        let result = with_timeout(self.timeout, query.execute(&mut *client)).await?;
        Ok(result.total())
    }

    async fn execute_scalar(&mut self) -> EngineResult<Value> {
        Ok(self.fetch().await?.scalar())
    }

    async fn execute_reader(&mut self) -> EngineResult<Box<dyn DataReader>> {
        Ok(self.fetch().await?.into_reader())
    }
}

/// Awaits a tiberius future, bounded by the command timeout when one is set.
async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> EngineResult<T>
where
    F: Future<Output = Result<T, TdsError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EngineError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            })?
            .map_err(classify_error),
        None => fut.await.map_err(classify_error),
    }
}

/// Classify a SQL Server error into auth, syntax, connection or execution error.
fn classify_error(err: TdsError) -> EngineError {
    let msg = err.to_string();
    match &err {
        TdsError::Server(token) if token.code() == LOGIN_FAILED => EngineError::auth_failed(msg),
        TdsError::Server(token) if token.code() == INCORRECT_SYNTAX => {
            EngineError::syntax_error(msg)
        }
        TdsError::Io { .. } | TdsError::Tls(_) => EngineError::connection_failed(msg),
        _ if msg.to_lowercase().contains("incorrect syntax") => EngineError::syntax_error(msg),
        _ => EngineError::execution_error(msg),
    }
}

/// Rewrites `@pN` to `@P{N+1}`, leaving quoted text and identifiers alone.
fn to_positional(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut resume = 0;

    for (i, c) in sql.char_indices() {
        if i < resume {
            continue;
        }
        match quote {
            Some(close) => {
                if c == close {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' => quote = Some(']'),
                '@' if !prev.is_some_and(is_name_char) => {
                    if let Some((index, len)) = parameter_index(&sql[i + 1..]) {
                        out.push_str(&format!("@P{}", index + 1));
                        resume = i + 1 + len;
                        prev = Some('0');
                        continue;
                    }
                }
                _ => {}
            },
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Index and byte length of a `pN` name at the start of `rest`.
fn parameter_index(rest: &str) -> Option<(usize, usize)> {
    let digits = rest.strip_prefix(['p', 'P'])?;
    let len = digits.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 || digits[len..].chars().next().is_some_and(is_name_char) {
        return None;
    }
    let index = digits[..len].parse().ok()?;
    Some((index, len + 1))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$')
}

fn bind_param(query: &mut Query<'_>, parameter: &Parameter) {
    match (&parameter.value, parameter.db_type) {
        (Value::Null, db_type) => bind_null(query, db_type),
        (Value::Bool(b), _) => query.bind(*b),
        (Value::Int(i), DbType::Byte) => match u8::try_from(*i) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(*i),
        },
        (Value::Int(i), DbType::Int16 | DbType::SByte) => match i16::try_from(*i) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(*i),
        },
        (Value::Int(i), DbType::Int32 | DbType::UInt16) => match i32::try_from(*i) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(*i),
        },
        (Value::Int(i), DbType::Decimal | DbType::Currency | DbType::VarNumeric) => {
            query.bind(to_numeric(Decimal::from(*i)))
        }
        (Value::Int(i), _) => query.bind(*i),
        (Value::Float(f), DbType::Single) => query.bind(*f as f32),
        (Value::Float(f), _) => query.bind(*f),
        (Value::Text(s), db_type) => bind_text(query, s, db_type),
        (Value::Bytes(b), _) => query.bind(b.clone()),
        (Value::Json(j), _) => query.bind(j.to_string()),
    }
}

fn bind_text(query: &mut Query<'_>, text: &str, db_type: DbType) {
    match db_type {
        DbType::Date => match parse_date(text) {
            Some(v) => query.bind(v),
            None => query.bind(text.to_string()),
        },
        DbType::Time => match parse_time(text) {
            Some(v) => query.bind(v),
            None => query.bind(text.to_string()),
        },
        DbType::DateTime | DbType::DateTime2 => match parse_datetime(text) {
            Some(v) => query.bind(v),
            None => query.bind(text.to_string()),
        },
        DbType::DateTimeOffset => match parse_datetime_offset(text) {
            Some(v) => query.bind(v),
            None => query.bind(text.to_string()),
        },
        DbType::Decimal | DbType::Currency | DbType::VarNumeric => {
            match Decimal::from_str(text.trim()) {
                Ok(v) => query.bind(to_numeric(v)),
                Err(_) => query.bind(text.to_string()),
            }
        }
        DbType::Guid => match Uuid::parse_str(text.trim()) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(text.to_string()),
        },
        _ => query.bind(text.to_string()),
    }
}

/// tiberius implements `IntoSql` for `Numeric` but not `Decimal`; same conversion as its `ToSql`.
fn to_numeric(d: Decimal) -> Numeric {
    Numeric::new_with_scale(d.mantissa(), d.scale() as u8)
}

/// NULL declared with the parameter's type, so `sp_executesql` gets a usable signature.
fn bind_null(query: &mut Query<'_>, db_type: DbType) {
    match db_type {
        DbType::Boolean => query.bind(None::<bool>),
        DbType::Byte => query.bind(None::<u8>),
        DbType::SByte | DbType::Int16 => query.bind(None::<i16>),
        DbType::Int32 | DbType::UInt16 => query.bind(None::<i32>),
        DbType::Int64 | DbType::UInt32 | DbType::UInt64 => query.bind(None::<i64>),
        DbType::Single => query.bind(None::<f32>),
        DbType::Double => query.bind(None::<f64>),
        DbType::Decimal | DbType::Currency | DbType::VarNumeric => query.bind(None::<Numeric>),
        DbType::Date => query.bind(None::<NaiveDate>),
        DbType::Time => query.bind(None::<NaiveTime>),
        DbType::DateTime | DbType::DateTime2 => query.bind(None::<NaiveDateTime>),
        DbType::Guid => query.bind(None::<Uuid>),
        DbType::Binary => query.bind(None::<Vec<u8>>),
        _ => query.bind(None::<String>),
    }
}

fn to_table(columns: Vec<String>, rows: &[Row]) -> DataTable {
    let mut table = DataTable::new(columns);
    for row in rows {
        table.rows.push(convert_row(row));
    }
    table
}

/// Convert a tiberius Row, using chrono getters for date/time cells.
fn convert_row(row: &Row) -> Vec<Value> {
    row.cells()
        .enumerate()
        .map(|(i, (_col, data))| match data {
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<NaiveDateTime, _>(i)
                .ok()
                .flatten()
                .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                .ok()
                .flatten()
                .map(|dt| Value::Text(dt.to_rfc3339()))
                .unwrap_or(Value::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<NaiveDate, _>(i)
                .ok()
                .flatten()
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<NaiveTime, _>(i)
                .ok()
                .flatten()
                .map(|t| Value::Text(t.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Null),
            _ => convert_column_data(data),
        })
        .collect()
}

fn convert_column_data(data: &ColumnData<'_>) -> Value {
    match data {
        ColumnData::Bit(Some(b)) => Value::Bool(*b),
        ColumnData::U8(Some(v)) => Value::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => Value::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => Value::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => Value::Int(*v),
        ColumnData::F32(Some(v)) => Value::Float(f64::from(*v)),
        ColumnData::F64(Some(v)) => Value::Float(*v),
        ColumnData::Numeric(Some(n)) => {
            Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale()))
                .map(|d| Value::Text(d.to_string()))
                .unwrap_or_else(|_| Value::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale()))))
        }
        ColumnData::String(Some(s)) => Value::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => Value::Text(g.to_string()),
        ColumnData::Binary(Some(b)) => Value::Bytes(b.to_vec()),
        ColumnData::Xml(Some(xml)) => Value::Text(xml.to_string()),
        _ => Value::Null,
    }
}
