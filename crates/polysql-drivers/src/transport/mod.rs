// SPDX-License-Identifier: Apache-2.0

//! Bundled transports
//!
//! Each transport owns one dedicated connection (no pool: a `Sql` works
//! sequentially). Commands share that connection through an
//! `Arc<Mutex<..>>`. PostgreSQL and MySQL run through `sqlx::query`, so
//! re-executing a command hits sqlx's per-connection prepared statement
//! cache; SQL Server runs through tiberius.

pub mod mysql;
pub mod postgres;
pub mod sqlserver;

pub use mysql::MySqlTransport;
pub use postgres::PgTransport;
pub use sqlserver::SqlServerTransport;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use polysql_core::{EngineError, EngineResult};

/// Characters left alone in URL user-info and path segments.
const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode(component: &str) -> String {
    utf8_percent_encode(component, URL_SAFE).to_string()
}

/// Maps a failed connect to auth or connection errors.
pub(crate) fn connect_error(err: sqlx::Error) -> EngineError {
    let msg = err.to_string();
    if msg.contains("Access denied") || msg.contains("password authentication failed") {
        EngineError::auth_failed(msg)
    } else {
        EngineError::connection_failed(msg)
    }
}

/// Maps a failed statement to syntax, connection or execution errors.
pub(crate) fn query_error(err: sqlx::Error) -> EngineError {
    let msg = err.to_string();
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42601") => {
            EngineError::syntax_error(msg)
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
            EngineError::connection_failed(msg)
        }
        _ if msg.contains("syntax") => EngineError::syntax_error(msg),
        _ => EngineError::execution_error(msg),
    }
}

/// Awaits a sqlx future, bounded by the command timeout when one is set.
pub(crate) async fn run_with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> EngineResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EngineError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            })?
            .map_err(query_error),
        None => fut.await.map_err(query_error),
    }
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f").ok()
}

pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub(crate) fn parse_datetime_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_components_are_percent_encoded() {
        assert_eq!(encode("p@ss:word/1"), "p%40ss%3Aword%2F1");
        assert_eq!(encode("app_user-1.x"), "app_user-1.x");
    }

    #[test]
    fn temporal_text_parses() {
        assert!(parse_date("2024-02-29").is_some());
        assert!(parse_time("13:45:00.250").is_some());
        assert!(parse_datetime("2024-02-29 13:45:00").is_some());
        assert!(parse_datetime("2024-02-29T13:45:00.5").is_some());
        assert!(parse_datetime("2024-02-29").is_some());
        assert!(parse_datetime_offset("2024-02-29T13:45:00+02:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
