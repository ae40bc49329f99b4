// SPDX-License-Identifier: Apache-2.0

//! polysql
//!
//! One client API over heterogeneous SQL engines: pick a dialect from the
//! [`DriverRegistry`], give it a transport, and use the resulting [`Sql`]
//! for identifier escaping, parameterized commands, batch inserts and
//! catalog introspection.

pub mod config;
pub mod observability;

pub use config::{LoggingConfig, PolysqlConfig};
pub use polysql_core::{
    Connection, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DbType, Dialect, DriverRegistry, EngineError, EngineResult, Exclusions,
    InsertColumn, Sql, SqlParameter, Value,
};
pub use polysql_drivers::builtin_registry;

use polysql_drivers::transport::{MySqlTransport, PgTransport, SqlServerTransport};

/// Builds a ready [`Sql`] for the engine described by `config`.
///
/// Only engines with a bundled transport (PostgreSQL, MySQL, SQL Server) can
/// be opened this way; for Oracle build the dialect from `registry` and pass
/// your own [`Connection`] to [`Sql::new`]. The connection itself opens
/// lazily on first use.
pub fn open_engine(config: &PolysqlConfig, registry: &DriverRegistry) -> EngineResult<Sql> {
    config.validate()?;
    let dialect = registry.require(&config.engine.driver)?;

    let connection: Box<dyn Connection> = match dialect.driver_id() {
        polysql_drivers::postgres::DRIVER_ID => Box::new(PgTransport::from_config(&config.engine)),
        polysql_drivers::mysql::DRIVER_ID => Box::new(MySqlTransport::from_config(&config.engine)),
        polysql_drivers::sqlserver::DRIVER_ID => {
            Box::new(SqlServerTransport::from_config(&config.engine))
        }
        other => {
            return Err(EngineError::not_supported(format!(
                "no bundled transport for '{}'; use Sql::new with your own connection",
                other
            )))
        }
    };

    tracing::debug!(
        driver = dialect.driver_id(),
        host = %config.engine.host,
        port = config.engine.port,
        "Opening engine"
    );

    Ok(Sql::new(dialect, connection)?
        .with_exclusions(Exclusions::from(&config.exclusions))
        .with_command_timeout(config.engine.command_timeout()))
}
