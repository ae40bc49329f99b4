// SPDX-License-Identifier: Apache-2.0

//! Transport and dialect contracts
//!
//! A [`Connection`] is the per-engine transport (sockets, TLS, auth are its
//! business). A [`Dialect`] is the per-engine plug-in that knows how to
//! quote identifiers, which catalog views to query and how to read them.
//! [`crate::Sql`] composes one of each.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::DatabaseTypes;
use crate::data::DataRow;
use crate::error::EngineResult;
use crate::escape::Escaper;
use crate::introspect::CatalogQuery;
use crate::schema::{
    DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema, DatabaseSchemaTable,
};
use crate::types::{Parameter, Value};

/// Forward-only cursor over a command's result set.
#[async_trait]
pub trait DataReader: Send {
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the result set is exhausted.
    async fn next_row(&mut self) -> EngineResult<Option<Vec<Value>>>;
}

/// A prepared statement plus its native parameters.
///
/// Executing the same command again after changing parameter values must
/// not rebuild the statement.
#[async_trait]
pub trait Command: Send {
    fn text(&self) -> &str;

    fn set_timeout(&mut self, timeout: Option<Duration>);

    fn add_parameter(&mut self, parameter: Parameter);

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Runs the statement and returns the number of affected rows.
    async fn execute_non_query(&mut self) -> EngineResult<u64>;

    /// First column of the first row, NULL when there are no rows.
    async fn execute_scalar(&mut self) -> EngineResult<Value>;

    async fn execute_reader(&mut self) -> EngineResult<Box<dyn DataReader>>;
}

/// Underlying engine connection.
#[async_trait]
pub trait Connection: Send {
    fn is_open(&self) -> bool;

    async fn open(&mut self) -> EngineResult<()>;

    async fn close(&mut self) -> EngineResult<()>;

    /// Creates a command bound to this connection. Fails if not open.
    fn create_command(&mut self, text: &str) -> EngineResult<Box<dyn Command>>;
}

/// Supplies the engine's type catalog, normally from the shared cache.
pub trait TypeCatalogProvider {
    fn types(&self) -> EngineResult<Arc<DatabaseTypes>>;
}

/// Ordered candidate catalog queries plus row converters for each level.
///
/// Candidates are tried in order and may fail individually (missing view,
/// missing privilege). Converters may fail for a single row; that row is
/// skipped.
pub trait SchemaIntrospector {
    fn current_database_queries(&self) -> Vec<CatalogQuery>;

    fn current_schema_queries(&self) -> Vec<CatalogQuery>;

    fn database_queries(&self) -> Vec<CatalogQuery>;

    fn schema_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery>;

    fn table_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery>;

    /// Column candidates for a whole database, or narrowed to one table.
    fn column_queries(
        &self,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> Vec<CatalogQuery>;

    fn to_database(&self, row: &DataRow<'_>) -> EngineResult<DatabaseSchemaDatabase>;

    fn to_schema(
        &self,
        database: &DatabaseSchemaDatabase,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaSchema>;

    fn to_table(
        &self,
        database: &DatabaseSchemaDatabase,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaTable>;

    fn to_column(
        &self,
        database: &DatabaseSchemaDatabase,
        types: &DatabaseTypes,
        row: &DataRow<'_>,
    ) -> EngineResult<DatabaseSchemaColumn>;
}

/// Core trait every per-engine plug-in implements
pub trait Dialect: SchemaIntrospector + TypeCatalogProvider + Send + Sync {
    /// Returns the unique identifier for this dialect (e.g. "oracle", "postgres")
    fn driver_id(&self) -> &'static str;

    /// Returns a human-readable name for this dialect
    fn driver_name(&self) -> &'static str;

    fn escaper(&self) -> &Escaper;

    /// Native parameter name for the parameter at `index`; unique per index.
    fn parameter_name(&self, index: usize) -> String;

    /// Placeholder written into SQL text for the parameter at `index`.
    fn parameter_placeholder(&self, index: usize) -> String {
        self.parameter_name(index)
    }

    /// Name components used to address a table in DML, outermost first.
    fn table_path<'a>(&self, table: &'a DatabaseSchemaTable) -> Vec<Option<&'a str>> {
        vec![table.schema().name(), Some(table.name())]
    }
}
