// SPDX-License-Identifier: Apache-2.0

//! Dialect engine core
//!
//! [`Sql`] pairs one [`Dialect`] with one transport [`Connection`] and offers
//! escaping, parameterized commands, batch inserts and catalog
//! introspection on top of them. Work is sequential: the connection sits
//! behind an async mutex and candidate queries run one after another.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, instrument, trace};

use crate::catalog::DatabaseTypes;
use crate::data::{DataRow, DataTable};
use crate::error::{CatalogLevel, EngineError, EngineResult, CatalogFailure};
use crate::exclusion::Exclusions;
use crate::introspect::{CatalogQuery, Introspected};
use crate::schema::{
    sort_canonical, CatalogObject, DatabaseSchemaColumn, DatabaseSchemaDatabase,
    DatabaseSchemaSchema, DatabaseSchemaTable,
};
use crate::traits::{Command, Connection, Dialect};
use crate::types::{DbType, Parameter, SqlParameter, Value};

/// Target column of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertColumn {
    pub name: String,
    pub db_type: DbType,
}

impl InsertColumn {
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type,
        }
    }
}

pub struct Sql {
    dialect: Arc<dyn Dialect>,
    types: Arc<DatabaseTypes>,
    connection: Mutex<Box<dyn Connection>>,
    disposed: AtomicBool,
    exclusions: Exclusions,
    command_timeout: Option<Duration>,
    current_database: OnceCell<Option<String>>,
    current_schema: OnceCell<Option<String>>,
}

impl Sql {
    /// Fails only if the dialect's type catalog cannot be built.
    pub fn new(dialect: Arc<dyn Dialect>, connection: Box<dyn Connection>) -> EngineResult<Self> {
        let types = dialect.types()?;
        Ok(Self {
            dialect,
            types,
            connection: Mutex::new(connection),
            disposed: AtomicBool::new(false),
            exclusions: Exclusions::default(),
            command_timeout: None,
            current_database: OnceCell::new(),
            current_schema: OnceCell::new(),
        })
    }

    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn types(&self) -> &DatabaseTypes {
        &self.types
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    // ==================== Connection lifecycle ====================

    fn ensure_live(&self) -> EngineResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(EngineError::ConnectionDisposed)
        } else {
            Ok(())
        }
    }

    /// The transport, opened on first use.
    pub async fn connection(&self) -> EngineResult<MutexGuard<'_, Box<dyn Connection>>> {
        self.ensure_live()?;
        let mut connection = self.connection.lock().await;
        // dispose() may have won the lock while we waited
        self.ensure_live()?;
        if !connection.is_open() {
            debug!(driver = self.dialect.driver_id(), "Opening connection");
            connection.open().await?;
        }
        Ok(connection)
    }

    /// Closes the transport. Later calls, concurrent or not, do nothing.
    pub async fn dispose(&self) -> EngineResult<()> {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let mut connection = self.connection.lock().await;
        if connection.is_open() {
            debug!(driver = self.dialect.driver_id(), "Closing connection");
            connection.close().await?;
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ==================== Escaping ====================

    pub fn escape(&self, identifier: &str) -> String {
        self.dialect.escaper().escape(identifier)
    }

    pub fn unescape<'a>(&self, identifier: &'a str) -> &'a str {
        self.dialect.escaper().unescape(identifier)
    }

    pub fn needs_escaping(&self, identifier: &str) -> bool {
        self.dialect.escaper().needs_escaping(identifier)
    }

    pub fn escape_path<I, S>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dialect.escaper().escape_path(parts)
    }

    /// Fully qualified, escaped name of a table for use in DML.
    pub fn qualified_name(&self, table: &DatabaseSchemaTable) -> String {
        self.escape_path(self.dialect.table_path(table).into_iter().flatten())
    }

    // ==================== Commands ====================

    /// Builds a transport command with one native parameter per logical one.
    pub async fn create_command(
        &self,
        sql: &str,
        parameters: &[SqlParameter],
    ) -> EngineResult<Box<dyn Command>> {
        let mut connection = self.connection().await?;
        let mut command = connection.create_command(sql)?;
        command.set_timeout(self.command_timeout);
        for (index, parameter) in parameters.iter().enumerate() {
            command.add_parameter(Parameter::new(
                self.dialect.parameter_name(index),
                parameter.db_type,
                parameter.native_value(),
            ));
        }
        Ok(command)
    }

    pub async fn query(&self, sql: &str, parameters: &[SqlParameter]) -> EngineResult<DataTable> {
        let mut command = self.create_command(sql, parameters).await?;
        trace!(sql, parameters = parameters.len(), "Executing query");
        let reader = command.execute_reader().await?;
        DataTable::read(reader).await
    }

    pub async fn query_scalar(&self, sql: &str, parameters: &[SqlParameter]) -> EngineResult<Value> {
        let mut command = self.create_command(sql, parameters).await?;
        trace!(sql, parameters = parameters.len(), "Executing scalar");
        command.execute_scalar().await
    }

    /// First column of every row as text; NULL and blank cells are skipped.
    pub async fn query_strings(
        &self,
        sql: &str,
        parameters: &[SqlParameter],
    ) -> EngineResult<Vec<String>> {
        let table = self.query(sql, parameters).await?;
        Ok(table
            .iter()
            .filter_map(|row| row.get_string_at(0).ok().flatten())
            .collect())
    }

    pub async fn execute_non_query(
        &self,
        sql: &str,
        parameters: &[SqlParameter],
    ) -> EngineResult<u64> {
        let mut command = self.create_command(sql, parameters).await?;
        trace!(sql, parameters = parameters.len(), "Executing statement");
        command.execute_non_query().await
    }

    /// Inserts `rows` with a single prepared command, re-executed per row.
    ///
    /// `None` cells are sent as typed NULLs. A row whose length differs from
    /// `columns` fails before it executes; earlier rows stay inserted.
    /// Returns the total number of affected rows.
    #[instrument(skip(self, table, columns, rows), fields(table = %table))]
    pub async fn insert<I>(
        &self,
        table: &DatabaseSchemaTable,
        columns: &[InsertColumn],
        rows: I,
    ) -> EngineResult<u64>
    where
        I: IntoIterator<Item = Vec<Option<Value>>>,
    {
        if columns.is_empty() {
            return Err(EngineError::validation("insert needs at least one column"));
        }

        let names = columns
            .iter()
            .map(|c| self.escape(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (0..columns.len())
            .map(|i| self.dialect.parameter_placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(table),
            names,
            placeholders
        );
        let parameters: Vec<SqlParameter> = columns
            .iter()
            .map(|c| SqlParameter::null(c.db_type))
            .collect();

        let mut command = self.create_command(&sql, &parameters).await?;
        let mut affected = 0u64;
        for (index, row) in rows.into_iter().enumerate() {
            self.ensure_live()?;
            if row.len() != columns.len() {
                return Err(EngineError::validation(format!(
                    "row {} has {} values but {} columns were given",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            for (parameter, value) in command.parameters_mut().iter_mut().zip(row) {
                parameter.value = value.unwrap_or(Value::Null);
            }
            trace!(sql = %sql, row = index, "Executing insert");
            affected += command.execute_non_query().await?;
        }
        Ok(affected)
    }

    // ==================== Current database / schema ====================

    pub async fn current_database(&self) -> EngineResult<Option<String>> {
        self.current_database
            .get_or_try_init(|| {
                self.first_scalar(
                    CatalogLevel::CurrentDatabase,
                    self.dialect.current_database_queries(),
                )
            })
            .await
            .cloned()
    }

    pub async fn current_schema(&self) -> EngineResult<Option<String>> {
        self.current_schema
            .get_or_try_init(|| {
                self.first_scalar(
                    CatalogLevel::CurrentSchema,
                    self.dialect.current_schema_queries(),
                )
            })
            .await
            .cloned()
    }

    /// First non-blank scalar among the candidates, `None` when all fail.
    async fn first_scalar(
        &self,
        level: CatalogLevel,
        queries: Vec<CatalogQuery>,
    ) -> EngineResult<Option<String>> {
        let mut failures = Vec::new();
        for query in queries {
            match self.query_scalar(&query.sql, &query.parameters).await {
                Ok(value) => {
                    if let Some(text) = value.to_text().filter(|s| !s.trim().is_empty()) {
                        return Ok(Some(text.trim().to_string()));
                    }
                }
                Err(EngineError::ConnectionDisposed) => return Err(EngineError::ConnectionDisposed),
                Err(err) => failures.push(CatalogFailure::query(level, query.sql, err)),
            }
        }
        if !failures.is_empty() {
            let err = EngineError::Aggregate { level, failures };
            debug!(error = %err, "Could not resolve {}", level);
        }
        Ok(None)
    }

    // ==================== Introspection ====================

    /// Runs every candidate, keeps what converts, drops duplicates and
    /// exclusions. Fails only when nothing was found and something failed.
    async fn fan_out<T, C, X>(
        &self,
        level: CatalogLevel,
        queries: Vec<CatalogQuery>,
        convert: C,
        excluded: X,
    ) -> EngineResult<Introspected<T>>
    where
        T: CatalogObject,
        C: Fn(&DataRow<'_>) -> EngineResult<T> + Send,
        X: Fn(&T) -> bool + Send,
    {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut failures = Vec::new();

        for query in queries {
            let table = match self.query(&query.sql, &query.parameters).await {
                Ok(table) => table,
                Err(EngineError::ConnectionDisposed) => return Err(EngineError::ConnectionDisposed),
                Err(err) => {
                    debug!(%level, sql = %query.sql, error = %err, "Catalog query failed");
                    failures.push(CatalogFailure::query(level, query.sql, err));
                    continue;
                }
            };

            for row in table.iter() {
                match convert(&row) {
                    Ok(item) => {
                        if seen.insert(item.clone()) {
                            items.push(item);
                        }
                    }
                    Err(err) => {
                        debug!(%level, sql = %query.sql, row = row.index(), error = %err, "Skipping catalog row");
                        failures.push(CatalogFailure::row(level, query.sql.as_str(), row.index(), err));
                    }
                }
            }
        }

        if items.is_empty() && !failures.is_empty() {
            return Err(EngineError::Aggregate { level, failures });
        }

        items.retain(|item| !excluded(item));
        sort_canonical(&mut items);
        Ok(Introspected { items, failures })
    }

    #[instrument(skip(self), fields(driver = self.dialect.driver_id()))]
    pub async fn introspect_databases(
        &self,
    ) -> EngineResult<Introspected<DatabaseSchemaDatabase>> {
        let dialect = Arc::clone(&self.dialect);
        self.fan_out(
            CatalogLevel::Databases,
            self.dialect.database_queries(),
            |row| dialect.to_database(row),
            |db| self.exclusions.is_database_excluded(db),
        )
        .await
    }

    #[instrument(skip(self, database), fields(driver = self.dialect.driver_id(), database = %database))]
    pub async fn introspect_schemas(
        &self,
        database: &DatabaseSchemaDatabase,
    ) -> EngineResult<Introspected<DatabaseSchemaSchema>> {
        if self.exclusions.is_database_excluded(database) {
            return Ok(Introspected::default());
        }
        let dialect = Arc::clone(&self.dialect);
        self.fan_out(
            CatalogLevel::Schemas,
            self.dialect.schema_queries(database),
            |row| dialect.to_schema(database, row),
            |schema| self.exclusions.is_schema_excluded(schema),
        )
        .await
    }

    #[instrument(skip(self, database), fields(driver = self.dialect.driver_id(), database = %database))]
    pub async fn introspect_tables(
        &self,
        database: &DatabaseSchemaDatabase,
    ) -> EngineResult<Introspected<DatabaseSchemaTable>> {
        if self.exclusions.is_database_excluded(database) {
            return Ok(Introspected::default());
        }
        let dialect = Arc::clone(&self.dialect);
        self.fan_out(
            CatalogLevel::Tables,
            self.dialect.table_queries(database),
            |row| dialect.to_table(database, row),
            |table| self.exclusions.is_table_excluded(table),
        )
        .await
    }

    /// Columns of a whole database, or of one table when `table` is given.
    #[instrument(skip(self, database, table), fields(driver = self.dialect.driver_id(), database = %database))]
    pub async fn introspect_columns(
        &self,
        database: &DatabaseSchemaDatabase,
        table: Option<&DatabaseSchemaTable>,
    ) -> EngineResult<Introspected<DatabaseSchemaColumn>> {
        if self.exclusions.is_database_excluded(database)
            || table.is_some_and(|t| self.exclusions.is_table_excluded(t))
        {
            return Ok(Introspected::default());
        }
        let dialect = Arc::clone(&self.dialect);
        let types = Arc::clone(&self.types);
        let mut found = self
            .fan_out(
                CatalogLevel::Columns,
                self.dialect.column_queries(database, table),
                |row| dialect.to_column(database, &types, row),
                |column| self.exclusions.is_column_excluded(column),
            )
            .await?;
        if let Some(table) = table {
            found.items.retain(|column| column.table() == table);
        }
        Ok(found)
    }

    pub fn databases(&self) -> BoxStream<'_, EngineResult<DatabaseSchemaDatabase>> {
        introspected_stream(self.introspect_databases())
    }

    /// Schemas of every visible database.
    pub fn schemas(&self) -> BoxStream<'_, EngineResult<DatabaseSchemaSchema>> {
        self.databases()
            .map_ok(move |database| self.schemas_in(database))
            .try_flatten()
            .boxed()
    }

    pub fn schemas_in(
        &self,
        database: DatabaseSchemaDatabase,
    ) -> BoxStream<'_, EngineResult<DatabaseSchemaSchema>> {
        introspected_stream(async move { self.introspect_schemas(&database).await })
    }

    /// Tables of every visible database.
    pub fn tables(&self) -> BoxStream<'_, EngineResult<DatabaseSchemaTable>> {
        self.databases()
            .map_ok(move |database| self.tables_in(database))
            .try_flatten()
            .boxed()
    }

    pub fn tables_in(
        &self,
        database: DatabaseSchemaDatabase,
    ) -> BoxStream<'_, EngineResult<DatabaseSchemaTable>> {
        introspected_stream(async move { self.introspect_tables(&database).await })
    }

    pub fn tables_in_schema(
        &self,
        schema: DatabaseSchemaSchema,
    ) -> BoxStream<'_, EngineResult<DatabaseSchemaTable>> {
        introspected_stream(async move {
            if self.exclusions.is_schema_excluded(&schema) {
                return Ok(Introspected::default());
            }
            let mut found = self.introspect_tables(schema.database()).await?;
            found.items.retain(|table| table.schema() == &schema);
            Ok(found)
        })
    }

    /// Columns of every visible table in every visible database.
    pub fn columns(&self) -> BoxStream<'_, EngineResult<DatabaseSchemaColumn>> {
        self.databases()
            .map_ok(move |database| self.columns_in(database))
            .try_flatten()
            .boxed()
    }

    pub fn columns_in(
        &self,
        database: DatabaseSchemaDatabase,
    ) -> BoxStream<'_, EngineResult<DatabaseSchemaColumn>> {
        introspected_stream(async move { self.introspect_columns(&database, None).await })
    }

    pub fn table_columns(
        &self,
        table: DatabaseSchemaTable,
    ) -> BoxStream<'_, EngineResult<DatabaseSchemaColumn>> {
        introspected_stream(async move { self.introspect_columns(table.database(), Some(&table)).await })
    }

    /// Whether the table is visible through introspection.
    pub async fn table_exists(&self, table: &DatabaseSchemaTable) -> EngineResult<bool> {
        if self.exclusions.is_table_excluded(table) {
            return Ok(false);
        }
        let found = self.introspect_tables(table.database()).await?;
        Ok(found.items.iter().any(|t| t == table))
    }
}

impl std::fmt::Debug for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sql")
            .field("driver", &self.dialect.driver_id())
            .field("disposed", &self.is_disposed())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Lazily runs an introspection on first poll and streams its items.
fn introspected_stream<'a, T, F>(fetch: F) -> BoxStream<'a, EngineResult<T>>
where
    T: Send + 'a,
    F: Future<Output = EngineResult<Introspected<T>>> + Send + 'a,
{
    stream::once(fetch)
        .map_ok(|found| stream::iter(found.items.into_iter().map(Ok::<T, EngineError>)))
        .try_flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NativeType, TypeCatalogCache, TypeDescriptor};
    use crate::escape::Escaper;
    use crate::testing::{Response, ScriptedConnection};
    use crate::traits::{SchemaIntrospector, TypeCatalogProvider};
    use crate::types::HostType;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestType {
        Text,
        Integer,
    }

    impl NativeType for TestType {
        const ENGINE: &'static str = "sql-test";

        fn variants() -> &'static [Self] {
            &[TestType::Text, TestType::Integer]
        }

        fn descriptors() -> Vec<TypeDescriptor<Self>> {
            vec![
                TypeDescriptor::new(TestType::Text, DbType::String, HostType::String)
                    .names(&["TEXT", "VARCHAR"]),
                TypeDescriptor::new(TestType::Integer, DbType::Int64, HostType::I64)
                    .names(&["INTEGER", "INT"]),
            ]
        }

        fn item_name(self) -> &'static str {
            match self {
                TestType::Text => "Text",
                TestType::Integer => "Integer",
            }
        }

        fn native_value(self) -> i32 {
            self as i32
        }
    }

    struct TestDialect {
        escaper: Escaper,
    }

    impl TestDialect {
        fn new() -> Arc<dyn Dialect> {
            Arc::new(Self {
                escaper: Escaper::new('"', '"', |c| c.is_ascii_alphanumeric() || c == '_')
                    .with_reserved_words(["ORDER", "SELECT"]),
            })
        }
    }

    impl TypeCatalogProvider for TestDialect {
        fn types(&self) -> EngineResult<Arc<DatabaseTypes>> {
            TypeCatalogCache::global().get_or_build::<TestType>()
        }
    }

    impl SchemaIntrospector for TestDialect {
        fn current_database_queries(&self) -> Vec<CatalogQuery> {
            vec![
                CatalogQuery::new("SELECT current_db_primary"),
                CatalogQuery::new("SELECT current_db_fallback"),
            ]
        }

        fn current_schema_queries(&self) -> Vec<CatalogQuery> {
            vec![CatalogQuery::new("SELECT current_schema")]
        }

        fn database_queries(&self) -> Vec<CatalogQuery> {
            vec![CatalogQuery::new("SELECT name FROM databases")]
        }

        fn schema_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
            vec![CatalogQuery::new("SELECT name FROM schemas").bind(SqlParameter::text(database.name()))]
        }

        fn table_queries(&self, database: &DatabaseSchemaDatabase) -> Vec<CatalogQuery> {
            vec![
                CatalogQuery::new("SELECT * FROM primary_tables")
                    .bind(SqlParameter::text(database.name())),
                CatalogQuery::new("SELECT * FROM fallback_tables")
                    .bind(SqlParameter::text(database.name())),
            ]
        }

        fn column_queries(
            &self,
            database: &DatabaseSchemaDatabase,
            table: Option<&DatabaseSchemaTable>,
        ) -> Vec<CatalogQuery> {
            let mut query =
                CatalogQuery::new("SELECT * FROM columns").bind(SqlParameter::text(database.name()));
            if let Some(table) = table {
                query = query.bind(SqlParameter::text(table.name()));
            }
            vec![query]
        }

        fn to_database(&self, row: &DataRow<'_>) -> EngineResult<DatabaseSchemaDatabase> {
            DatabaseSchemaDatabase::new(row.require_string("NAME")?)
        }

        fn to_schema(
            &self,
            database: &DatabaseSchemaDatabase,
            row: &DataRow<'_>,
        ) -> EngineResult<DatabaseSchemaSchema> {
            Ok(DatabaseSchemaSchema::new(database.clone(), row.get_string("NAME")?))
        }

        fn to_table(
            &self,
            database: &DatabaseSchemaDatabase,
            row: &DataRow<'_>,
        ) -> EngineResult<DatabaseSchemaTable> {
            let schema = DatabaseSchemaSchema::new(database.clone(), row.get_string("SCHEMA_NAME")?);
            DatabaseSchemaTable::new(schema, row.require_string("TABLE_NAME")?)
        }

        fn to_column(
            &self,
            database: &DatabaseSchemaDatabase,
            types: &DatabaseTypes,
            row: &DataRow<'_>,
        ) -> EngineResult<DatabaseSchemaColumn> {
            let table = self.to_table(database, row)?;
            let data_type = row.require_string("DATA_TYPE")?;
            DatabaseSchemaColumn::new(
                table,
                row.require_string("COLUMN_NAME")?,
                data_type.clone(),
                types.db_type_or_default(&data_type),
            )
            .map(|c| c.with_ordinal(row.get_i64("ORDINAL").ok().flatten().unwrap_or(0)))
        }
    }

    impl Dialect for TestDialect {
        fn driver_id(&self) -> &'static str {
            "sql-test"
        }

        fn driver_name(&self) -> &'static str {
            "Scripted test dialect"
        }

        fn escaper(&self) -> &Escaper {
            &self.escaper
        }

        fn parameter_name(&self, index: usize) -> String {
            format!(":p{index}")
        }
    }

    fn tables(rows: &[(&str, &str)]) -> Response {
        let mut table = DataTable::new(vec!["SCHEMA_NAME".into(), "TABLE_NAME".into()]);
        for (schema, name) in rows {
            table = table.with_row(vec![Value::from(*schema), Value::from(*name)]);
        }
        Response::Table(table)
    }

    fn databases(names: &[&str]) -> Response {
        let mut table = DataTable::new(vec!["NAME".into()]);
        for name in names {
            table = table.with_row(vec![Value::from(*name)]);
        }
        Response::Table(table)
    }

    fn sql(connection: ScriptedConnection) -> Sql {
        Sql::new(TestDialect::new(), Box::new(connection)).expect("sql")
    }

    fn db(name: &str) -> DatabaseSchemaDatabase {
        DatabaseSchemaDatabase::new(name).expect("db")
    }

    #[tokio::test]
    async fn duplicate_tables_across_candidates_are_merged() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[("app", "Orders")]))
            .on("fallback_tables", tables(&[("APP", "ORDERS"), ("app", "Customers")]));
        let sql = sql(connection);

        let found: Vec<DatabaseSchemaTable> =
            sql.tables_in(db("shop")).try_collect().await.expect("tables");
        let names: Vec<&str> = found.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Customers", "Orders"]);
    }

    #[tokio::test]
    async fn one_failing_candidate_is_tolerated() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", Response::Fail("permission denied".into()))
            .on("fallback_tables", tables(&[("app", "Orders")]));
        let sql = sql(connection);

        let found = sql.introspect_tables(&db("shop")).await.expect("tables");
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.failures.len(), 1);
        assert!(!found.is_clean());
        assert!(found.failures[0].query.contains("primary_tables"));
    }

    #[tokio::test]
    async fn all_candidates_failing_raises_aggregate_in_order() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", Response::Fail("no such view".into()))
            .on("fallback_tables", Response::Fail("permission denied".into()));
        let sql = sql(connection);

        let err = sql
            .tables_in(db("shop"))
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        match err {
            EngineError::Aggregate { level, failures } => {
                assert_eq!(level, CatalogLevel::Tables);
                assert_eq!(failures.len(), 2);
                assert!(failures[0].query.contains("primary_tables"));
                assert!(failures[1].query.contains("fallback_tables"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped_and_recorded() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[("app", "Orders"), ("app", "  ")]))
            .on("fallback_tables", tables(&[]));
        let sql = sql(connection);

        let found = sql.introspect_tables(&db("shop")).await.expect("tables");
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.failures.len(), 1);
        assert_eq!(found.failures[0].row, Some(1));
    }

    #[tokio::test]
    async fn no_rows_and_no_failures_is_empty() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[]))
            .on("fallback_tables", tables(&[]));
        let sql = sql(connection);

        let found = sql.introspect_tables(&db("shop")).await.expect("tables");
        assert!(found.items.is_empty());
        assert!(found.is_clean());
    }

    #[tokio::test]
    async fn tables_walks_every_visible_database() {
        let connection = ScriptedConnection::new()
            .on("FROM databases", databases(&["shop", "archive"]))
            .on("primary_tables", tables(&[("app", "Orders")]))
            .on("fallback_tables", tables(&[]));
        let log = connection.log();
        let mut exclusions = Exclusions::new();
        exclusions.exclude_database_name("ARCHIVE");
        let sql = sql(connection).with_exclusions(exclusions);

        let found: Vec<DatabaseSchemaTable> = sql.tables().try_collect().await.expect("tables");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].database().name(), "shop");
        // the excluded database is never queried
        assert_eq!(log.executions_matching("primary_tables"), 1);
    }

    #[tokio::test]
    async fn excluded_tables_are_filtered_after_dedup() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[("app", "Orders"), ("app", "Audit")]))
            .on("fallback_tables", tables(&[("sys", "Objects")]));
        let mut exclusions = Exclusions::new();
        exclusions.exclude_schema_name("SYS").exclude_table_name("audit");
        let sql = sql(connection).with_exclusions(exclusions);

        let found: Vec<DatabaseSchemaTable> =
            sql.tables_in(db("shop")).try_collect().await.expect("tables");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Orders");
    }

    #[tokio::test]
    async fn tables_in_schema_filters_by_schema() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[("app", "Orders"), ("hr", "Staff")]))
            .on("fallback_tables", tables(&[]));
        let sql = sql(connection);
        let schema = DatabaseSchemaSchema::new(db("shop"), Some("HR"));

        let found: Vec<DatabaseSchemaTable> =
            sql.tables_in_schema(schema).try_collect().await.expect("tables");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Staff");
    }

    #[tokio::test]
    async fn table_columns_resolve_db_types() {
        let columns = DataTable::new(vec![
            "SCHEMA_NAME".into(),
            "TABLE_NAME".into(),
            "COLUMN_NAME".into(),
            "DATA_TYPE".into(),
            "ORDINAL".into(),
        ])
        .with_row(vec!["app".into(), "Orders".into(), "Notes".into(), "varchar(200)".into(), 2.into()])
        .with_row(vec!["app".into(), "Orders".into(), "Id".into(), "INT".into(), 1.into()])
        .with_row(vec!["app".into(), "Orders".into(), "Shape".into(), "GEOMETRY".into(), 3.into()]);
        let connection = ScriptedConnection::new().on("FROM columns", Response::Table(columns));
        let log = connection.log();
        let sql = sql(connection);
        let orders = DatabaseSchemaTable::from_parts("shop", Some("app"), "Orders").expect("table");

        let found: Vec<DatabaseSchemaColumn> =
            sql.table_columns(orders).try_collect().await.expect("columns");
        let summary: Vec<(&str, DbType)> = found.iter().map(|c| (c.name(), c.db_type())).collect();
        assert_eq!(
            summary,
            vec![("Id", DbType::Int64), ("Notes", DbType::String), ("Shape", DbType::String)]
        );

        let executions = log.executions();
        assert_eq!(executions[0].parameters.len(), 2);
        assert_eq!(executions[0].parameters[1].name, ":p1");
        assert_eq!(executions[0].parameters[1].value, Value::from("Orders"));
    }

    #[tokio::test]
    async fn table_exists_checks_visible_tables() {
        let connection = ScriptedConnection::new()
            .on("primary_tables", tables(&[("app", "Orders")]))
            .on("fallback_tables", tables(&[]));
        let sql = sql(connection);

        let orders = DatabaseSchemaTable::from_parts("shop", Some("APP"), "orders").expect("table");
        let missing = DatabaseSchemaTable::from_parts("shop", Some("app"), "Invoices").expect("table");
        assert!(sql.table_exists(&orders).await.expect("exists"));
        assert!(!sql.table_exists(&missing).await.expect("exists"));
    }

    #[tokio::test]
    async fn batch_insert_reuses_one_command() {
        let connection = ScriptedConnection::new();
        let log = connection.log();
        let sql = sql(connection);
        let table = DatabaseSchemaTable::from_parts("shop", Some("app"), "Order").expect("table");
        let columns = [
            InsertColumn::new("id", DbType::Int64),
            InsertColumn::new("order", DbType::String),
        ];

        let affected = sql
            .insert(
                &table,
                &columns,
                vec![
                    vec![Some(Value::from(1)), Some(Value::from("a"))],
                    vec![Some(Value::from(2)), None],
                    vec![Some(Value::from(3)), Some(Value::from("c"))],
                ],
            )
            .await
            .expect("insert");
        assert_eq!(affected, 3);

        let commands = log.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0], "INSERT INTO app.\"Order\" (id, \"order\") VALUES (:p0, :p1)");

        let executions = log.executions();
        assert_eq!(executions.len(), 3);
        assert_eq!(executions[1].parameters[0].value, Value::Int(2));
        assert_eq!(executions[1].parameters[1].value, Value::Null);
        assert_eq!(executions[1].parameters[1].db_type, DbType::String);
        assert_eq!(executions[2].parameters[1].value, Value::from("c"));
    }

    #[tokio::test]
    async fn batch_insert_rejects_short_rows() {
        let connection = ScriptedConnection::new();
        let log = connection.log();
        let sql = sql(connection);
        let table = DatabaseSchemaTable::from_parts("shop", Some("app"), "Items").expect("table");
        let columns = [InsertColumn::new("a", DbType::Int64), InsertColumn::new("b", DbType::Int64)];

        let err = sql
            .insert(
                &table,
                &columns,
                vec![vec![Some(Value::from(1)), Some(Value::from(2))], vec![Some(Value::from(3))]],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationError { .. }));
        assert_eq!(log.executions().len(), 1);
    }

    #[tokio::test]
    async fn connection_opens_lazily_once() {
        let connection = ScriptedConnection::new().on("SELECT 1", Response::Scalar(Value::Int(1)));
        let log = connection.log();
        let sql = sql(connection);
        assert_eq!(log.opens(), 0);

        sql.query_scalar("SELECT 1", &[]).await.expect("scalar");
        sql.query_scalar("SELECT 1", &[]).await.expect("scalar");
        assert_eq!(log.opens(), 1);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_under_concurrency() {
        let connection = ScriptedConnection::new().on("SELECT 1", Response::Scalar(Value::Int(1)));
        let log = connection.log();
        let sql = sql(connection);
        sql.query_scalar("SELECT 1", &[]).await.expect("scalar");

        let (a, b) = tokio::join!(sql.dispose(), sql.dispose());
        a.expect("dispose");
        b.expect("dispose");
        sql.dispose().await.expect("dispose again");

        assert_eq!(log.closes(), 1);
        assert!(sql.is_disposed());
        assert!(matches!(sql.connection().await, Err(EngineError::ConnectionDisposed)));
        assert!(matches!(
            sql.tables_in(db("shop")).try_collect::<Vec<_>>().await,
            Err(EngineError::ConnectionDisposed)
        ));
    }

    #[tokio::test]
    async fn current_database_is_memoized_and_falls_back() {
        let connection = ScriptedConnection::new()
            .on("current_db_primary", Response::Scalar(Value::from("  ")))
            .on("current_db_fallback", Response::Scalar(Value::from("SHOP")));
        let log = connection.log();
        let sql = sql(connection);

        assert_eq!(sql.current_database().await.expect("db").as_deref(), Some("SHOP"));
        assert_eq!(sql.current_database().await.expect("db").as_deref(), Some("SHOP"));
        assert_eq!(log.executions_matching("current_db_fallback"), 1);
    }

    #[tokio::test]
    async fn current_schema_failure_yields_none() {
        let connection =
            ScriptedConnection::new().on("current_schema", Response::Fail("not supported".into()));
        let sql = sql(connection);
        assert_eq!(sql.current_schema().await.expect("schema"), None);
    }

    #[tokio::test]
    async fn query_strings_skips_nulls() {
        let table = DataTable::new(vec!["NAME".into()])
            .with_row(vec!["a".into()])
            .with_row(vec![Value::Null])
            .with_row(vec!["b".into()]);
        let connection = ScriptedConnection::new().on("FROM names", Response::Table(table));
        let sql = sql(connection);
        let names = sql.query_strings("SELECT name FROM names", &[]).await.expect("strings");
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn escaping_follows_dialect_rules() {
        let sql = sql(ScriptedConnection::new());
        assert_eq!(sql.escape("ORDER"), "\"ORDER\"");
        assert_eq!(sql.escape("Customers"), "Customers");
        assert!(sql.needs_escaping("order lines"));
        assert_eq!(sql.unescape("\"ORDER\""), "ORDER");
    }
}
