// SPDX-License-Identifier: Apache-2.0

//! Oracle dialect driven through `Sql` over a scripted connection.

use std::sync::Arc;

use futures::TryStreamExt;
use polysql_core::testing::{Response, ScriptedConnection};
use polysql_core::{
    DataTable, DatabaseSchemaDatabase, DatabaseSchemaTable, DbType, EngineError, Exclusions,
    InsertColumn, Sql, Value,
};
use polysql_drivers::OracleDialect;

fn table_rows(rows: &[(&str, &str)]) -> Response {
    let mut table = DataTable::new(vec!["SCHEMA_NAME".into(), "TABLE_NAME".into()]);
    for (schema, name) in rows {
        table = table.with_row(vec![Value::from(*schema), Value::from(*name)]);
    }
    Response::Table(table)
}

fn database_rows(names: &[&str]) -> Response {
    let mut table = DataTable::new(vec!["DATABASE_NAME".into()]);
    for name in names {
        table = table.with_row(vec![Value::from(*name)]);
    }
    Response::Table(table)
}

fn column_rows(rows: &[(&str, &str, &str, &str, Option<&str>)]) -> Response {
    let columns = [
        "SCHEMA_NAME",
        "TABLE_NAME",
        "COLUMN_NAME",
        "DATA_TYPE",
        "NULLABLE",
        "ORDINAL",
        "LENGTH",
        "PRECISION",
        "SCALE",
        "DEFAULT_VALUE",
    ];
    let mut table = DataTable::new(columns.iter().map(|c| c.to_string()).collect());
    for (ordinal, (schema, name, column, data_type, default)) in rows.iter().enumerate() {
        table = table.with_row(vec![
            Value::from(*schema),
            Value::from(*name),
            Value::from(*column),
            Value::from(*data_type),
            Value::from("Y"),
            Value::Int(ordinal as i64 + 1),
            Value::Null,
            Value::Null,
            Value::Null,
            default.map(Value::from).unwrap_or(Value::Null),
        ]);
    }
    Response::Table(table)
}

fn oracle(connection: ScriptedConnection) -> Sql {
    Sql::new(Arc::new(OracleDialect::new()), Box::new(connection)).expect("sql")
}

fn orcl() -> DatabaseSchemaDatabase {
    DatabaseSchemaDatabase::new("ORCL").expect("database")
}

#[tokio::test]
async fn tables_fall_back_from_dba_to_all_views() {
    let connection = ScriptedConnection::new()
        .on("DBA_TABLES", Response::Fail("ORA-00942: table or view does not exist".into()))
        .on("ALL_TABLES", table_rows(&[("HR", "EMPLOYEES"), ("HR", "DEPARTMENTS")]))
        .on("USER_TABLES", table_rows(&[("hr", "employees")]));
    let sql = oracle(connection);

    let found = sql.introspect_tables(&orcl()).await.expect("tables");
    let names: Vec<&str> = found.items.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["DEPARTMENTS", "EMPLOYEES"]);
    assert_eq!(found.failures.len(), 1);
    assert!(found.failures[0].query.contains("DBA_TABLES"));
}

#[tokio::test]
async fn tables_stream_walks_every_database() {
    let connection = ScriptedConnection::new()
        .on("V$DATABASE", database_rows(&["ORCL"]))
        .on("SYS_CONTEXT", database_rows(&["orcl"]))
        .on("ORA_DATABASE_NAME", database_rows(&["ORCL"]))
        .on("DBA_TABLES", table_rows(&[("HR", "EMPLOYEES"), ("SYS", "AUD$")]))
        .on("ALL_TABLES", table_rows(&[]))
        .on("USER_TABLES", table_rows(&[]));
    let mut exclusions = Exclusions::new();
    exclusions.exclude_schema_name("sys");
    let sql = oracle(connection).with_exclusions(exclusions);

    let tables: Vec<DatabaseSchemaTable> = sql.tables().try_collect().await.expect("tables");
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name(), "EMPLOYEES");
    assert_eq!(tables[0].database().name(), "ORCL");
}

#[tokio::test]
async fn every_candidate_failing_raises_aggregate() {
    let connection = ScriptedConnection::new()
        .on("DBA_TABLES", Response::Fail("ORA-00942".into()))
        .on("ALL_TABLES", Response::Fail("ORA-01031".into()))
        .on("USER_TABLES", Response::Fail("ORA-03113".into()));
    let sql = oracle(connection);

    let err = sql.introspect_tables(&orcl()).await.expect_err("aggregate");
    match err {
        EngineError::Aggregate { failures, .. } => {
            assert_eq!(failures.len(), 3);
            assert!(failures[0].query.contains("DBA_TABLES"));
            assert!(failures[2].query.contains("USER_TABLES"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn table_columns_bind_owner_and_drop_null_defaults() {
    let connection = ScriptedConnection::new().on(
        "DBA_TAB_COLUMNS",
        column_rows(&[
            ("HR", "EMPLOYEES", "EMPLOYEE_ID", "NUMBER", None),
            ("HR", "EMPLOYEES", "MANAGER_ID", "NUMBER", Some("null")),
            ("HR", "EMPLOYEES", "HIRE_DATE", "DATE", Some("SYSDATE ")),
        ]),
    );
    let log = connection.log();
    let sql = oracle(connection);
    let table = DatabaseSchemaTable::from_parts("ORCL", Some("HR"), "EMPLOYEES").expect("table");

    let columns: Vec<_> = sql.table_columns(table).try_collect().await.expect("columns");
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[1].name(), "MANAGER_ID");
    assert_eq!(columns[1].default_value(), None);
    assert_eq!(columns[2].default_value(), Some("SYSDATE"));
    assert_eq!(columns[2].db_type(), DbType::DateTime);

    let executions = log.executions();
    let dba = executions
        .iter()
        .find(|e| e.sql.contains("DBA_TAB_COLUMNS"))
        .expect("dba query ran");
    assert_eq!(dba.parameters.len(), 2);
    assert_eq!(dba.parameters[0].name, ":p0");
    assert_eq!(dba.parameters[0].value, Value::from("HR"));
    assert_eq!(dba.parameters[1].value, Value::from("EMPLOYEES"));
}

#[tokio::test]
async fn current_database_is_resolved_once() {
    let connection = ScriptedConnection::new()
        .on("'DB_NAME'", Response::Fail("ORA-00904".into()))
        .on("ORA_DATABASE_NAME", Response::Scalar(Value::from("ORCL")));
    let log = connection.log();
    let sql = oracle(connection);

    assert_eq!(sql.current_database().await.expect("db"), Some("ORCL".to_string()));
    assert_eq!(sql.current_database().await.expect("db"), Some("ORCL".to_string()));
    assert_eq!(log.executions_matching("ORA_DATABASE_NAME"), 1);
    assert_eq!(log.executions_matching("V$DATABASE"), 0);
}

#[tokio::test]
async fn insert_escapes_reserved_names_and_reuses_one_command() {
    let connection = ScriptedConnection::new().on("INSERT INTO", Response::Affected(1));
    let log = connection.log();
    let sql = oracle(connection);
    let table = DatabaseSchemaTable::from_parts("ORCL", Some("SALES"), "ORDER").expect("table");
    let columns = [
        InsertColumn::new("ID", DbType::Decimal),
        InsertColumn::new("COMMENT", DbType::AnsiString),
    ];

    let affected = sql
        .insert(
            &table,
            &columns,
            vec![
                vec![Some(Value::Int(1)), Some(Value::from("first"))],
                vec![Some(Value::Int(2)), None],
                vec![Some(Value::Int(3)), Some(Value::from("third"))],
            ],
        )
        .await
        .expect("insert");

    assert_eq!(affected, 3);
    assert_eq!(
        log.commands(),
        vec!["INSERT INTO SALES.\"ORDER\" (ID, \"COMMENT\") VALUES (:p0, :p1)".to_string()]
    );
    let executions = log.executions();
    assert_eq!(executions.len(), 3);
    assert_eq!(executions[1].parameters[1].value, Value::Null);
    assert_eq!(executions[1].parameters[1].db_type, DbType::AnsiString);
}
