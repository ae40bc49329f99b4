// SPDX-License-Identifier: Apache-2.0

use polysql::{builtin_registry, open_engine, EngineError, PolysqlConfig};

fn config(driver: &str, port: u16) -> PolysqlConfig {
    PolysqlConfig::from_json(&format!(
        r#"{{
            "engine": {{ "driver": "{driver}", "host": "127.0.0.1", "port": {port},
                         "username": "app", "password": "secret", "database": "shop",
                         "command_timeout_secs": 5 }},
            "exclusions": {{ "schemas": ["information_schema"] }}
        }}"#
    ))
    .expect("config")
}

#[test]
fn builtin_registry_wires_every_dialect() {
    let registry = builtin_registry();
    let ids: Vec<String> = registry.list_infos().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["mysql", "oracle", "postgres", "sqlserver"]);
}

#[tokio::test]
async fn postgres_engine_opens_lazily() {
    // Nothing listens on port 1; building the engine must not connect.
    let sql = open_engine(&config("postgres", 1), &builtin_registry()).expect("engine");
    assert_eq!(sql.dialect().driver_id(), "postgres");
    assert!(!sql.exclusions().is_empty());
    assert_eq!(sql.escape("Orders"), "\"Orders\"");
    assert!(!sql.is_disposed());

    sql.dispose().await.expect("dispose");
    let err = sql.current_database().await.expect_err("disposed");
    assert!(matches!(err, EngineError::ConnectionDisposed));
}

#[test]
fn mysql_engine_uses_backticks() {
    let sql = open_engine(&config("mysql", 3306), &builtin_registry()).expect("engine");
    assert_eq!(sql.escape("order"), "`order`");
}

#[test]
fn sqlserver_engine_uses_brackets() {
    let sql = open_engine(&config("sqlserver", 1433), &builtin_registry()).expect("engine");
    assert_eq!(sql.escape("Order Lines"), "[Order Lines]");
    assert_eq!(sql.dialect().parameter_placeholder(0), "@p0");
}

#[test]
fn engines_without_transport_are_not_supported() {
    let err = open_engine(&config("oracle", 1521), &builtin_registry()).expect_err("oracle");
    assert!(matches!(err, EngineError::NotSupported { .. }));
}

#[test]
fn unknown_driver_is_reported() {
    let err = open_engine(&config("db2", 50000), &builtin_registry()).expect_err("db2");
    assert!(matches!(err, EngineError::DriverNotFound { .. }));
}
