// SPDX-License-Identifier: Apache-2.0

//! Bundled dialects and transports
//!
//! Dialects for Oracle, SQL Server, PostgreSQL and MySQL, plus transports
//! for PostgreSQL and MySQL (sqlx) and SQL Server (tiberius).

mod convert;

pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlserver;
pub mod transport;

use std::sync::Arc;

use polysql_core::DriverRegistry;

pub use mysql::{MySqlDialect, MySqlType};
pub use oracle::{OracleDialect, OracleType};
pub use postgres::{PostgresDialect, PostgresType};
pub use sqlserver::{SqlServerDialect, SqlServerType};
pub use transport::{MySqlTransport, PgTransport, SqlServerTransport};

/// A registry with every bundled dialect registered.
pub fn builtin_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(OracleDialect::new()));
    registry.register(Arc::new(SqlServerDialect::new()));
    registry.register(Arc::new(PostgresDialect::new()));
    registry.register(Arc::new(MySqlDialect::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use polysql_core::TypeCatalogProvider;

    #[test]
    fn builtin_registry_lists_all_dialects() {
        let registry = builtin_registry();
        assert_eq!(registry.list(), vec!["mysql", "oracle", "postgres", "sqlserver"]);
    }

    #[test]
    fn every_bundled_catalog_validates() {
        let registry = builtin_registry();
        for id in registry.list() {
            let dialect = registry.require(id).expect("dialect");
            let types = dialect.types().expect("catalog builds");
            assert_eq!(types.engine(), id);
            assert!(types.iter().all(|t| !t.type_name().is_empty()));
            assert!(types.iter().filter(|t| !t.is_alias()).all(|t| t.alias_depth() == 0));
        }
    }
}
