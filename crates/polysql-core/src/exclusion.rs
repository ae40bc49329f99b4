// SPDX-License-Identifier: Apache-2.0

//! Introspection exclusion filters
//!
//! Objects can be hidden by identity (one specific table) or by bare name at
//! any level (every schema called `SYS`). A child is excluded whenever one
//! of its ancestors is.

use std::collections::HashSet;

use crate::config::ExclusionConfig;
use crate::schema::{
    DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema, DatabaseSchemaTable,
};

#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    databases: HashSet<DatabaseSchemaDatabase>,
    schemas: HashSet<DatabaseSchemaSchema>,
    tables: HashSet<DatabaseSchemaTable>,
    database_names: HashSet<String>,
    schema_names: HashSet<String>,
    table_names: HashSet<String>,
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Exclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
            && self.schemas.is_empty()
            && self.tables.is_empty()
            && self.database_names.is_empty()
            && self.schema_names.is_empty()
            && self.table_names.is_empty()
    }

    pub fn exclude_database(&mut self, database: DatabaseSchemaDatabase) -> &mut Self {
        self.databases.insert(database);
        self
    }

    pub fn exclude_schema(&mut self, schema: DatabaseSchemaSchema) -> &mut Self {
        self.schemas.insert(schema);
        self
    }

    pub fn exclude_table(&mut self, table: DatabaseSchemaTable) -> &mut Self {
        self.tables.insert(table);
        self
    }

    /// Excludes every database with this name.
    pub fn exclude_database_name(&mut self, name: &str) -> &mut Self {
        self.database_names.insert(fold(name));
        self
    }

    /// Excludes every schema with this name, in any database.
    pub fn exclude_schema_name(&mut self, name: &str) -> &mut Self {
        self.schema_names.insert(fold(name));
        self
    }

    /// Excludes every table with this name, in any schema.
    pub fn exclude_table_name(&mut self, name: &str) -> &mut Self {
        self.table_names.insert(fold(name));
        self
    }

    pub fn is_database_excluded(&self, database: &DatabaseSchemaDatabase) -> bool {
        self.databases.contains(database) || self.database_names.contains(&fold(database.name()))
    }

    pub fn is_schema_excluded(&self, schema: &DatabaseSchemaSchema) -> bool {
        if self.is_database_excluded(schema.database()) {
            return true;
        }
        self.schemas.contains(schema)
            || schema
                .name()
                .is_some_and(|name| self.schema_names.contains(&fold(name)))
    }

    pub fn is_table_excluded(&self, table: &DatabaseSchemaTable) -> bool {
        self.is_schema_excluded(table.schema())
            || self.tables.contains(table)
            || self.table_names.contains(&fold(table.name()))
    }

    pub fn is_column_excluded(&self, column: &DatabaseSchemaColumn) -> bool {
        self.is_table_excluded(column.table())
    }
}

impl From<&ExclusionConfig> for Exclusions {
    fn from(config: &ExclusionConfig) -> Self {
        let mut exclusions = Exclusions::new();
        for name in &config.databases {
            exclusions.exclude_database_name(name);
        }
        for name in &config.schemas {
            exclusions.exclude_schema_name(name);
        }
        for name in &config.tables {
            exclusions.exclude_table_name(name);
        }
        exclusions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DbType;

    fn table(db: &str, schema: &str, name: &str) -> DatabaseSchemaTable {
        DatabaseSchemaTable::from_parts(db, Some(schema), name).expect("table")
    }

    #[test]
    fn excluding_a_database_hides_its_children() {
        let mut exclusions = Exclusions::new();
        exclusions.exclude_database(DatabaseSchemaDatabase::new("ARCHIVE").expect("db"));

        let orders = table("archive", "dbo", "Orders");
        assert!(exclusions.is_schema_excluded(orders.schema()));
        assert!(exclusions.is_table_excluded(&orders));
        let column = DatabaseSchemaColumn::new(orders, "id", "int", DbType::Int32).expect("column");
        assert!(exclusions.is_column_excluded(&column));

        assert!(!exclusions.is_table_excluded(&table("live", "dbo", "Orders")));
    }

    #[test]
    fn bare_names_apply_everywhere() {
        let config = ExclusionConfig {
            databases: vec![],
            schemas: vec!["sys".into()],
            tables: vec!["MLOG$_ORDERS".into()],
        };
        let exclusions = Exclusions::from(&config);

        assert!(exclusions.is_table_excluded(&table("a", "SYS", "anything")));
        assert!(exclusions.is_table_excluded(&table("b", "app", "mlog$_orders")));
        assert!(!exclusions.is_table_excluded(&table("b", "app", "orders")));
    }

    #[test]
    fn identity_exclusion_is_exact() {
        let mut exclusions = Exclusions::new();
        exclusions.exclude_table(table("db", "dbo", "Orders"));

        assert!(exclusions.is_table_excluded(&table("DB", "DBO", "ORDERS")));
        assert!(!exclusions.is_table_excluded(&table("db", "sales", "Orders")));
        assert!(!exclusions.is_empty());
    }
}
