// SPDX-License-Identifier: Apache-2.0

//! Row converters shared by the bundled dialects
//!
//! Every bundled column query labels its output the same way
//! (`COLUMN_NAME`, `DATA_TYPE`, `NULLABLE`, `ORDINAL`, `LENGTH`,
//! `PRECISION`, `SCALE`, `DEFAULT_VALUE`), so only the table part and the
//! default-value quirks differ per engine.

use polysql_core::{
    DataRow, DatabaseSchemaColumn, DatabaseSchemaDatabase, DatabaseSchemaSchema,
    DatabaseSchemaTable, DatabaseTypes, EngineResult,
};

pub(crate) const DATABASE_NAME: &str = "DATABASE_NAME";
pub(crate) const SCHEMA_NAME: &str = "SCHEMA_NAME";
pub(crate) const TABLE_NAME: &str = "TABLE_NAME";

pub(crate) fn database(row: &DataRow<'_>) -> EngineResult<DatabaseSchemaDatabase> {
    DatabaseSchemaDatabase::new(row.require_string(DATABASE_NAME)?)
}

pub(crate) fn schema(
    database: &DatabaseSchemaDatabase,
    row: &DataRow<'_>,
) -> EngineResult<DatabaseSchemaSchema> {
    Ok(DatabaseSchemaSchema::new(
        database.clone(),
        Some(row.require_string(SCHEMA_NAME)?),
    ))
}

/// Table under `database`, with the schema read from `SCHEMA_NAME`.
pub(crate) fn table(
    database: &DatabaseSchemaDatabase,
    row: &DataRow<'_>,
) -> EngineResult<DatabaseSchemaTable> {
    let schema = DatabaseSchemaSchema::new(database.clone(), row.get_string(SCHEMA_NAME)?);
    DatabaseSchemaTable::new(schema, row.require_string(TABLE_NAME)?)
}

/// Builds a column of `table`. `normalize_default` turns the engine's raw
/// default expression into a literal, `None` meaning SQL NULL.
pub(crate) fn column(
    table: DatabaseSchemaTable,
    types: &DatabaseTypes,
    row: &DataRow<'_>,
    normalize_default: fn(String) -> Option<String>,
) -> EngineResult<DatabaseSchemaColumn> {
    let data_type = row.require_string("DATA_TYPE")?;
    let db_type = types.db_type_or_default(&data_type);
    let column = DatabaseSchemaColumn::new(table, row.require_string("COLUMN_NAME")?, data_type, db_type)?
        .with_nullable(row.get_bool("NULLABLE")?.unwrap_or(true))
        .with_ordinal(row.get_i64("ORDINAL")?.unwrap_or(0))
        .with_length(row.get_i64("LENGTH")?)
        .with_precision(row.get_i64("PRECISION")?)
        .with_scale(row.get_i64("SCALE")?)
        .with_default_value(row.get_string("DEFAULT_VALUE")?.and_then(normalize_default));
    Ok(column)
}

/// Strips the wrapping parentheses some engines store around defaults.
pub(crate) fn strip_parens(text: &str) -> &str {
    let mut current = text.trim();
    while current.len() >= 2 && current.starts_with('(') && current.ends_with(')') {
        let inner = &current[1..current.len() - 1];
        if !balanced(inner) {
            break;
        }
        current = inner.trim();
    }
    current
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_parens_removes_only_wrapping_pairs() {
        assert_eq!(strip_parens("((0))"), "0");
        assert_eq!(strip_parens("(getdate())"), "getdate()");
        assert_eq!(strip_parens("(1) + (2)"), "(1) + (2)");
        assert_eq!(strip_parens("'x'"), "'x'");
    }
}
