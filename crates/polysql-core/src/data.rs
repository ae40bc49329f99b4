// SPDX-License-Identifier: Apache-2.0

//! Materialized result sets
//!
//! Catalog queries read a transport's forward-only [`DataReader`] into a
//! [`DataTable`] and hand each [`DataRow`] to a dialect converter. Column
//! lookup by name is case-insensitive because engines disagree on the case
//! of catalog column labels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::traits::DataReader;
use crate::types::Value;

/// Rows read from one command execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builder used by transports and tests.
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Drains a reader to the end.
    pub async fn read(mut reader: Box<dyn DataReader>) -> EngineResult<Self> {
        let mut table = DataTable::new(reader.columns().to_vec());
        while let Some(row) = reader.next_row().await? {
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        column_index(&self.columns, name)
    }

    pub fn row(&self, index: usize) -> Option<DataRow<'_>> {
        self.rows.get(index).map(|values| DataRow {
            columns: &self.columns,
            values,
            index,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = DataRow<'_>> {
        self.rows.iter().enumerate().map(|(index, values)| DataRow {
            columns: &self.columns,
            values,
            index,
        })
    }

    /// First cell of the first row, or NULL for an empty table.
    pub fn scalar(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Serves the rows back through the forward-only reader contract.
    pub fn into_reader(self) -> Box<dyn DataReader> {
        Box::new(BufferedReader {
            columns: self.columns,
            rows: self.rows.into_iter(),
        })
    }
}

fn column_index(columns: &[String], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
}

/// Borrowed view of one row with typed, case-insensitive cell access.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    columns: &'a [String],
    values: &'a [Value],
    index: usize,
}

impl<'a> DataRow<'a> {
    pub fn new(columns: &'a [String], values: &'a [Value], index: usize) -> Self {
        Self {
            columns,
            values,
            index,
        }
    }

    /// Position of this row in its result set.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        column_index(self.columns, name).and_then(|i| self.values.get(i))
    }

    pub fn get_at(&self, ordinal: usize) -> Option<&'a Value> {
        self.values.get(ordinal)
    }

    fn cell(&self, name: &str) -> EngineResult<&'a Value> {
        self.get(name).ok_or_else(|| {
            EngineError::validation(format!(
                "row {} has no column '{}' (columns: {})",
                self.index,
                name,
                self.columns.join(", ")
            ))
        })
    }

    /// Text of a column; NULL and blank cells read as `None`.
    pub fn get_string(&self, name: &str) -> EngineResult<Option<String>> {
        Ok(non_blank(self.cell(name)?))
    }

    pub fn get_string_at(&self, ordinal: usize) -> EngineResult<Option<String>> {
        let value = self.get_at(ordinal).ok_or_else(|| {
            EngineError::validation(format!("row {} has no column #{}", self.index, ordinal))
        })?;
        Ok(non_blank(value))
    }

    /// First non-blank text among several candidate column labels.
    pub fn get_string_any(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .find_map(non_blank)
    }

    /// Like [`get_string`](Self::get_string) but NULL or blank is an error.
    pub fn require_string(&self, name: &str) -> EngineResult<String> {
        self.get_string(name)?.ok_or_else(|| {
            EngineError::validation(format!("row {}: column '{}' is empty", self.index, name))
        })
    }

    pub fn get_i64(&self, name: &str) -> EngineResult<Option<i64>> {
        let value = self.cell(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value.as_i64().map(Some).ok_or_else(|| {
            EngineError::validation(format!(
                "row {}: column '{}' is not an integer: {:?}",
                self.index, name, value
            ))
        })
    }

    pub fn get_bool(&self, name: &str) -> EngineResult<Option<bool>> {
        let value = self.cell(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value.as_bool().map(Some).ok_or_else(|| {
            EngineError::validation(format!(
                "row {}: column '{}' is not a flag: {:?}",
                self.index, name, value
            ))
        })
    }
}

fn non_blank(value: &Value) -> Option<String> {
    value.to_text().filter(|s| !s.trim().is_empty())
}

/// Forward-only reader over rows already in memory.
pub struct BufferedReader {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

#[async_trait]
impl DataReader for BufferedReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> EngineResult<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataTable {
        DataTable::new(vec!["OWNER".to_string(), "table_name".to_string(), "NULLABLE".to_string()])
            .with_row(vec![Value::from("SCOTT"), Value::from("EMP"), Value::from("Y")])
            .with_row(vec![Value::Null, Value::from("  "), Value::from("N")])
    }

    #[test]
    fn columns_resolve_case_insensitively() {
        let table = sample();
        let row = table.row(0).expect("row");
        assert_eq!(row.get_string("owner").unwrap().as_deref(), Some("SCOTT"));
        assert_eq!(row.get_string("TABLE_NAME").unwrap().as_deref(), Some("EMP"));
        assert_eq!(row.get_bool("nullable").unwrap(), Some(true));
    }

    #[test]
    fn null_and_blank_read_as_none() {
        let table = sample();
        let row = table.row(1).expect("row");
        assert_eq!(row.get_string("OWNER").unwrap(), None);
        assert_eq!(row.get_string("TABLE_NAME").unwrap(), None);
        assert!(row.require_string("TABLE_NAME").is_err());
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = sample();
        let row = table.row(0).expect("row");
        let err = row.get_string("COLUMN_ID").unwrap_err();
        assert!(matches!(err, EngineError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn reader_round_trips_rows() {
        let table = sample();
        let read = DataTable::read(table.clone().into_reader()).await.expect("read");
        assert_eq!(read, table);
        assert_eq!(read.scalar(), Value::from("SCOTT"));
    }
}
