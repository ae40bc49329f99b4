// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for polysql
//!
//! Transport errors, catalog construction bugs and introspection failures
//! are all mapped to [`EngineError`] so callers handle every engine the
//! same way.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Introspection level a catalog failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogLevel {
    CurrentDatabase,
    CurrentSchema,
    Databases,
    Schemas,
    Tables,
    Columns,
}

impl fmt::Display for CatalogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CatalogLevel::CurrentDatabase => "current database",
            CatalogLevel::CurrentSchema => "current schema",
            CatalogLevel::Databases => "databases",
            CatalogLevel::Schemas => "schemas",
            CatalogLevel::Tables => "tables",
            CatalogLevel::Columns => "columns",
        };
        f.write_str(label)
    }
}

/// One candidate query (or one row of it) that failed during introspection.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogFailure {
    pub level: CatalogLevel,
    /// SQL text of the candidate query
    pub query: String,
    /// Zero-based row index when a single row failed conversion
    pub row: Option<usize>,
    pub cause: Box<EngineError>,
}

impl CatalogFailure {
    pub fn query(level: CatalogLevel, query: impl Into<String>, cause: EngineError) -> Self {
        Self {
            level,
            query: query.into(),
            row: None,
            cause: Box::new(cause),
        }
    }

    pub fn row(
        level: CatalogLevel,
        query: impl Into<String>,
        row: usize,
        cause: EngineError,
    ) -> Self {
        Self {
            level,
            query: query.into(),
            row: Some(row),
            cause: Box::new(cause),
        }
    }
}

impl fmt::Display for CatalogFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "`{}` (row {}): {}", self.query, row, self.cause),
            None => write!(f, "`{}`: {}", self.query, self.cause),
        }
    }
}

fn render_failures(failures: &[CatalogFailure]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, failure)| format!("[{}] {}", i + 1, failure))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unified error type for all engine operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Query syntax error: {message}")]
    SyntaxError { message: String },

    #[error("Query execution error: {message}")]
    ExecutionError { message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Driver not found: {driver_id}")]
    DriverNotFound { driver_id: String },

    #[error("Connection used after it was disposed")]
    ConnectionDisposed,

    #[error("Feature not supported: {message}")]
    NotSupported { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("{engine}: native type {item} has no type descriptor")]
    MissingTypeDescriptor { engine: String, item: String },

    #[error("{engine}: native type {item} has more than one type descriptor")]
    DuplicateTypeDescriptor { engine: String, item: String },

    #[error("{engine}: type name '{name}' is declared by both {first} and {second}")]
    DuplicateTypeName {
        engine: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("{engine}: native type {item} aliases {target}, which is not part of the catalog")]
    UnknownAliasTarget {
        engine: String,
        item: String,
        target: String,
    },

    #[error("{engine}: circular alias reference {}", .chain.join(" -> "))]
    CircularAliasReference { engine: String, chain: Vec<String> },

    #[error("Failed to read {level} ({} failed): {}", .failures.len(), render_failures(.failures))]
    Aggregate {
        level: CatalogLevel,
        failures: Vec<CatalogFailure>,
    },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: msg.into() }
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError { message: msg.into() }
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError { message: msg.into() }
    }

    pub fn driver_not_found(id: impl Into<String>) -> Self {
        Self::DriverNotFound { driver_id: id.into() }
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported { message: msg.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError { message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }

    /// True for the type catalog errors raised while building a catalog.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTypeDescriptor { .. }
                | Self::DuplicateTypeDescriptor { .. }
                | Self::DuplicateTypeName { .. }
                | Self::UnknownAliasTarget { .. }
                | Self::CircularAliasReference { .. }
        )
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_failure_in_order() {
        let err = EngineError::Aggregate {
            level: CatalogLevel::Tables,
            failures: vec![
                CatalogFailure::query(
                    CatalogLevel::Tables,
                    "SELECT * FROM dba_tables",
                    EngineError::execution_error("ORA-00942: table or view does not exist"),
                ),
                CatalogFailure::row(
                    CatalogLevel::Tables,
                    "SELECT * FROM all_tables",
                    3,
                    EngineError::validation("table name is blank"),
                ),
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("Failed to read tables (2 failed)"));
        let first = text.find("dba_tables").expect("first failure");
        let second = text.find("all_tables").expect("second failure");
        assert!(first < second);
        assert!(text.contains("(row 3)"));
        assert!(text.contains("ORA-00942"));
    }

    #[test]
    fn circular_alias_renders_chain() {
        let err = EngineError::CircularAliasReference {
            engine: "oracle".to_string(),
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "oracle: circular alias reference A -> B -> A");
        assert!(err.is_catalog_error());
    }
}
