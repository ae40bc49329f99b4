// SPDX-License-Identifier: Apache-2.0

//! Candidate catalog queries and their tolerated outcome

use crate::error::CatalogFailure;
use crate::types::SqlParameter;

/// One candidate query a dialect offers for an introspection level.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub sql: String,
    pub parameters: Vec<SqlParameter>,
}

impl CatalogQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn bind(mut self, parameter: SqlParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Objects found by an introspection level, plus the candidate failures that were tolerated.
#[derive(Debug)]
pub struct Introspected<T> {
    pub items: Vec<T>,
    pub failures: Vec<CatalogFailure>,
}

impl<T> Introspected<T> {
    /// True when every candidate query and row succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for Introspected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}
