// SPDX-License-Identifier: Apache-2.0

//! Dialect Registry
//!
//! Maps driver identifiers ("oracle", "postgres", ...) to dialect plug-ins
//! so callers can pick an engine from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::traits::Dialect;

/// Identifier and display name of a registered dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub id: String,
    pub name: String,
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Dialect>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dialect under its `driver_id()`, replacing any previous one.
    pub fn register(&mut self, dialect: Arc<dyn Dialect>) {
        self.drivers.insert(dialect.driver_id().to_string(), dialect);
    }

    pub fn get(&self, driver_id: &str) -> Option<Arc<dyn Dialect>> {
        self.drivers.get(driver_id).cloned()
    }

    /// Like [`get`](Self::get) but reports unknown ids as `DriverNotFound`.
    pub fn require(&self, driver_id: &str) -> EngineResult<Arc<dyn Dialect>> {
        self.get(driver_id)
            .ok_or_else(|| EngineError::driver_not_found(driver_id))
    }

    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn list_infos(&self) -> Vec<DriverInfo> {
        let mut infos: Vec<DriverInfo> = self
            .drivers
            .values()
            .map(|dialect| DriverInfo {
                id: dialect.driver_id().to_string(),
                name: dialect.driver_name().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
