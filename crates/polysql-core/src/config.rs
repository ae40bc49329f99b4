// SPDX-License-Identifier: Apache-2.0

//! Engine connection and exclusion settings
//!
//! These are plain serde structs; loading them from disk and wiring them to
//! a transport happens in the `polysql` crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::sensitive::Sensitive;

/// Where and how to connect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Dialect identifier, e.g. "postgres"
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Sensitive<String>,
    pub database: Option<String>,
    pub ssl: bool,
    pub command_timeout_secs: Option<u64>,
}

impl ConnectionConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.driver.trim().is_empty() {
            return Err(EngineError::config("engine.driver must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(EngineError::config("engine.host must not be empty"));
        }
        if self.port == 0 {
            return Err(EngineError::config("engine.port must be greater than zero"));
        }
        Ok(())
    }
}

/// Names hidden from every introspection result, matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub databases: Vec<String>,
    pub schemas: Vec<String>,
    pub tables: Vec<String>,
}

impl ExclusionConfig {
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.schemas.is_empty() && self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"driver":"postgres","host":"db","port":5432}"#)
                .expect("parse");
        assert_eq!(config.username, "");
        assert!(config.database.is_none());
        assert!(config.command_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let config = ConnectionConfig {
            driver: "mysql".into(),
            host: "localhost".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config { .. })));
    }

    #[test]
    fn zero_timeout_means_none() {
        let config = ConnectionConfig {
            command_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.command_timeout().is_none());
    }
}
