// SPDX-License-Identifier: Apache-2.0

//! polysql configuration file
//!
//! ```json
//! {
//!   "engine": { "driver": "postgres", "host": "localhost", "port": 5432,
//!               "username": "app", "password": "secret", "database": "shop" },
//!   "exclusions": { "schemas": ["pg_toast"] },
//!   "logging": { "filter": "polysql=debug", "json": true }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use polysql_core::{ConnectionConfig, EngineError, EngineResult, ExclusionConfig};
use serde::{Deserialize, Serialize};

/// Overrides `logging.filter` when set.
pub const LOG_FILTER_ENV: &str = "POLYSQL_LOG";

const DEFAULT_LOG_FILTER: &str = "polysql=info";
const DEFAULT_RETENTION_DAYS: u64 = 14;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolysqlConfig {
    pub engine: ConnectionConfig,
    #[serde(default)]
    pub exclusions: ExclusionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub filter: String,
    /// Emit JSON lines instead of human readable text
    pub json: bool,
    /// Daily rolling log files go here; stderr when unset
    pub directory: Option<PathBuf>,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
            directory: None,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl LoggingConfig {
    /// The filter to install, honouring [`LOG_FILTER_ENV`].
    pub fn effective_filter(&self) -> String {
        std::env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.filter.clone())
    }
}

impl PolysqlConfig {
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| EngineError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.engine.validate()?;
        if self.logging.filter.trim().is_empty() {
            return Err(EngineError::config("logging.filter must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "engine": { "driver": "postgres", "host": "db.internal", "port": 5432,
                    "username": "app", "password": "s3cret" }
    }"#;

    #[test]
    fn minimal_file_gets_defaults() {
        let config = PolysqlConfig::from_json(MINIMAL).expect("config");
        assert_eq!(config.engine.driver, "postgres");
        assert_eq!(config.engine.password.expose(), "s3cret");
        assert!(config.exclusions.is_empty());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.engine.command_timeout(), None);
    }

    #[test]
    fn password_never_appears_in_debug_output() {
        let config = PolysqlConfig::from_json(MINIMAL).expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn zero_port_is_rejected() {
        let err = PolysqlConfig::from_json(
            r#"{ "engine": { "driver": "mysql", "host": "localhost", "port": 0 } }"#,
        )
        .expect_err("invalid");
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn empty_driver_is_rejected() {
        let err = PolysqlConfig::from_json(
            r#"{ "engine": { "driver": " ", "host": "localhost", "port": 3306 } }"#,
        )
        .expect_err("invalid");
        assert!(err.to_string().contains("driver"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PolysqlConfig::from_json("{ engine: ").expect_err("invalid");
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "engine": {{ "driver": "sqlserver", "host": "mssql", "port": 1433,
                             "command_timeout_secs": 30 }},
                "exclusions": {{ "databases": ["master", "tempdb"] }},
                "logging": {{ "json": true, "retention_days": 3 }}
            }}"#
        )
        .expect("write");

        let config = PolysqlConfig::from_file(file.path()).expect("config");
        assert_eq!(config.engine.command_timeout().map(|d| d.as_secs()), Some(30));
        assert_eq!(config.exclusions.databases, vec!["master", "tempdb"]);
        assert!(config.logging.json);
        assert_eq!(config.logging.retention_days, 3);
        assert_eq!(config.logging.filter, "polysql=info");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = PolysqlConfig::from_file(dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, EngineError::Config { .. }));
    }
}
