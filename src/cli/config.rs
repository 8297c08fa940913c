//! Configuration file
//!
//! JSON, every field optional. `QUERYSTREAM_DATABASE` overrides
//! `database_path` when set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::http_server::{HttpServerConfig, StreamSettings, DEFAULT_MAX_BATCH_SIZE};
use crate::observability::Severity;
use crate::stream::{SchemaPolicy, DEFAULT_BATCH_CAPACITY};

/// Environment variable overriding `database_path`
pub const DATABASE_ENV: &str = "QUERYSTREAM_DATABASE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file, opened read-only
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Connections open at once across all streams (default 4)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Rows the executor may run ahead of the encoder (default 1000)
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound for per-request limits (default unbounded)
    #[serde(default)]
    pub max_limit: Option<u64>,

    #[serde(default)]
    pub schema_policy: SchemaPolicy,

    /// Minimum log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_database_path() -> String {
    "querystream.db".to_string()
}
fn default_max_connections() -> usize {
    4
}
fn default_fetch_size() -> usize {
    1000
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_CAPACITY
}
fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
            max_limit: None,
            schema_policy: SchemaPolicy::default(),
            log_level: default_log_level(),
            http: HttpServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults, then apply
    /// the environment override.
    pub fn resolve(path: Option<&Path>) -> CliResult<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = config.with_database_override(std::env::var(DATABASE_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace `database_path` when `path` is non-empty
    pub fn with_database_override(mut self, path: Option<String>) -> Self {
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            self.database_path = path;
        }
        self
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.database_path.trim().is_empty() {
            return Err(CliError::config_error("database_path must not be empty"));
        }

        if self.max_connections == 0 {
            return Err(CliError::config_error("max_connections must be > 0"));
        }

        if self.fetch_size == 0 {
            return Err(CliError::config_error("fetch_size must be > 0"));
        }

        if self.max_batch_size == 0 {
            return Err(CliError::config_error("max_batch_size must be > 0"));
        }

        if self.default_batch_size == 0 || self.default_batch_size > self.max_batch_size {
            return Err(CliError::config_error(format!(
                "default_batch_size must be in 1..={}",
                self.max_batch_size
            )));
        }

        if self.severity().is_none() {
            return Err(CliError::config_error(format!(
                "Invalid log_level: '{}'",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
    }

    pub fn severity(&self) -> Option<Severity> {
        Severity::parse(&self.log_level)
    }

    /// Limits handed to the stream endpoint
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            default_batch_size: self.default_batch_size,
            max_batch_size: self.max_batch_size,
            max_limit: self.max_limit,
            schema_policy: self.schema_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("querystream.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({}));

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.fetch_size, 1000);
        assert_eq!(config.http.port, 8000);
    }

    #[test]
    fn test_nested_http_section() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            json!({
                "database_path": "/data/app.db",
                "schema_policy": "strict",
                "max_limit": 10000,
                "http": {"port": 9001}
            }),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/data/app.db"));
        assert_eq!(config.http.port, 9001);
        assert_eq!(config.http.host, "0.0.0.0");

        let settings = config.stream_settings();
        assert_eq!(settings.schema_policy, SchemaPolicy::Strict);
        assert_eq!(settings.max_limit, Some(10000));
    }

    #[test]
    fn test_config_rejects_zero_connections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"max_connections": 0}));

        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.code_str(), "QS_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_config_rejects_batch_size_above_max() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"default_batch_size": 10, "max_batch_size": 5}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_config_rejects_unknown_log_level() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"log_level": "loud"}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/querystream.json")).unwrap_err();
        assert!(err.message().contains("Failed to read config"));
    }

    #[test]
    fn test_database_override() {
        let config = Config::default().with_database_override(Some("/tmp/other.db".to_string()));
        assert_eq!(config.database_path, "/tmp/other.db");

        let config = Config::default().with_database_override(Some(String::new()));
        assert_eq!(config.database_path, "querystream.db");
    }
}
