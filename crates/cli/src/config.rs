//! Binary configuration
//!
//! Optional JSON file, then environment overrides. Guard secrets never live
//! here: they come from the environment only (see `GuardConfig::from_env`).

use anyhow::Context;
use ledgerseal_service::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_DATABASE_URL: &str = "LEDGERSEAL_DATABASE_URL";
pub const ENV_LOG_LEVEL: &str = "LEDGERSEAL_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub service: ServiceConfig,
}

fn default_database_url() -> String {
    "sqlite://ledgerseal.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_level: default_log_level(),
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional file, then apply process environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply overrides from a key lookup (blank values are ignored)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = present(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(level) = present(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_url, "sqlite://ledgerseal.db");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledgerseal.json");
        std::fs::write(
            &path,
            r#"{"database_url": "sqlite://from-file.db", "service": {"lock_timeout_ms": 500}}"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.database_url, "sqlite://from-file.db");
        assert_eq!(config.service.lock_timeout_ms, 500);
        assert_eq!(config.service.max_write_retries, 3);

        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite://from-env.db"),
            (ENV_LOG_LEVEL, "  "),
        ]
        .into_iter()
        .collect();
        let config = config.with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url, "sqlite://from-env.db");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
        assert!(AppConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
