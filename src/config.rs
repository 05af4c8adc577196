//! Configuration management for ledgerscope
//!
//! TOML configuration with serde defaults and environment variable
//! overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// REST API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Namespace session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Reference resolution cache
    #[serde(default)]
    pub cache: CacheSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the API, including the version prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds (0 = no timeout)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Namespace session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Namespace the session is scoped to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Rows per page when the caller does not specify one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound on rows per page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Number of histogram buckets requested from the charts endpoint
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
}

/// Resolution cache configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Maximum resolved entries kept per namespace (unset = unbounded)
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "http://localhost:5000/api/v1".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_namespace() -> String {
    "default".to_string()
}
fn default_page_size() -> usize {
    25
}
fn default_max_page_size() -> usize {
    100
}
fn default_histogram_buckets() -> usize {
    24
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LEDGERSCOPE_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(ns) = std::env::var("LEDGERSCOPE_NAMESPACE") {
            self.session.namespace = ns;
        }
        if let Ok(size) = std::env::var("LEDGERSCOPE_PAGE_SIZE") {
            if let Ok(s) = size.parse() {
                self.session.default_page_size = s;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url".to_string()));
        }
        if self.session.namespace.trim().is_empty() {
            return Err(ConfigError::MissingField("session.namespace".to_string()));
        }
        if self.session.max_page_size == 0 {
            return Err(out_of_range(
                "session.max_page_size",
                self.session.max_page_size,
                1,
                usize::MAX,
            ));
        }
        if self.session.default_page_size == 0
            || self.session.default_page_size > self.session.max_page_size
        {
            return Err(out_of_range(
                "session.default_page_size",
                self.session.default_page_size,
                1,
                self.session.max_page_size,
            ));
        }
        if self.session.histogram_buckets == 0 || self.session.histogram_buckets > 1000 {
            return Err(out_of_range(
                "session.histogram_buckets",
                self.session.histogram_buckets,
                1,
                1000,
            ));
        }
        if self.cache.max_entries == Some(0) {
            return Err(out_of_range("cache.max_entries", 0, 1, usize::MAX));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })
    }
}

fn out_of_range(field: &str, value: usize, min: usize, max: usize) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.namespace, "default");
        assert_eq!(config.session.default_page_size, 25);
        assert!(config.cache.max_entries.is_none());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_above_max_rejected() {
        let mut config = Config::default();
        config.session.default_page_size = 500;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let mut config = Config::default();
        config.session.namespace = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [session]
            namespace = "ns1"

            [cache]
            max_entries = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.session.namespace, "ns1");
        assert_eq!(config.session.max_page_size, 100);
        assert_eq!(config.cache.max_entries, Some(500));
        assert_eq!(config.api.timeout_ms, 30_000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerscope.toml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.session.namespace = "payments".to_string();
        config.save_to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded.session.namespace, "payments");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/ledgerscope.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
