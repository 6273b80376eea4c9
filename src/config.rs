//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::indexer::{IndexConfig, RankingStrategy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query log ingestion
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Records being indexed at the same time
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("hn_logs.tsv")
}

fn default_max_in_flight() -> usize {
    4096
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Per-bucket ranked index settings
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 0 waits forever
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub strategy: RankingStrategy,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
            strategy: RankingStrategy::default(),
        }
    }
}

impl IndexSettings {
    pub fn to_index_config(&self) -> IndexConfig {
        IndexConfig {
            queue_capacity: self.queue_capacity,
            request_timeout: match self.request_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            strategy: self.strategy,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Monitoring websocket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_progress_interval() -> u64 {
    100
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> LoadedConfig {
        let mut config = Config::default();
        let warnings = config.apply_env_overrides();
        LoadedConfig {
            config,
            source: None,
            warnings,
        }
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let mut config = Self::load(path)?;
        let warnings = config.apply_env_overrides();
        Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
            warnings,
        })
    }

    /// Load from default locations or environment
    ///
    /// Files that exist but fail to load are skipped and reported in
    /// [`LoadedConfig::warnings`].
    pub fn load_default() -> LoadedConfig {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("querylens").join("config.toml")),
            Some(PathBuf::from("/etc/querylens/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        Self::load_first(config_paths.iter().flatten(), |key| std::env::var(key).ok())
    }

    /// First existing path that loads wins; failures before it become warnings
    fn load_first<'a>(
        paths: impl IntoIterator<Item = &'a PathBuf>,
        var: impl Fn(&str) -> Option<String>,
    ) -> LoadedConfig {
        let mut warnings = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(mut config) => {
                    warnings.extend(config.apply_overrides(&var));
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        warnings,
                    };
                }
                Err(e) => warnings.push(e),
            }
        }

        let mut config = Config::default();
        warnings.extend(config.apply_overrides(&var));
        LoadedConfig {
            config,
            source: None,
            warnings,
        }
    }

    fn apply_env_overrides(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `QUERYLENS_*` overrides; values that don't parse are returned
    /// and leave the setting untouched
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut rejected = Vec::new();

        if let Some(path) = var("QUERYLENS_LOG_PATH") {
            self.ingest.log_path = PathBuf::from(path);
        }
        if let Some(n) = var("QUERYLENS_MAX_IN_FLIGHT") {
            match n.parse() {
                Ok(n) => self.ingest.max_in_flight = n,
                Err(e) => rejected.push(ConfigError::env("QUERYLENS_MAX_IN_FLIGHT", n, e)),
            }
        }

        if let Some(strategy) = var("QUERYLENS_INDEX_STRATEGY") {
            match strategy.parse() {
                Ok(s) => self.index.strategy = s,
                Err(e) => rejected.push(ConfigError::env("QUERYLENS_INDEX_STRATEGY", strategy, e)),
            }
        }

        if let Some(host) = var("QUERYLENS_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("QUERYLENS_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(e) => rejected.push(ConfigError::env("QUERYLENS_API_PORT", port, e)),
            }
        }

        if let Some(level) = var("QUERYLENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("QUERYLENS_LOG_FORMAT") {
            self.logging.format = format;
        }

        rejected
    }
}

/// A loaded configuration and what was skipped on the way
///
/// Loading happens before the tracing subscriber exists, so problems are
/// carried back to the caller to log once it does.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the settings came from, `None` for defaults
    pub source: Option<PathBuf>,
    /// Config files that failed to load and ignored environment overrides
    pub warnings: Vec<ConfigError>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Ignoring {var}={value:?}: {error}")]
    Env {
        var: &'static str,
        value: String,
        error: String,
    },
}

impl ConfigError {
    fn env(var: &'static str, value: String, error: impl std::fmt::Display) -> Self {
        ConfigError::Env {
            var,
            value,
            error: error.to_string(),
        }
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Querylens Configuration
#
# Environment variables override these settings:
# - QUERYLENS_LOG_PATH
# - QUERYLENS_MAX_IN_FLIGHT
# - QUERYLENS_INDEX_STRATEGY
# - QUERYLENS_API_HOST
# - QUERYLENS_API_PORT
# - QUERYLENS_LOG_LEVEL
# - QUERYLENS_LOG_FORMAT

[ingest]
# Tab-separated query log: "<YYYY-MM-DD HH:MM:SS>\t<query>"
log_path = "hn_logs.tsv"

# Records indexed concurrently
max_in_flight = 4096

[index]
# Pending writes per bucket before callers wait
queue_capacity = 1024

# Longest wait on a bucket before giving up (ms, 0 = forever)
request_timeout_ms = 30000

# Ranking structure: incremental or deferred_sort
strategy = "incremental"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 5000

# Allowed CORS origins (empty allows any)
cors_origins = []

[websocket]
# Maximum monitoring connections
max_connections = 1000

# How often ingestion progress is pushed (ms)
progress_interval_ms = 100

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ingest.log_path, PathBuf::from("hn_logs.tsv"));
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.index.strategy, RankingStrategy::Incremental);

        let index = config.index.to_index_config();
        assert_eq!(index.queue_capacity, 1024);
        assert_eq!(index.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.ingest.log_path, defaults.ingest.log_path);
        assert_eq!(config.ingest.max_in_flight, defaults.ingest.max_in_flight);
        assert_eq!(config.index.queue_capacity, defaults.index.queue_capacity);
        assert_eq!(config.index.request_timeout_ms, defaults.index.request_timeout_ms);
        assert_eq!(config.index.strategy, defaults.index.strategy);
        assert_eq!(config.api.host, defaults.api.host);
        assert_eq!(config.api.port, defaults.api.port);
        assert_eq!(
            config.websocket.progress_interval_ms,
            defaults.websocket.progress_interval_ms
        );
        assert_eq!(config.logging.format, defaults.logging.format);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[index]\nstrategy = \"deferred_sort\"\nrequest_timeout_ms = 0\n\n[api]\nport = 8080"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.index.strategy, RankingStrategy::DeferredSort);
        assert_eq!(config.index.to_index_config().request_timeout, None);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.ingest.max_in_flight, 4096);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/querylens.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = \"not a number\"").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("QUERYLENS_LOG_PATH", "/data/queries.tsv"),
            ("QUERYLENS_API_PORT", "9000"),
            ("QUERYLENS_MAX_IN_FLIGHT", "many"),
            ("QUERYLENS_INDEX_STRATEGY", "deferred_sort"),
            ("QUERYLENS_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let rejected = config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ingest.log_path, PathBuf::from("/data/queries.tsv"));
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.ingest.max_in_flight, 4096);
        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            &rejected[0],
            ConfigError::Env { var: "QUERYLENS_MAX_IN_FLIGHT", value, .. } if value == "many"
        ));
        assert_eq!(config.index.strategy, RankingStrategy::DeferredSort);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_strategy_override_is_reported() {
        let mut config = Config::default();
        let rejected = config.apply_overrides(|key| {
            (key == "QUERYLENS_INDEX_STRATEGY").then(|| "fastest".to_string())
        });

        assert_eq!(config.index.strategy, RankingStrategy::Incremental);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].to_string().contains("QUERYLENS_INDEX_STRATEGY"));
    }

    #[test]
    fn test_bad_default_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let missing = dir.path().join("missing.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[api\nport = 8080").unwrap();
        std::fs::write(&good, "[api]\nport = 7000").unwrap();

        let loaded = Config::load_first([&missing, &broken, &good], |_| None);

        assert_eq!(loaded.config.api.port, 7000);
        assert_eq!(loaded.source.as_deref(), Some(good.as_path()));
        assert_eq!(loaded.warnings.len(), 1);
        assert!(matches!(
            &loaded.warnings[0],
            ConfigError::Parse { path, .. } if *path == broken
        ));
    }

    #[test]
    fn test_bad_default_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("config.toml");
        std::fs::write(&broken, "[ingest]\nmax_in_flight = \"lots\"").unwrap();

        let loaded = Config::load_first([&broken], |key| {
            (key == "QUERYLENS_API_PORT").then(|| "9100".to_string())
        });

        assert_eq!(loaded.source, None);
        assert_eq!(loaded.config.api.port, 9100);
        assert_eq!(loaded.config.ingest.max_in_flight, 4096);
        assert!(matches!(&loaded.warnings[..], [ConfigError::Parse { .. }]));
    }
}
