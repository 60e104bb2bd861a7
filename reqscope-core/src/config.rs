//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/reqscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/reqscope/` (~/.config/reqscope/)
//! - Data: `$XDG_DATA_HOME/reqscope/` (~/.local/share/reqscope/)
//! - State/Logs: `$XDG_STATE_HOME/reqscope/` (~/.local/state/reqscope/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Request capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Retention settings for the cleanup job
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (defaults to the XDG data dir)
    pub path: Option<PathBuf>,
}

/// Request capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Enable/disable the capture middleware
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path prefixes that are never recorded
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,

    /// Largest request body the interceptor will buffer to measure its size.
    /// Response bodies are always measured in full.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude_paths: default_exclude_paths(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl CaptureConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(Error::Config(
                "capture.max_body_bytes must be greater than 0".to_string(),
            ));
        }
        if self.exclude_paths.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(
                "capture.exclude_paths must not contain an empty prefix".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_exclude_paths() -> Vec<String> {
    ["/docs", "/redoc", "/openapi.json", "/favicon.ico", "/static", "/health"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

/// Retention configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Events older than this many days are removed by cleanup
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Also write human-readable logs to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stdout: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        if self.retention.days == 0 {
            return Err(Error::Config(
                "retention.days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path: the configured override, or the XDG default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/reqscope/config.toml` (~/.config/reqscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("reqscope").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/reqscope/` (~/.local/share/reqscope/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("reqscope")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/reqscope/` (~/.local/state/reqscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("reqscope")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/reqscope/data.db` (~/.local/share/reqscope/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file prefix path; the appender adds a date suffix
    ///
    /// `$XDG_STATE_HOME/reqscope/reqscope.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("reqscope.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert!(config.capture.enabled);
        assert_eq!(config.capture.max_body_bytes, 64 * 1024 * 1024);
        assert!(config.capture.exclude_paths.contains(&"/health".to_string()));
        assert_eq!(config.retention.days, 90);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind = "127.0.0.1:9000"

[database]
path = "/tmp/reqscope-test.db"

[capture]
exclude_paths = ["/internal"]
max_body_bytes = 4096

[retention]
days = 30

[logging]
level = "debug"
stdout = false
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/reqscope-test.db")
        );
        assert_eq!(config.capture.exclude_paths, vec!["/internal".to_string()]);
        assert_eq!(config.capture.max_body_bytes, 4096);
        assert!(config.capture.enabled);
        assert_eq!(config.retention.days, 30);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.stdout);
    }

    #[test]
    fn test_capture_config_validation() {
        assert!(CaptureConfig::default().validate().is_ok());

        let config = CaptureConfig {
            max_body_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfig {
            exclude_paths: vec![String::new()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_zero_retention() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retention]\ndays = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind = ").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
