//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/obratrack/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/obratrack/` (~/.config/obratrack/)
//! - Data: `$XDG_DATA_HOME/obratrack/` (~/.local/share/obratrack/)
//! - State/Logs: `$XDG_STATE_HOME/obratrack/` (~/.local/state/obratrack/)

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
    /// Report engine configuration
    #[serde(default)]
    pub report: ReportConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Report engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Maximum depth below the obra that the tree materializer follows.
    /// Deeper levels are left out of every count.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Upper bound for a single report generation in milliseconds
    #[serde(default = "default_report_timeout")]
    pub timeout_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            timeout_ms: default_report_timeout(),
        }
    }
}

fn default_max_depth() -> u32 {
    20
}

fn default_report_timeout() -> u64 {
    30000
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override path for the SQLite database file
    pub path: Option<PathBuf>,
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
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
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

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.report.max_depth == 0 {
            return Err(Error::Config(
                "report.max_depth must be at least 1".to_string(),
            ));
        }
        if self.report.timeout_ms == 0 {
            return Err(Error::Config(
                "report.timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path, honoring the `[database] path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/obratrack/config.toml` (~/.config/obratrack/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("obratrack").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/obratrack/` (~/.local/share/obratrack/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("obratrack")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/obratrack/` (~/.local/state/obratrack/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("obratrack")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/obratrack/data.db` (~/.local/share/obratrack/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/obratrack/obratrack.log` (~/.local/state/obratrack/obratrack.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("obratrack.log")
    }
}
