//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::TimeRange;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Refresh coordination
    pub refresh: RefreshConfig,

    /// Analytics computation
    pub analytics: AnalyticsConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub auto_refresh_enabled: bool,
    pub interval_seconds: u64,
    pub max_errors: usize,
    pub fetch_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub default_range_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub json_pretty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_directory: PathBuf,
    pub local_data_directory: PathBuf,
    pub export_directory: PathBuf,
    pub log_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let app_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobtrack-analytics");

        Self {
            logging: LoggingConfig {
                level: "WARN".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            refresh: RefreshConfig {
                auto_refresh_enabled: true,
                interval_seconds: 300,
                max_errors: 10,
                fetch_timeout_seconds: 30,
            },
            analytics: AnalyticsConfig {
                default_range_days: 30,
            },
            output: OutputConfig { json_pretty: true },
            paths: PathsConfig {
                data_directory: PathBuf::from("data"),
                local_data_directory: app_dir.join("local"),
                export_directory: PathBuf::from("."),
                log_directory: PathBuf::from("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("jobtrack-analytics.toml"),
            PathBuf::from(".jobtrack-analytics.toml"),
            dirs::config_dir()
                .map(|d| d.join("jobtrack-analytics").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Refresh overrides
        if let Ok(val) = env::var("JOBTRACK_AUTO_REFRESH") {
            self.refresh.auto_refresh_enabled =
                val.parse().context("Invalid JOBTRACK_AUTO_REFRESH")?;
        }
        if let Ok(val) = env::var("JOBTRACK_REFRESH_INTERVAL") {
            self.refresh.interval_seconds =
                val.parse().context("Invalid JOBTRACK_REFRESH_INTERVAL")?;
        }
        if let Ok(val) = env::var("JOBTRACK_MAX_ERRORS") {
            self.refresh.max_errors = val.parse().context("Invalid JOBTRACK_MAX_ERRORS")?;
        }
        if let Ok(val) = env::var("JOBTRACK_FETCH_TIMEOUT") {
            self.refresh.fetch_timeout_seconds =
                val.parse().context("Invalid JOBTRACK_FETCH_TIMEOUT")?;
        }

        // Analytics overrides
        if let Ok(val) = env::var("JOBTRACK_RANGE_DAYS") {
            self.analytics.default_range_days =
                val.parse().context("Invalid JOBTRACK_RANGE_DAYS")?;
        }

        // Path overrides
        if let Ok(val) = env::var("JOBTRACK_DATA_DIR") {
            self.paths.data_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("JOBTRACK_LOCAL_DIR") {
            self.paths.local_data_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("JOBTRACK_EXPORT_DIR") {
            self.paths.export_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("JOBTRACK_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.refresh.interval_seconds == 0 {
            return Err(anyhow::anyhow!("Refresh interval must be greater than 0"));
        }

        if self.refresh.interval_seconds < 10 {
            warn!(
                interval_seconds = self.refresh.interval_seconds,
                "Refresh interval is very short, every tick refetches all records"
            );
        }

        if self.refresh.max_errors == 0 {
            return Err(anyhow::anyhow!("max_errors must be greater than 0"));
        }

        if TimeRange::from_days(self.analytics.default_range_days).is_none() {
            return Err(anyhow::anyhow!(
                "default_range_days must be one of 7, 30, 90 or 365, got {}",
                self.analytics.default_range_days
            ));
        }

        Ok(())
    }

    /// Create the log directory when file logging is requested
    pub fn ensure_log_directory(&self) -> Result<()> {
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance, falling back to defaults when the
/// configured sources are invalid
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            eprintln!("Invalid configuration, using defaults: {:#}", e);
            Config::default()
        })
    })
}
