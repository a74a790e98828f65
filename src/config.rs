//! Configuration management for the seismic risk pipeline

use crate::error::ConfigError;
use crate::types::alert::RiskThresholds;
use crate::types::event::TimeWindow;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `QUAKE_WATCH__DETECTION__MAGNITUDE_THRESHOLD`
pub const ENV_PREFIX: &str = "QUAKE_WATCH";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub models: ModelsConfig,
    pub detection: RiskThresholds,
    pub alerts: AlertConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Upstream feed configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Which feed window to fetch
    pub window: TimeWindow,
    /// Optional case-insensitive place filter
    pub region_filter: Option<String>,
    /// Feed URL per window
    pub urls: FeedUrls,
    /// Local GeoJSON file read instead of the remote feed
    pub source_path: Option<String>,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedUrls {
    pub day: String,
    pub week: String,
    pub month: String,
}

impl FeedUrls {
    pub fn for_window(&self, window: TimeWindow) -> &str {
        match window {
            TimeWindow::Last24Hours => &self.day,
            TimeWindow::Last7Days => &self.week,
            TimeWindow::Last30Days => &self.month,
        }
    }
}

impl Default for FeedUrls {
    fn default() -> Self {
        const BASE: &str = "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary";
        Self {
            day: format!("{BASE}/2.5_day.geojson"),
            week: format!("{BASE}/2.5_week.geojson"),
            month: format!("{BASE}/2.5_month.geojson"),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window: TimeWindow::default(),
            region_filter: None,
            urls: FeedUrls::default(),
            source_path: None,
            timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Path of the tar.gz model artifact
    pub artifact_path: String,
    /// Where to download the artifact from when it is missing locally
    pub artifact_url: Option<String>,
    /// Number of threads for ONNX inference per model (default: 1)
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifact_path: "models/earthquake_models.tar.gz".to_string(),
            artifact_url: None,
            onnx_threads: 1,
        }
    }
}

/// Webhook alert configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Send a webhook notification for every high-risk event
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// CSV export configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "exports".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, layered with environment
    /// overrides. A missing file falls back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check run-scoped settings against their allowed ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.detection;
        if !RiskThresholds::MAGNITUDE_RANGE.contains(&t.magnitude_threshold) {
            return Err(ConfigError::Invalid(format!(
                "magnitude_threshold {} outside 3.0-8.0",
                t.magnitude_threshold
            )));
        }
        if !RiskThresholds::AFTERSHOCK_RANGE.contains(&t.aftershock_threshold) {
            return Err(ConfigError::Invalid(format!(
                "aftershock_threshold {} outside 0.0-1.0",
                t.aftershock_threshold
            )));
        }
        if self.models.onnx_threads == 0 {
            return Err(ConfigError::Invalid("onnx_threads must be at least 1".to_string()));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::Invalid(format!(
                "unknown log format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// The region filter, ignoring blank values
    pub fn region_filter(&self) -> Option<&str> {
        self.feed
            .region_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}
