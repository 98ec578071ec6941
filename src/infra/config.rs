//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! A path that cannot be read or parsed falls back to built-in defaults.

use crate::services::billing::{DEFAULT_UNIT_FEE, DEFAULT_UNIT_MINUTES};
use crate::services::slot_resolver::DEFAULT_GRID_PX;
use crate::services::timeseries::DEFAULT_WINDOW;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable consulted when `--config` is not given
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier used in logs
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "parking".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsConfig {
    /// Quantization cell for slot identity (pixels)
    #[serde(default = "default_grid_px")]
    pub grid_px: u32,
}

impl Default for SlotsConfig {
    fn default() -> Self {
        Self { grid_px: default_grid_px() }
    }
}

fn default_grid_px() -> u32 {
    DEFAULT_GRID_PX
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Length of one billing unit (minutes)
    #[serde(default = "default_unit_minutes")]
    pub unit_minutes: f64,
    /// Price of one billing unit
    #[serde(default = "default_unit_fee")]
    pub unit_fee: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self { unit_minutes: default_unit_minutes(), unit_fee: default_unit_fee() }
    }
}

fn default_unit_minutes() -> f64 {
    DEFAULT_UNIT_MINUTES
}

fn default_unit_fee() -> u64 {
    DEFAULT_UNIT_FEE
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSeriesConfig {
    /// Number of samples kept for the live chart
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self { window: default_window() }
    }
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// JSONL file of detector frames
    #[serde(default = "default_source_file")]
    pub file: String,
    /// Pacing between frames (ms)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { file: default_source_file(), frame_interval_ms: default_frame_interval_ms() }
    }
}

fn default_source_file() -> String {
    "frames.jsonl".to_string()
}

fn default_frame_interval_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// File path for session export (JSONL format)
    #[serde(default = "default_export_file")]
    pub file: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { file: default_export_file() }
    }
}

fn default_export_file() -> String {
    "sessions.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub slots: SlotsConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub timeseries: TimeSeriesConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    grid_px: u32,
    unit_minutes: f64,
    unit_fee: u64,
    timeseries_window: usize,
    source_file: String,
    frame_interval_ms: u64,
    export_file: String,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            site_id: toml_config.site.id,
            grid_px: toml_config.slots.grid_px,
            unit_minutes: toml_config.billing.unit_minutes,
            unit_fee: toml_config.billing.unit_fee,
            timeseries_window: toml_config.timeseries.window,
            source_file: toml_config.source.file,
            frame_interval_ms: toml_config.source.frame_interval_ms,
            export_file: toml_config.export.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path: `--config`, then `CONFIG_FILE`, then the dev default
    pub fn resolve_config_path(arg: Option<&str>) -> String {
        Self::select_config_path(arg, env::var(CONFIG_FILE_ENV).ok())
    }

    fn select_config_path(arg: Option<&str>, env_path: Option<String>) -> String {
        arg.map(str::to_string)
            .or(env_path.filter(|path| !path.is_empty()))
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Override the frame source file (e.g. from the command line)
    pub fn with_source_file(mut self, file: &str) -> Self {
        self.source_file = file.to_string();
        self
    }

    /// Override the export file (e.g. from the command line)
    pub fn with_export_file(mut self, file: &str) -> Self {
        self.export_file = file.to_string();
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn grid_px(&self) -> u32 {
        self.grid_px
    }

    pub fn unit_minutes(&self) -> f64 {
        self.unit_minutes
    }

    pub fn unit_fee(&self) -> u64 {
        self.unit_fee
    }

    pub fn timeseries_window(&self) -> usize {
        self.timeseries_window
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    pub fn export_file(&self) -> &str {
        &self.export_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to change the tariff
    #[cfg(test)]
    pub fn with_tariff(mut self, unit_minutes: f64, unit_fee: u64) -> Self {
        self.unit_minutes = unit_minutes;
        self.unit_fee = unit_fee;
        self
    }
}
