//! Configuration for the daltek server
//!
//! Loads configuration from:
//! 1. config.yaml - listen address, pipeline limits, logging, saved queries
//! 2. .env file - loaded into the environment by `main`
//!
//! Environment variables always override config.yaml values.

use daltek_ir::SavedQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    InvalidEnvVar { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Limits applied by the transform pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Row limit for preview requests
    pub preview_limit: usize,

    /// Down-sample long chart series before rendering
    pub optimize_large_series: bool,

    /// Series longer than this are sampled
    pub sample_threshold: usize,

    /// Approximate point count after sampling
    pub sample_target: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_limit: 100,
            optimize_large_series: true,
            sample_threshold: 1000,
            sample_target: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    /// Queries served by `/api/query/saved/:id/execute`
    pub saved_queries: Vec<SavedQuery>,
    /// In-memory tables, keyed by name, that saved queries read from
    /// when no database is attached
    pub datasets: BTreeMap<String, Vec<Value>>,
}

impl Config {
    /// Load configuration from a YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file means defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DALTEK_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DALTEK_SERVER_PORT") {
            self.server.port = parse_var("DALTEK_SERVER_PORT", port)?;
        }
        if let Some(limit) = lookup("DALTEK_PREVIEW_LIMIT") {
            self.pipeline.preview_limit = parse_var("DALTEK_PREVIEW_LIMIT", limit)?;
        }
        if let Some(flag) = lookup("DALTEK_OPTIMIZE_LARGE_SERIES") {
            self.pipeline.optimize_large_series = parse_var("DALTEK_OPTIMIZE_LARGE_SERIES", flag)?;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar { var, value })
}
