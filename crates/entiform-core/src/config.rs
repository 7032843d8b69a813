//! Configuration schema (entiform.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// JSON Schema dialect stamped on every derived schema
pub const JSON_SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "entiform.toml";

/// Default location of the persisted entity output
pub const DEFAULT_OUTPUT_PATH: &str = "output/entities.json";

fn default_workers() -> usize {
    10
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Worker count used when the caller asks for 0
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Tick of the live progress line
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Render the live progress line on stderr
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Where processed entities are written
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Persist output even when the run is failing
    #[serde(default)]
    pub write_output_on_failure: bool,

    /// Directory the config was loaded from
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            progress_interval_ms: default_progress_interval_ms(),
            show_progress: true,
            output: None,
            write_output_on_failure: false,
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("'workers' must be at least 1".to_string()));
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "'progress_interval_ms' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Output path, resolved against the project root when relative
    pub fn output_path(&self) -> PathBuf {
        let path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));
        if path.is_relative() {
            self.project_root.join(path)
        } else {
            path
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
