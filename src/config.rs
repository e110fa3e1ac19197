//! Configuration for the analyte quality pipeline.

use crate::core::windowing::DEFAULT_BASELINE_WINDOW;
use crate::error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder of trial `.csv` files
    pub samples_path: PathBuf,

    /// Root of the per-analyte reference profiles
    pub analytics_path: PathBuf,

    /// Folder of the dated quality reports
    pub quality_results_path: PathBuf,

    /// Folder of the dated schema reports
    pub schema_results_path: PathBuf,

    /// Folder of the dated pipeline logs
    pub logs_path: PathBuf,

    /// Span of the pre-exposure baseline window
    #[serde(with = "duration_serde")]
    pub baseline_window: Duration,

    /// Whether schema validation writes its report file
    pub write_schema_report: bool,

    /// Log filter used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let root = PathBuf::from(".");
        Self {
            samples_path: root.join("input_files"),
            analytics_path: root.join("statistical_analysis"),
            quality_results_path: root.join("quality_results"),
            schema_results_path: root.join("schema_validate"),
            logs_path: root.join("logs"),
            baseline_window: DEFAULT_BASELINE_WINDOW,
            write_schema_report: true,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("analyte-quality")
            .join("config.json")
    }

    /// Create the output folders. The samples folder is never created.
    pub fn ensure_output_directories(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.analytics_path,
            &self.quality_results_path,
            &self.schema_results_path,
            &self.logs_path,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Fail with `InputPath` when the samples folder does not exist.
    pub fn validate_input_paths(&self) -> error::Result<()> {
        if !self.samples_path.is_dir() {
            return Err(error::Error::InputPath {
                path: self.samples_path.clone(),
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
