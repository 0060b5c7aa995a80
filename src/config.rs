//! Pipeline configuration
//!
//! Every component receives its directories and split settings through
//! [`PipelineConfig`]; nothing is read from the process environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Configuration shared by the loader, preprocessor and trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory where fitted model artifacts are written
    pub models_dir: PathBuf,

    /// Directory holding pre-existing datasets
    pub data_dir: PathBuf,

    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Seed for the train/test shuffle and for seeded classifiers
    pub random_state: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("trained_models"),
            data_dir: PathBuf::from("data"),
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            TrainerError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the models directory
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Builder method to set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainerError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.models_dir.as_os_str().is_empty() {
            return Err(TrainerError::Config("models_dir is empty".to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(TrainerError::Config("data_dir is empty".to_string()));
        }
        Ok(())
    }
}
