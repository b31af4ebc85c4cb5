//! Configuration management and validation.
//!
//! Settings are layered: built-in defaults, then an optional JSON file,
//! then command-line overrides applied by the binary.

use crate::constants::*;
use crate::error::{BatteryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Instrument field names for each measurement
///
/// Different rig firmware revisions have spelled these differently, so
/// they are configurable rather than hard-coded in the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub voltage_measured: String,
    pub current_measured: String,
    pub temperature_measured: String,
    pub time: String,
    pub current_charge: String,
    pub voltage_charge: String,
    pub current_load: String,
    pub voltage_load: String,
    pub capacity: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            voltage_measured: FIELD_VOLTAGE_MEASURED.to_string(),
            current_measured: FIELD_CURRENT_MEASURED.to_string(),
            temperature_measured: FIELD_TEMPERATURE_MEASURED.to_string(),
            time: FIELD_TIME.to_string(),
            current_charge: FIELD_CURRENT_CHARGE.to_string(),
            voltage_charge: FIELD_VOLTAGE_CHARGE.to_string(),
            current_load: FIELD_CURRENT_LOAD.to_string(),
            voltage_load: FIELD_VOLTAGE_LOAD.to_string(),
            capacity: FIELD_CAPACITY.to_string(),
        }
    }
}

/// Moving-average smoothing of the measured signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Add `*_smooth` columns to converted tables
    pub enabled: bool,

    /// Centered window width in samples (odd)
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: DEFAULT_SMOOTHING_WINDOW,
        }
    }
}

/// Where the prediction side finds its per-battery artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub model_dir: PathBuf,
    pub data_dir: PathBuf,

    /// Table file name; `{battery_id}` is substituted
    pub table_file_pattern: String,

    /// Scaler file name; `{battery_id}` is substituted
    pub scaler_file_pattern: String,

    /// Model file name; `{battery_id}` is substituted
    pub model_file_pattern: String,

    /// Ordered model input columns
    pub sequence_features: Vec<String>,

    /// Padded sequence length per battery
    pub max_sequence_lengths: BTreeMap<String, usize>,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            data_dir: PathBuf::from("data/processed_data"),
            table_file_pattern: "optimized_nasa_battery_data_{battery_id}_preprocessed.csv"
                .to_string(),
            scaler_file_pattern: "scaler_lstm_{battery_id}_soh.json".to_string(),
            model_file_pattern: "lstm_final_{battery_id}_soh.keras".to_string(),
            sequence_features: DEFAULT_SEQUENCE_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_sequence_lengths: DEFAULT_MAX_SEQUENCE_LENGTHS
                .iter()
                .map(|(id, len)| (id.to_string(), *len))
                .collect(),
        }
    }
}

impl ServingConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BatteryError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServingConfig = serde_json::from_str(&text)?;
        debug!("Loaded serving configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_features.is_empty() {
            return Err(BatteryError::Configuration {
                message: "sequence_features must name at least one column".to_string(),
            });
        }
        Ok(())
    }

    pub fn table_path(&self, battery_id: &str) -> PathBuf {
        self.data_dir
            .join(self.table_file_pattern.replace("{battery_id}", battery_id))
    }

    pub fn scaler_path(&self, battery_id: &str) -> PathBuf {
        self.model_dir
            .join(self.scaler_file_pattern.replace("{battery_id}", battery_id))
    }

    pub fn model_path(&self, battery_id: &str) -> PathBuf {
        self.model_dir
            .join(self.model_file_pattern.replace("{battery_id}", battery_id))
    }

    pub fn max_sequence_length(&self, battery_id: &str) -> Result<usize> {
        self.max_sequence_lengths
            .get(battery_id)
            .copied()
            .ok_or_else(|| BatteryError::Configuration {
                message: format!("Max sequence length not configured for {}", battery_id),
            })
    }
}

/// Global configuration for battery record processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum files parsed at the same time
    pub max_concurrent_files: usize,

    /// Parse and report only, write nothing
    pub inspect_only: bool,

    pub smoothing: SmoothingConfig,

    pub field_names: FieldNames,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: num_cpus::get().clamp(1, 8),
            inspect_only: false,
            smoothing: SmoothingConfig::default(),
            field_names: FieldNames::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BatteryError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProcessorConfig = serde_json::from_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Set maximum concurrent files
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    /// Enable inspect-only mode
    pub fn with_inspect_only(mut self) -> Self {
        self.inspect_only = true;
        self
    }

    /// Enable smoothing with the given window
    pub fn with_smoothing(mut self, window: usize) -> Self {
        self.smoothing = SmoothingConfig {
            enabled: true,
            window,
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(BatteryError::Configuration {
                message: "max_concurrent_files must be at least 1".to_string(),
            });
        }
        if self.smoothing.window == 0 || self.smoothing.window % 2 == 0 {
            return Err(BatteryError::Configuration {
                message: format!(
                    "smoothing window must be a positive odd number, got {}",
                    self.smoothing.window
                ),
            });
        }
        Ok(())
    }
}
