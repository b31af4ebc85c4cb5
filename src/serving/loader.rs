//! Loading of per-battery prediction resources.

use super::model::{FeatureScaler, SequenceModel, StandardScaler};
use crate::config::ServingConfig;
use crate::constants::DEFAULT_SMOOTHING_WINDOW;
use crate::error::{BatteryError, Result};
use crate::smoothing::{add_smoothed_columns, has_smoothed_columns};
use polars::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to score cycles of one battery, loaded together
#[derive(Debug, Clone)]
pub struct BatteryResources {
    pub model: Arc<dyn SequenceModel>,
    pub scaler: Arc<dyn FeatureScaler>,
    pub table: DataFrame,
    pub features: Vec<String>,
    pub max_sequence_length: usize,
}

/// Blocking loader for one battery's resources
pub trait ResourceLoader: Send + Sync + 'static {
    fn load(&self, battery_id: &str) -> Result<BatteryResources>;
}

/// Builds a model from its artifact path
pub type ModelFactory = Box<dyn Fn(&Path) -> Result<Box<dyn SequenceModel>> + Send + Sync>;

/// Loads model, scaler and table from the configured directories
pub struct FileResourceLoader {
    config: ServingConfig,
    smoothing_window: usize,
    model_factory: ModelFactory,
}

impl fmt::Debug for FileResourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileResourceLoader")
            .field("config", &self.config)
            .field("smoothing_window", &self.smoothing_window)
            .finish_non_exhaustive()
    }
}

impl FileResourceLoader {
    pub fn new(config: ServingConfig, model_factory: ModelFactory) -> Self {
        Self {
            config,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            model_factory,
        }
    }

    pub fn with_smoothing_window(mut self, window: usize) -> Self {
        self.smoothing_window = window;
        self
    }

    fn load_table(&self, path: &Path) -> Result<DataFrame> {
        require_file(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        if has_smoothed_columns(&df) {
            Ok(df)
        } else {
            debug!("Adding smoothed columns to {}", path.display());
            add_smoothed_columns(&df, self.smoothing_window)
        }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load(&self, battery_id: &str) -> Result<BatteryResources> {
        self.config.validate()?;
        let max_sequence_length = self.config.max_sequence_length(battery_id)?;

        let model_path = self.config.model_path(battery_id);
        let scaler_path = self.config.scaler_path(battery_id);
        let table_path = self.config.table_path(battery_id);
        require_file(&model_path)?;
        require_file(&scaler_path)?;
        require_file(&table_path)?;

        let model = (self.model_factory)(&model_path)?;
        let scaler = StandardScaler::from_file(&scaler_path)?;
        if scaler.n_features() != self.config.sequence_features.len() {
            return Err(BatteryError::Configuration {
                message: format!(
                    "scaler for {} has {} features, {} configured",
                    battery_id,
                    scaler.n_features(),
                    self.config.sequence_features.len()
                ),
            });
        }
        let table = self.load_table(&table_path)?;

        info!(
            "Loaded resources for {} ({} table rows)",
            battery_id,
            table.height()
        );

        Ok(BatteryResources {
            model: Arc::from(model),
            scaler: Arc::new(scaler),
            table,
            features: self.config.sequence_features.clone(),
            max_sequence_length,
        })
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BatteryError::FileAccess {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        })
    }
}
