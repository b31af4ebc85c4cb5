//! Prediction-side consumers of converted battery tables.
//!
//! Trained models stay opaque behind traits. This module owns what sits
//! around them: ordering and scaling inputs, building fixed-length cycle
//! sequences, and a per-battery resource cache whose loads never race.

pub mod loader;
pub mod model;
pub mod registry;
pub mod sequence;

pub use loader::{BatteryResources, FileResourceLoader, ModelFactory, ResourceLoader};
pub use model::{
    FeaturePredictor, FeatureScaler, PredictionTarget, RowModel, SequenceModel, StandardScaler,
};
pub use registry::ResourceRegistry;
pub use sequence::prepare_sequence;

use crate::constants::PREDICTION_DECIMALS;
use crate::error::{BatteryError, Result};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

/// State-of-health estimate for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SohPrediction {
    pub battery_id: String,
    pub cycle_number: i64,
    pub predicted_soh: f64,
}

/// Estimate state of health for one cycle of `battery_id`
pub async fn predict_soh(
    registry: &ResourceRegistry,
    battery_id: &str,
    cycle_number: i64,
) -> Result<SohPrediction> {
    let resources = registry.get(battery_id).await?;

    let id = battery_id.to_string();
    let raw = task::spawn_blocking(move || {
        let sequence = prepare_sequence(
            &resources.table,
            &id,
            cycle_number,
            &resources.features,
            resources.scaler.as_ref(),
            resources.max_sequence_length,
        )?;
        resources.model.predict(&sequence)
    })
    .await
    .map_err(|e| BatteryError::Prediction {
        message: format!("prediction task failed: {}", e),
    })??;

    if !raw.is_finite() {
        return Err(BatteryError::Prediction {
            message: format!("model returned {}", raw),
        });
    }

    let predicted_soh = round_to(raw, PREDICTION_DECIMALS);
    debug!(
        "Predicted SoH {} for {} cycle {}",
        predicted_soh, battery_id, cycle_number
    );

    Ok(SohPrediction {
        battery_id: battery_id.to_string(),
        cycle_number,
        predicted_soh,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
