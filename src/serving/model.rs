//! Opaque prediction models and feature scaling.
//!
//! Trained models live outside this crate. They are reached through the
//! [`SequenceModel`] and [`RowModel`] traits so that any runtime (an ONNX
//! session, a remote call, a test double) can sit behind them.

use crate::constants::{SOC_MAX, SOC_MIN};
use crate::error::{BatteryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A model scoring one padded, scaled sequence of feature rows
pub trait SequenceModel: Send + Sync + fmt::Debug {
    fn predict(&self, sequence: &[Vec<f32>]) -> Result<f64>;
}

/// A model scoring one ordered feature vector
pub trait RowModel: Send + Sync + fmt::Debug {
    fn predict_row(&self, features: &[f64]) -> Result<f64>;
}

/// Column-wise feature scaling fitted at training time
pub trait FeatureScaler: Send + Sync + fmt::Debug {
    fn n_features(&self) -> usize;

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// Standardization `(x - mean) / scale`, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(BatteryError::Configuration {
                message: format!(
                    "scaler has {} means but {} scales",
                    mean.len(),
                    scale.len()
                ),
            });
        }
        Ok(Self { mean, scale })
    }

    /// Scaler that leaves `n` columns unchanged
    pub fn identity(n: usize) -> Self {
        Self {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    /// Fit column means and population standard deviations.
    ///
    /// Zero-variance columns get a scale of 1.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(BatteryError::Configuration {
                message: "cannot fit a scaler on zero rows".to_string(),
            });
        };
        let n = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(BatteryError::Configuration {
                message: format!("ragged rows: expected {} columns, got {}", n, bad.len()),
            });
        }

        let count = rows.len() as f64;
        let mean: Vec<f64> = (0..n)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / count)
            .collect();
        let scale = (0..n)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / count;
                let std = var.sqrt();
                if std == 0.0 { 1.0 } else { std }
            })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BatteryError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let scaler: StandardScaler = serde_json::from_str(&text)?;
        let scaler = Self::new(scaler.mean, scaler.scale)?;
        debug!(
            "Loaded {}-feature scaler from {}",
            scaler.n_features(),
            path.display()
        );
        Ok(scaler)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features() {
                    return Err(BatteryError::Prediction {
                        message: format!(
                            "scaler expects {} features, got {}",
                            self.n_features(),
                            row.len()
                        ),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| (x - m) / s)
                    .collect())
            })
            .collect()
    }
}

/// Quantity a [`FeaturePredictor`] estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionTarget {
    StateOfHealth,
    /// Clamped to 0..=100 percent
    StateOfCharge,
}

/// A row model paired with the feature order it was trained on
#[derive(Debug)]
pub struct FeaturePredictor {
    model: Box<dyn RowModel>,
    features: Vec<String>,
    target: PredictionTarget,
}

impl FeaturePredictor {
    pub fn new(model: Box<dyn RowModel>, features: Vec<String>, target: PredictionTarget) -> Self {
        Self {
            model,
            features,
            target,
        }
    }

    /// Pair `model` with the ordered feature list stored as a JSON array
    pub fn load(
        model: Box<dyn RowModel>,
        features_path: &Path,
        target: PredictionTarget,
    ) -> Result<Self> {
        let text =
            std::fs::read_to_string(features_path).map_err(|source| BatteryError::FileAccess {
                path: features_path.to_path_buf(),
                source,
            })?;
        let features: Vec<String> = serde_json::from_str(&text)?;
        debug!(
            "Loaded {} model features from {}",
            features.len(),
            features_path.display()
        );
        Ok(Self::new(model, features, target))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> PredictionTarget {
        self.target
    }

    /// Order `inputs` by the trained feature list and predict
    pub fn predict(&self, inputs: &HashMap<String, f64>) -> Result<f64> {
        let missing: Vec<&str> = self
            .features
            .iter()
            .filter(|f| !inputs.contains_key(*f))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(BatteryError::Prediction {
                message: format!("missing input features [{}]", missing.join(", ")),
            });
        }

        let ordered: Vec<f64> = self
            .features
            .iter()
            .filter_map(|f| inputs.get(f).copied())
            .collect();
        let value = self.model.predict_row(&ordered)?;

        Ok(match self.target {
            PredictionTarget::StateOfHealth => value,
            PredictionTarget::StateOfCharge => value.clamp(SOC_MIN, SOC_MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Weighted sum of the inputs
    #[derive(Debug)]
    struct LinearModel(Vec<f64>);

    impl RowModel for LinearModel {
        fn predict_row(&self, features: &[f64]) -> Result<f64> {
            Ok(features.iter().zip(&self.0).map(|(x, w)| x * w).sum())
        }
    }

    fn inputs(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler::new(vec![1.0, 10.0], vec![2.0, 5.0]).unwrap();

        let scaled = scaler.transform(&[vec![3.0, 20.0], vec![1.0, 0.0]]).unwrap();

        assert_eq!(scaled, vec![vec![1.0, 2.0], vec![0.0, -2.0]]);
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::identity(4);
        assert!(matches!(
            scaler.transform(&[vec![1.0, 2.0]]),
            Err(BatteryError::Prediction { .. })
        ));
    }

    #[test]
    fn test_scaler_fit() {
        let scaler = StandardScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();

        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
    }

    #[test]
    fn test_scaler_json_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaler.json");
        let scaler = StandardScaler::new(vec![0.5, 1.5], vec![2.0, 3.0]).unwrap();

        scaler.save(&path).unwrap();

        assert_eq!(StandardScaler::from_file(&path).unwrap(), scaler);
    }

    #[test]
    fn test_mismatched_scaler_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"mean": [1.0, 2.0], "scale": [1.0]}"#).unwrap();

        assert!(matches!(
            StandardScaler::from_file(&path),
            Err(BatteryError::Configuration { .. })
        ));
    }

    #[test]
    fn test_predictor_orders_features() {
        let predictor = FeaturePredictor::new(
            Box::new(LinearModel(vec![1.0, 100.0])),
            vec!["cycle".to_string(), "mean_voltage".to_string()],
            PredictionTarget::StateOfHealth,
        );

        let value = predictor
            .predict(&inputs(&[("mean_voltage", 3.0), ("cycle", 2.0), ("extra", 9.0)]))
            .unwrap();

        assert_eq!(value, 302.0);
    }

    #[test]
    fn test_predictor_reports_missing_features() {
        let predictor = FeaturePredictor::new(
            Box::new(LinearModel(vec![1.0, 1.0])),
            vec!["time".to_string(), "SoH".to_string()],
            PredictionTarget::StateOfCharge,
        );

        match predictor.predict(&inputs(&[("time", 1.0)])).unwrap_err() {
            BatteryError::Prediction { message } => assert!(message.contains("SoH")),
            other => panic!("Expected Prediction error, got {:?}", other),
        }
    }

    #[test]
    fn test_soc_is_clamped() {
        let predictor = FeaturePredictor::new(
            Box::new(LinearModel(vec![2.0])),
            vec!["voltage_measured".to_string()],
            PredictionTarget::StateOfCharge,
        );

        assert_eq!(predictor.predict(&inputs(&[("voltage_measured", 80.0)])).unwrap(), 100.0);
        assert_eq!(predictor.predict(&inputs(&[("voltage_measured", -1.0)])).unwrap(), 0.0);
    }

    #[test]
    fn test_load_feature_list() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.json");
        std::fs::write(&path, r#"["cycle", "discharge_time"]"#).unwrap();

        let predictor = FeaturePredictor::load(
            Box::new(LinearModel(vec![1.0, 1.0])),
            &path,
            PredictionTarget::StateOfHealth,
        )
        .unwrap();

        assert_eq!(predictor.feature_names(), ["cycle", "discharge_time"]);
        assert_eq!(predictor.target(), PredictionTarget::StateOfHealth);
    }
}
