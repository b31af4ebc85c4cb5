//! Error handling for battery record conversion.
//!
//! File-level failures (`BatteryError`) abort the parse of one file and
//! carry enough context to diagnose it. Cycle-level failures
//! (`CycleValidationError`) are never fatal: the cycle is skipped and the
//! reason is recorded in the parse report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatteryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read file: {path} - {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid MAT-file container: {path} - {reason}")]
    Container { path: PathBuf, reason: String },

    #[error(
        "Unexpected record layout in {path} (battery '{battery_id}'): {reason}. Available keys: [{}]",
        .available_keys.join(", ")
    )]
    Format {
        path: PathBuf,
        battery_id: String,
        reason: String,
        available_keys: Vec<String>,
    },

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Resources for battery {battery_id} are unavailable: {reason}")]
    ResourceLoad { battery_id: String, reason: String },

    #[error("No data found for cycle {cycle_number} of battery {battery_id}")]
    CycleNotFound {
        battery_id: String,
        cycle_number: i64,
    },

    #[error("Prediction failed: {message}")]
    Prediction { message: String },

    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl BatteryError {
    /// True for errors that abort a whole file rather than a single cycle
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self,
            BatteryError::FileAccess { .. }
                | BatteryError::Container { .. }
                | BatteryError::Format { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BatteryError>;

/// Reasons a single cycle was rejected during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleValidationError {
    #[error("no measurement record")]
    MissingMeasurementRecord,

    #[error("missing required fields [{}]", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("mismatched measurement lengths (expected {expected}): {}", format_lengths(.lengths))]
    LengthMismatch {
        expected: usize,
        lengths: Vec<(String, usize)>,
    },

    #[error("ambient temperature is not a single number")]
    InvalidAmbientTemperature,
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(field, len)| format!("{}={}", field, len))
        .collect::<Vec<_>>()
        .join(", ")
}
