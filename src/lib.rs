//! Battery Processor Library
//!
//! Converts NASA battery aging records, stored as MATLAB Level-5 MAT-files
//! with one heterogeneous record per charge, discharge or impedance cycle,
//! into one flat table of per-timestep measurements.
//!
//! This library provides tools for:
//! - Decoding MAT-file containers, including compressed variables
//! - Classifying cycles and extracting their measurements defensively
//! - Emitting ordered rows and writing them as CSV tables
//! - Batch conversion of whole dataset directories
//! - Preparing model inputs and caching per-battery prediction resources

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod matfile;
pub mod models;
pub mod parser;
pub mod processor;
pub mod serving;
pub mod smoothing;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{FieldNames, ProcessorConfig, ServingConfig, SmoothingConfig};
pub use error::{BatteryError, CycleValidationError, Result};
pub use models::{FileOutcome, FileStatus, ProcessingStats};
pub use parser::{
    BatteryFileParser, MeasurementRow, MeasurementTable, ParseReport, ParsedBattery,
    parse_battery_file,
};
pub use processor::BatchProcessor;
