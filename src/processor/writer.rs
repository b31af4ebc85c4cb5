//! CSV writing for converted battery tables
//!
//! One delimited file per battery, named `<battery_id>.csv`, with a header
//! row even when the table is empty.

use crate::constants::CSV_EXTENSION;
use crate::error::{BatteryError, Result};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV table writer
#[derive(Debug, Clone)]
pub struct CsvTableWriter {
    output_dir: PathBuf,
}

impl CsvTableWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the table for `battery_id` is written to
    pub fn output_path(&self, battery_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", battery_id, CSV_EXTENSION))
    }

    /// Write `df` for `battery_id`, replacing any previous file
    pub fn write(&self, battery_id: &str, df: &mut DataFrame) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(battery_id);

        let mut file = File::create(&path).map_err(|source| BatteryError::FileAccess {
            path: path.clone(),
            source,
        })?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;

        debug!("Wrote {} rows to {}", df.height(), path.display());
        Ok(path)
    }
}
