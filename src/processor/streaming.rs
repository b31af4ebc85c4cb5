//! Concurrent per-file conversion
//!
//! Each file is parsed, optionally smoothed and written on a blocking
//! worker. Files run concurrently up to the configured limit; a failure in
//! one file is recorded in its outcome and never stops the others.

use super::writer::CsvTableWriter;
use crate::config::ProcessorConfig;
use crate::error::{BatteryError, Result};
use crate::models::{FileOutcome, FileStatus};
use crate::parser::{BatteryFileParser, ParsedBattery};
use crate::smoothing::add_smoothed_columns;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Streaming processor for battery files
#[derive(Debug, Clone)]
pub struct StreamingProcessor {
    config: ProcessorConfig,
    parser: BatteryFileParser,
    writer: CsvTableWriter,
}

impl StreamingProcessor {
    pub fn new(config: ProcessorConfig, output_dir: PathBuf) -> Self {
        Self {
            parser: BatteryFileParser::new(config.field_names.clone()),
            writer: CsvTableWriter::new(output_dir),
            config,
        }
    }

    /// Convert every file, returning outcomes in input order
    pub async fn process_files_streaming(
        &self,
        files: &[PathBuf],
        cancellation: &CancellationToken,
    ) -> Result<Vec<FileOutcome>> {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .map_err(|e| BatteryError::Configuration {
                    message: format!("Invalid progress template: {}", e),
                })?
                .progress_chars("#>-"),
        );
        pb.set_message("Converting files");

        let concurrent_limit = self.config.max_concurrent_files.min(files.len()).max(1);
        debug!(
            "Converting {} files with concurrency {}",
            files.len(),
            concurrent_limit
        );

        let mut outcomes: Vec<(usize, FileOutcome)> = stream::iter(files.iter().enumerate())
            .map(|(index, file_path)| {
                let pb = pb.clone();
                async move {
                    if let Some(file_name) = file_path.file_name() {
                        pb.set_message(format!("Converting: {}", file_name.to_string_lossy()));
                    }

                    let status = if cancellation.is_cancelled() {
                        Err(BatteryError::ProcessingInterrupted {
                            reason: "cancelled before start".to_string(),
                        })
                    } else {
                        self.process_single_file(file_path).await
                    };
                    pb.inc(1);

                    let status = match status {
                        Ok(status) => status,
                        Err(e) => {
                            error!("Failed to convert {}: {:#}", file_path.display(), e);
                            FileStatus::Failed {
                                error: e.to_string(),
                            }
                        }
                    };
                    (
                        index,
                        FileOutcome {
                            input: file_path.clone(),
                            status,
                        },
                    )
                }
            })
            .buffer_unordered(concurrent_limit)
            .collect()
            .await;

        pb.finish_with_message("All files converted");

        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    /// Parse, smooth and write one file on a blocking worker
    pub async fn process_single_file(&self, file_path: &Path) -> Result<FileStatus> {
        let this = self.clone();
        let path = file_path.to_path_buf();
        task::spawn_blocking(move || this.convert(&path))
            .await
            .map_err(|e| BatteryError::ProcessingInterrupted {
                reason: format!("Conversion task for {} failed: {}", file_path.display(), e),
            })?
    }

    fn convert(&self, file_path: &Path) -> Result<FileStatus> {
        let ParsedBattery {
            battery_id,
            table,
            report,
        } = self.parser.parse_file(file_path)?;

        if self.config.inspect_only {
            return Ok(FileStatus::Parsed {
                battery_id,
                report,
                output: None,
            });
        }

        let mut df = table.to_dataframe()?;
        if self.config.smoothing.enabled {
            df = add_smoothed_columns(&df, self.config.smoothing.window)?;
        }
        let output = self.writer.write(&battery_id, &mut df)?;
        info!(
            "Converted {} ({} rows) to {}",
            file_path.display(),
            report.rows_emitted,
            output.display()
        );

        Ok(FileStatus::Parsed {
            battery_id,
            report,
            output: Some(output),
        })
    }
}
