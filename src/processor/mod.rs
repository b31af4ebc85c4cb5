//! Batch conversion engine.
//!
//! Orchestrates the conversion of a battery dataset using specialized
//! modules for file discovery, concurrent conversion and CSV writing.

pub mod discovery;
pub mod streaming;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, streaming::StreamingProcessor};

use crate::config::ProcessorConfig;
use crate::error::{BatteryError, Result};
use crate::models::{FileOutcome, FileStatus, ProcessingStats};

use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Main processor for battery dataset conversion
#[derive(Debug)]
pub struct BatchProcessor {
    input_path: PathBuf,
    output_path: PathBuf,
    config: ProcessorConfig,
    file_discovery: FileDiscovery,
    cancellation: CancellationToken,
}

impl BatchProcessor {
    /// Create a new processor for a `.mat` file or a directory of them.
    ///
    /// Without an explicit output directory, tables go to `csv/` next to
    /// the input.
    pub fn new(input_path: PathBuf, output_path: Option<PathBuf>) -> Result<Self> {
        if !input_path.exists() {
            return Err(BatteryError::InputNotFound { path: input_path });
        }

        let output_path = output_path.unwrap_or_else(|| default_output_dir(&input_path));

        Ok(Self {
            file_discovery: FileDiscovery::new(input_path.clone()),
            input_path,
            output_path,
            config: ProcessorConfig::default(),
            cancellation: CancellationToken::new(),
        })
    }

    /// Configure the processor
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop starting new files once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Main processing entry point
    pub async fn process(&self) -> Result<ProcessingStats> {
        self.config.validate()?;

        let start_time = Instant::now();
        println!(
            "{}",
            "Starting battery record conversion".bright_green().bold()
        );
        println!("  {} {}", "Input:".bright_cyan(), self.input_path.display());
        if self.config.inspect_only {
            println!("  {} {}", "Mode:".bright_cyan(), "inspect only".bright_yellow());
        } else {
            println!("  {} {}", "Output:".bright_cyan(), self.output_path.display());
        }

        // Step 1: Discover MAT-files
        println!("\n{}", "Discovering MAT-files...".bright_yellow());
        let mat_files = self.file_discovery.discover_mat_files().await?;
        println!(
            "  {} {} MAT-files",
            "Found".bright_green(),
            mat_files.len().to_string().bright_white().bold()
        );

        if mat_files.is_empty() {
            return Ok(ProcessingStats {
                output_path: self.output_path.clone(),
                processing_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        // Step 2: Convert
        println!("\n{}", "Converting files...".bright_yellow());
        let streaming = StreamingProcessor::new(self.config.clone(), self.output_path.clone());
        let outcomes = streaming
            .process_files_streaming(&mat_files, &self.cancellation)
            .await?;

        if self.cancellation.is_cancelled() {
            return Err(BatteryError::ProcessingInterrupted {
                reason: "Processing interrupted by user".to_string(),
            });
        }

        if self.config.inspect_only {
            print_inspection(&outcomes);
        }

        let mut stats = ProcessingStats::from_outcomes(self.output_path.clone(), outcomes);
        stats.processing_time_ms = start_time.elapsed().as_millis();
        print_summary(&stats);

        Ok(stats)
    }
}

/// `<input dir>/csv`, where a file input uses its parent directory
fn default_output_dir(input_path: &Path) -> PathBuf {
    let base = if input_path.is_dir() {
        input_path
    } else {
        input_path.parent().unwrap_or_else(|| Path::new("."))
    };
    base.join("csv")
}

fn print_inspection(outcomes: &[FileOutcome]) {
    println!("\n{}", "Cycle Report".bright_green().bold());
    for outcome in outcomes {
        match &outcome.status {
            FileStatus::Parsed {
                battery_id, report, ..
            } => {
                println!(
                    "  {} {} cycles, {} emitted, {} rows",
                    format!("{}:", battery_id).bright_cyan(),
                    report.cycles_total,
                    report.cycles_emitted,
                    report.rows_emitted
                );
                for skipped in &report.skipped {
                    let line = format!(
                        "    cycle {} ({}): {}",
                        skipped.cycle_number, skipped.cycle_type, skipped.reason
                    );
                    if skipped.reason.is_failure() {
                        println!("{}", line.bright_red());
                    } else {
                        println!("{}", line.bright_black());
                    }
                }
                for note in &report.warnings {
                    println!(
                        "{}",
                        format!("    cycle {}: {}", note.cycle_number, note.warning).yellow()
                    );
                }
            }
            FileStatus::Failed { error } => {
                println!(
                    "  {} {}",
                    format!("{}:", outcome.input.display()).bright_red(),
                    error
                );
            }
        }
    }
}

fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_empty > 0 {
        println!(
            "  {} {}",
            "Files without rows:".bright_yellow(),
            stats.files_empty.to_string().bright_yellow()
        );
    }
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} emitted, {} skipped",
        "Cycles:".bright_cyan(),
        stats.cycles_emitted.to_string().bright_white(),
        stats.cycles_skipped.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Total rows:".bright_cyan(),
        stats.total_rows.to_string().bright_white().bold()
    );
}
