//! Result types reported by batch processing.

use crate::parser::ParseReport;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Serialize)]
pub enum FileStatus {
    /// Parsed; `output` is None in inspect-only mode
    Parsed {
        battery_id: String,
        report: ParseReport,
        output: Option<PathBuf>,
    },
    /// Fatal for this file only
    Failed { error: String },
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }

    pub fn report(&self) -> Option<&ParseReport> {
        match &self.status {
            FileStatus::Parsed { report, .. } => Some(report),
            FileStatus::Failed { .. } => None,
        }
    }
}

/// Processing statistics
#[derive(Debug, Default, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    /// Parsed files that produced no rows
    pub files_empty: usize,
    pub total_rows: usize,
    pub cycles_emitted: usize,
    pub cycles_skipped: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
    /// Per-file outcomes in input order
    pub files: Vec<FileOutcome>,
}

impl ProcessingStats {
    /// Fold per-file outcomes into totals
    pub fn from_outcomes(output_path: PathBuf, files: Vec<FileOutcome>) -> Self {
        let mut stats = ProcessingStats {
            output_path,
            ..Default::default()
        };
        for outcome in &files {
            match outcome.report() {
                Some(report) => {
                    stats.files_processed += 1;
                    if report.rows_emitted == 0 {
                        stats.files_empty += 1;
                    }
                    stats.total_rows += report.rows_emitted;
                    stats.cycles_emitted += report.cycles_emitted;
                    stats.cycles_skipped += report.cycles_skipped();
                }
                None => stats.files_failed += 1,
            }
        }
        stats.files = files;
        stats
    }
}
