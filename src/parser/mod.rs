//! Battery record parser.
//!
//! Turns one MAT-file of per-cycle test records into a flat table of
//! per-timestep measurements. Cycles are handled independently: a cycle
//! that fails validation is recorded in the [`ParseReport`] and skipped,
//! while a file without the expected top-level shape fails as a whole.

pub mod cycle;
pub mod extract;
pub mod loader;
pub mod report;
pub mod table;

pub use cycle::{CycleKind, FieldMapping};
pub use extract::{CycleBundle, ScalarValue};
pub use report::{CycleWarning, ParseReport, SkipReason};
pub use table::{MeasurementRow, MeasurementTable};

use self::cycle::{CycleSkip, classify_cycle};
use self::extract::extract_cycle;
use self::loader::{battery_id_from_path, resolve_record};
use crate::config::FieldNames;
use crate::error::Result;
use crate::matfile::MatFile;
use std::path::Path;
use tracing::{debug, info, warn};

/// Output of one successful file parse
#[derive(Debug, Clone)]
pub struct ParsedBattery {
    /// Key as stored in the file
    pub battery_id: String,
    pub table: MeasurementTable,
    pub report: ParseReport,
}

impl ParsedBattery {
    /// True when the file was well formed but no cycle produced rows
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Parser for battery MAT-files
#[derive(Debug, Clone, Default)]
pub struct BatteryFileParser {
    field_names: FieldNames,
}

impl BatteryFileParser {
    pub fn new(field_names: FieldNames) -> Self {
        Self { field_names }
    }

    /// Read and parse one file; the battery id comes from the file name
    pub fn parse_file(&self, path: &Path) -> Result<ParsedBattery> {
        let file = MatFile::open(path)?;
        let battery_id = battery_id_from_path(path);
        self.parse_container(&file, &battery_id)
    }

    /// Parse an already decoded container for `battery_id`
    pub fn parse_container(&self, file: &MatFile, battery_id: &str) -> Result<ParsedBattery> {
        let record = resolve_record(file, battery_id)?;
        let battery_id = record.battery_id.clone();

        let mut table = MeasurementTable::new();
        let mut report = ParseReport {
            cycles_total: record.cycle_count(),
            ..Default::default()
        };

        debug!(
            "Parsing {} cycles for battery {}",
            report.cycles_total, battery_id
        );

        for cycle in record.cycles() {
            let classified = match classify_cycle(&cycle, &self.field_names) {
                Ok(classified) => classified,
                Err(CycleSkip { cycle_type, reason }) => {
                    report.record_skip(cycle.number, &cycle_type, reason);
                    continue;
                }
            };

            let bundle = match extract_cycle(&classified, &self.field_names) {
                Ok(bundle) => bundle,
                Err(e) => {
                    warn!(
                        "Skipping {} cycle {} of {}: {}",
                        classified.kind.as_str(),
                        cycle.number,
                        battery_id,
                        e
                    );
                    report.record_skip(
                        cycle.number,
                        classified.kind.as_str(),
                        SkipReason::Invalid(e),
                    );
                    continue;
                }
            };

            for warning in &bundle.warnings {
                report.record_warning(cycle.number, warning.clone());
            }
            let rows = table.push_cycle(&battery_id, &bundle);
            report.record_emitted(rows);
        }

        if table.is_empty() {
            warn!(
                "No rows parsed for battery {} ({} cycles, {} skipped)",
                battery_id,
                report.cycles_total,
                report.cycles_skipped()
            );
        } else {
            info!(
                "Parsed {} rows from {} of {} cycles for battery {}",
                report.rows_emitted, report.cycles_emitted, report.cycles_total, battery_id
            );
        }

        Ok(ParsedBattery {
            battery_id,
            table,
            report,
        })
    }
}

/// Parse `path` with the default instrument field names
pub fn parse_battery_file(path: &Path) -> Result<ParsedBattery> {
    BatteryFileParser::default().parse_file(path)
}
