//! Per-file parse outcome: which cycles were emitted, skipped or degraded.

use crate::error::CycleValidationError;
use serde::Serialize;
use std::fmt;

/// Why a cycle contributed no rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    /// Impedance sweeps are intentionally not converted
    Impedance,
    UnrecognizedType(String),
    Invalid(#[serde(serialize_with = "serialize_display")] CycleValidationError),
}

impl SkipReason {
    /// Expected skips are not failures; only invalid cycles are
    pub fn is_failure(&self) -> bool {
        matches!(self, SkipReason::Invalid(_))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Impedance => write!(f, "impedance cycle"),
            SkipReason::UnrecognizedType(kind) => write!(f, "unrecognized cycle type '{}'", kind),
            SkipReason::Invalid(e) => write!(f, "{}", e),
        }
    }
}

/// Degradations that still let a cycle be emitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CycleWarning {
    /// Discharge cycle without a capacity field
    MissingCapacity,
    /// Capacity held several values; none was chosen
    AmbiguousCapacity { elements: usize },
    /// Capacity was empty or not numeric
    UnreadableCapacity,
    /// No ambient temperature field on the cycle
    MissingAmbientTemperature,
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleWarning::MissingCapacity => write!(f, "capacity missing, recorded as NaN"),
            CycleWarning::AmbiguousCapacity { elements } => write!(
                f,
                "capacity holds {} values, recorded as NaN",
                elements
            ),
            CycleWarning::UnreadableCapacity => write!(f, "capacity unreadable, recorded as NaN"),
            CycleWarning::MissingAmbientTemperature => {
                write!(f, "ambient temperature missing, recorded as NaN")
            }
        }
    }
}

fn serialize_display<S, T>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCycle {
    pub cycle_number: usize,
    pub cycle_type: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleNote {
    pub cycle_number: usize,
    pub warning: CycleWarning,
}

/// Summary of one file's parse
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    pub cycles_total: usize,
    pub cycles_emitted: usize,
    pub rows_emitted: usize,
    pub skipped: Vec<SkippedCycle>,
    pub warnings: Vec<CycleNote>,
}

impl ParseReport {
    pub fn record_emitted(&mut self, rows: usize) {
        self.cycles_emitted += 1;
        self.rows_emitted += rows;
    }

    pub fn record_skip(&mut self, cycle_number: usize, cycle_type: &str, reason: SkipReason) {
        self.skipped.push(SkippedCycle {
            cycle_number,
            cycle_type: cycle_type.to_string(),
            reason,
        });
    }

    pub fn record_warning(&mut self, cycle_number: usize, warning: CycleWarning) {
        self.warnings.push(CycleNote {
            cycle_number,
            warning,
        });
    }

    pub fn cycles_skipped(&self) -> usize {
        self.skipped.len()
    }

    /// Cycles rejected by validation (as opposed to expected type skips)
    pub fn cycles_failed(&self) -> usize {
        self.skipped.iter().filter(|s| s.reason.is_failure()).count()
    }
}
