//! Cycle classification and per-type field mapping.
//!
//! Charge and discharge cycles expose different, partially overlapping
//! field sets. Each measured kind maps to a `FieldMapping` naming the
//! arrays that must be present and which fields feed the generic
//! load/charge columns.

use super::extract::{ScalarValue, unwrap_scalar};
use super::loader::CycleRecord;
use super::report::{CycleWarning, SkipReason};
use crate::config::FieldNames;
use crate::constants::*;
use crate::error::CycleValidationError;
use crate::matfile::{MatStruct, MatValue};
use tracing::{debug, warn};

/// Declared cycle type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleKind {
    Charge,
    Discharge,
    Impedance,
    Unrecognized(String),
}

impl CycleKind {
    pub fn from_type_name(name: &str) -> Self {
        match name.trim() {
            CYCLE_TYPE_CHARGE => CycleKind::Charge,
            CYCLE_TYPE_DISCHARGE => CycleKind::Discharge,
            CYCLE_TYPE_IMPEDANCE => CycleKind::Impedance,
            other => CycleKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CycleKind::Charge => CYCLE_TYPE_CHARGE,
            CycleKind::Discharge => CYCLE_TYPE_DISCHARGE,
            CycleKind::Impedance => CYCLE_TYPE_IMPEDANCE,
            CycleKind::Unrecognized(name) => name,
        }
    }

    /// Field mapping for kinds that produce rows
    pub fn field_mapping(&self, names: &FieldNames) -> Option<FieldMapping> {
        let base = [
            &names.voltage_measured,
            &names.current_measured,
            &names.temperature_measured,
            &names.time,
        ];
        let (current, voltage, capacity) = match self {
            CycleKind::Charge => (&names.current_charge, &names.voltage_charge, None),
            CycleKind::Discharge => (
                &names.current_load,
                &names.voltage_load,
                Some(names.capacity.clone()),
            ),
            CycleKind::Impedance | CycleKind::Unrecognized(_) => return None,
        };

        let mut arrays: Vec<String> = base.iter().map(|f| f.to_string()).collect();
        arrays.push(current.clone());
        arrays.push(voltage.clone());

        Some(FieldMapping {
            arrays,
            current_field: current.clone(),
            voltage_field: voltage.clone(),
            capacity_field: capacity,
        })
    }
}

/// Fields one cycle kind needs from its measurement record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Time-series fields that must share one length
    pub arrays: Vec<String>,
    pub current_field: String,
    pub voltage_field: String,
    /// Cycle-level capacity scalar, when expected
    pub capacity_field: Option<String>,
}

impl FieldMapping {
    pub fn capacity_expected(&self) -> bool {
        self.capacity_field.is_some()
    }

    /// Every field that must be present
    pub fn required_fields(&self) -> Vec<&str> {
        self.arrays
            .iter()
            .map(String::as_str)
            .chain(self.capacity_field.as_deref())
            .collect()
    }

    /// Fields from `required_fields` absent from `record`
    pub fn missing_in(&self, record: &MatStruct) -> Vec<String> {
        self.required_fields()
            .into_iter()
            .filter(|f| !record.has_field(f))
            .map(str::to_string)
            .collect()
    }
}

/// A cycle ready for extraction
#[derive(Debug, Clone)]
pub struct ClassifiedCycle<'a> {
    pub cycle_number: usize,
    pub kind: CycleKind,
    pub ambient_temperature: f64,
    pub mapping: FieldMapping,
    pub measurement: &'a MatStruct,
    pub warnings: Vec<CycleWarning>,
}

/// Why a cycle never reached extraction
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSkip {
    pub cycle_type: String,
    pub reason: SkipReason,
}

/// Read the cycle's type and ambient temperature and pick its field mapping.
///
/// The type is read before anything else because the required fields
/// depend on it. A discharge cycle whose only missing field is capacity
/// is still accepted, with capacity treated as absent.
pub fn classify_cycle<'a>(
    cycle: &CycleRecord<'a>,
    names: &FieldNames,
) -> std::result::Result<ClassifiedCycle<'a>, CycleSkip> {
    let type_name = cycle
        .field(CYCLE_TYPE_FIELD)
        .and_then(MatValue::as_text)
        .unwrap_or_default()
        .trim()
        .to_string();
    let kind = CycleKind::from_type_name(&type_name);

    let skip = |reason: SkipReason| CycleSkip {
        cycle_type: type_name.clone(),
        reason,
    };

    let mut mapping = match (&kind, kind.field_mapping(names)) {
        (_, Some(mapping)) => mapping,
        (CycleKind::Impedance, None) => {
            debug!("Skipping impedance cycle {}", cycle.number);
            return Err(skip(SkipReason::Impedance));
        }
        (_, None) => {
            warn!(
                "Unknown cycle type '{}' in cycle {}, skipping",
                type_name, cycle.number
            );
            return Err(skip(SkipReason::UnrecognizedType(type_name.clone())));
        }
    };

    let mut warnings = Vec::new();

    let ambient_temperature = match cycle.field(AMBIENT_TEMPERATURE_FIELD) {
        None => {
            warnings.push(CycleWarning::MissingAmbientTemperature);
            f64::NAN
        }
        Some(value) => match unwrap_scalar(value) {
            ScalarValue::Scalar(v) => v,
            _ => {
                return Err(skip(SkipReason::Invalid(
                    CycleValidationError::InvalidAmbientTemperature,
                )));
            }
        },
    };

    let measurement = match cycle.field(MEASUREMENT_FIELD) {
        Some(MatValue::Struct(record)) if record.len() == 1 => record,
        _ => {
            warn!(
                "'{}' field not usable in cycle {} ({}), skipping",
                MEASUREMENT_FIELD, cycle.number, type_name
            );
            return Err(skip(SkipReason::Invalid(
                CycleValidationError::MissingMeasurementRecord,
            )));
        }
    };

    if let Some(capacity) = mapping.capacity_field.clone() {
        let missing = mapping.missing_in(measurement);
        if missing.len() == 1 && missing[0] == capacity {
            warn!(
                "'{}' missing in {} cycle {}, proceeding without capacity",
                capacity, type_name, cycle.number
            );
            mapping.capacity_field = None;
            warnings.push(CycleWarning::MissingCapacity);
        }
    }

    Ok(ClassifiedCycle {
        cycle_number: cycle.number,
        kind,
        ambient_temperature,
        mapping,
        measurement,
        warnings,
    })
}
