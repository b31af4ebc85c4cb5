//! Defensive extraction of measurement arrays and cycle-level scalars.
//!
//! The rig serializes scalars at unpredictable depths (plain value,
//! 1-element array, value wrapped in a 1x1 cell) so every scalar read goes
//! through `unwrap_scalar`, which reports ambiguity instead of guessing.

use super::cycle::{ClassifiedCycle, CycleKind};
use super::report::CycleWarning;
use crate::config::FieldNames;
use crate::constants::MAX_SCALAR_NESTING;
use crate::error::CycleValidationError;
use crate::matfile::{MatStruct, MatValue};
use tracing::warn;

/// Result of reducing a possibly-nested value to one number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Scalar(f64),
    /// More than one element where one was expected
    Ambiguous { elements: usize },
    Empty,
    NotNumeric,
}

/// Reduce `value` to a single number, looking through single-element wrappers
pub fn unwrap_scalar(value: &MatValue) -> ScalarValue {
    unwrap_scalar_at(value, 0)
}

fn unwrap_scalar_at(value: &MatValue, depth: usize) -> ScalarValue {
    if depth > MAX_SCALAR_NESTING {
        return ScalarValue::NotNumeric;
    }
    match value {
        MatValue::Numeric { data, .. } => match data.len() {
            0 => ScalarValue::Empty,
            1 => ScalarValue::Scalar(data[0]),
            n => ScalarValue::Ambiguous { elements: n },
        },
        MatValue::Cell { items, .. } => match items.len() {
            0 => ScalarValue::Empty,
            1 => unwrap_scalar_at(&items[0], depth + 1),
            n => ScalarValue::Ambiguous { elements: n },
        },
        _ => ScalarValue::NotNumeric,
    }
}

/// Flattened time series held by `value`, looking through single-element cells
pub fn flatten_series(value: &MatValue) -> Option<&[f64]> {
    flatten_series_at(value, 0)
}

fn flatten_series_at(value: &MatValue, depth: usize) -> Option<&[f64]> {
    if depth > MAX_SCALAR_NESTING {
        return None;
    }
    match value {
        MatValue::Numeric { data, .. } => Some(data),
        MatValue::Cell { items, .. } if items.len() == 1 => flatten_series_at(&items[0], depth + 1),
        _ => None,
    }
}

/// Validated, equal-length arrays for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleBundle {
    pub cycle_number: usize,
    pub kind: CycleKind,
    pub ambient_temperature: f64,
    pub time: Vec<f64>,
    pub voltage_measured: Vec<f64>,
    pub current_measured: Vec<f64>,
    pub temperature_measured: Vec<f64>,
    pub voltage_load_or_charge: Vec<f64>,
    pub current_load_or_charge: Vec<f64>,
    /// NaN when absent, ambiguous or not applicable
    pub capacity: f64,
    pub warnings: Vec<CycleWarning>,
}

impl CycleBundle {
    /// Number of timesteps
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Pull every required field out of a classified cycle.
///
/// Checks run in order: presence of all required fields, capacity
/// resolution, then length agreement. The bundle is only built once every
/// check has passed.
pub fn extract_cycle(
    cycle: &ClassifiedCycle<'_>,
    names: &FieldNames,
) -> Result<CycleBundle, CycleValidationError> {
    let record = cycle.measurement;
    let mapping = &cycle.mapping;

    let mut missing = mapping.missing_in(record);
    // Present but not a numeric series counts as missing too
    for field in &mapping.arrays {
        if record.has_field(field) && series(record, field).is_none() {
            missing.push(field.clone());
        }
    }
    if !missing.is_empty() {
        warn!(
            "Missing required fields {:?} for {} cycle {}. Available: {:?}",
            missing,
            cycle.kind.as_str(),
            cycle.cycle_number,
            record.field_names()
        );
        return Err(CycleValidationError::MissingFields { fields: missing });
    }

    let mut warnings = cycle.warnings.clone();
    let capacity = match &mapping.capacity_field {
        Some(field) => resolve_capacity(record, field, cycle.cycle_number, &mut warnings),
        None => f64::NAN,
    };

    let time = series(record, &names.time).unwrap_or_default();
    let expected = time.len();
    let lengths: Vec<(String, usize)> = mapping
        .arrays
        .iter()
        .map(|f| (f.clone(), series(record, f).map(|s| s.len()).unwrap_or(0)))
        .collect();
    if lengths.iter().any(|(_, len)| *len != expected) {
        warn!(
            "Mismatched measurement lengths in cycle {} ({}), skipping",
            cycle.cycle_number,
            cycle.kind.as_str()
        );
        return Err(CycleValidationError::LengthMismatch { expected, lengths });
    }

    let take = |field: &str| series(record, field).unwrap_or_default().to_vec();

    Ok(CycleBundle {
        cycle_number: cycle.cycle_number,
        kind: cycle.kind.clone(),
        ambient_temperature: cycle.ambient_temperature,
        time: time.to_vec(),
        voltage_measured: take(&names.voltage_measured),
        current_measured: take(&names.current_measured),
        temperature_measured: take(&names.temperature_measured),
        voltage_load_or_charge: take(&mapping.voltage_field),
        current_load_or_charge: take(&mapping.current_field),
        capacity,
        warnings,
    })
}

fn series<'a>(record: &'a MatStruct, field: &str) -> Option<&'a [f64]> {
    record.field(0, field).and_then(flatten_series)
}

fn resolve_capacity(
    record: &MatStruct,
    field: &str,
    cycle_number: usize,
    warnings: &mut Vec<CycleWarning>,
) -> f64 {
    let Some(value) = record.field(0, field) else {
        warnings.push(CycleWarning::MissingCapacity);
        return f64::NAN;
    };
    match unwrap_scalar(value) {
        ScalarValue::Scalar(v) => v,
        ScalarValue::Ambiguous { elements } => {
            warn!(
                "Capacity in cycle {} has unexpected shape {}. Using NaN.",
                cycle_number,
                value.describe()
            );
            warnings.push(CycleWarning::AmbiguousCapacity { elements });
            f64::NAN
        }
        ScalarValue::Empty | ScalarValue::NotNumeric => {
            warn!(
                "Capacity in cycle {} is not a number ({}). Using NaN.",
                cycle_number,
                value.describe()
            );
            warnings.push(CycleWarning::UnreadableCapacity);
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{charge_data, discharge_data, series as samples};

    fn classified(kind: CycleKind, measurement: &MatStruct) -> ClassifiedCycle<'_> {
        let mut mapping = kind.field_mapping(&FieldNames::default()).unwrap();
        if !measurement.has_field("Capacity") {
            mapping.capacity_field = None;
        }
        ClassifiedCycle {
            cycle_number: 7,
            kind,
            ambient_temperature: 24.0,
            mapping,
            measurement,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_unwrap_scalar_shapes_agree() {
        let plain = MatValue::scalar(1.85);
        let one_level = MatValue::wrapped(MatValue::scalar(1.85));
        let two_levels = MatValue::wrapped(MatValue::wrapped(MatValue::scalar(1.85)));

        assert_eq!(unwrap_scalar(&plain), ScalarValue::Scalar(1.85));
        assert_eq!(unwrap_scalar(&one_level), ScalarValue::Scalar(1.85));
        assert_eq!(unwrap_scalar(&two_levels), ScalarValue::Scalar(1.85));
    }

    #[test]
    fn test_unwrap_scalar_refuses_to_guess() {
        assert_eq!(
            unwrap_scalar(&MatValue::row(&[1.8, 1.9])),
            ScalarValue::Ambiguous { elements: 2 }
        );
        assert_eq!(unwrap_scalar(&MatValue::row(&[])), ScalarValue::Empty);
        assert_eq!(unwrap_scalar(&MatValue::text("x")), ScalarValue::NotNumeric);

        let mut deep = MatValue::scalar(1.0);
        for _ in 0..=MAX_SCALAR_NESTING {
            deep = MatValue::wrapped(deep);
        }
        assert_eq!(unwrap_scalar(&deep), ScalarValue::NotNumeric);
    }

    #[test]
    fn test_charge_bundle() {
        let data = charge_data(5);
        let bundle = extract_cycle(&classified(CycleKind::Charge, &data), &FieldNames::default()).unwrap();

        assert_eq!(bundle.len(), 5);
        assert_eq!(bundle.time, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bundle.voltage_load_or_charge[0], 4.2);
        assert_eq!(bundle.current_load_or_charge[0], 1.4);
        assert!(bundle.capacity.is_nan());
        assert!(bundle.warnings.is_empty());
    }

    #[test]
    fn test_discharge_capacity_shapes() {
        for capacity in [
            MatValue::scalar(1.85),
            MatValue::row(&[1.85]),
            MatValue::wrapped(MatValue::scalar(1.85)),
        ] {
            let data = discharge_data(3, Some(capacity));
            let bundle =
                extract_cycle(&classified(CycleKind::Discharge, &data), &FieldNames::default()).unwrap();
            assert_eq!(bundle.capacity, 1.85);
            assert_eq!(bundle.voltage_load_or_charge, vec![3.0, 4.0, 5.0]);
        }
    }

    #[test]
    fn test_ambiguous_capacity_still_emits() {
        let data = discharge_data(3, Some(MatValue::row(&[1.8, 1.7])));
        let bundle =
            extract_cycle(&classified(CycleKind::Discharge, &data), &FieldNames::default()).unwrap();

        assert!(bundle.capacity.is_nan());
        assert_eq!(bundle.len(), 3);
        assert_eq!(
            bundle.warnings,
            vec![CycleWarning::AmbiguousCapacity { elements: 2 }]
        );
    }

    #[test]
    fn test_missing_fields_are_all_named() {
        let data = MatStruct::single(vec![
            ("Voltage_measured", samples(2, 0.0)),
            ("Current_measured", samples(2, 0.0)),
            ("Temperature_measured", samples(2, 0.0)),
            ("Time", samples(2, 0.0)),
            ("Current_load", MatValue::text("n/a")),
        ]);
        let err = extract_cycle(&classified(CycleKind::Discharge, &data), &FieldNames::default())
            .unwrap_err();

        assert_eq!(
            err,
            CycleValidationError::MissingFields {
                fields: vec!["Voltage_load".to_string(), "Current_load".to_string()],
            }
        );
    }

    #[test]
    fn test_length_mismatch_reports_every_field() {
        let mut fields = vec![
            ("Voltage_measured", samples(4, 0.0)),
            ("Current_measured", samples(4, 0.0)),
            ("Temperature_measured", samples(3, 0.0)),
            ("Current_charge", samples(4, 0.0)),
            ("Voltage_charge", samples(4, 0.0)),
        ];
        fields.push(("Time", samples(4, 0.0)));
        let data = MatStruct::single(fields);

        match extract_cycle(&classified(CycleKind::Charge, &data), &FieldNames::default()).unwrap_err() {
            CycleValidationError::LengthMismatch { expected, lengths } => {
                assert_eq!(expected, 4);
                assert_eq!(lengths.len(), 6);
                assert!(lengths.contains(&("Temperature_measured".to_string(), 3)));
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_series_inside_cell_is_accepted() {
        let mut data_fields = vec![
            ("Voltage_measured", MatValue::wrapped(samples(2, 3.0))),
            ("Current_measured", samples(2, 0.0)),
            ("Temperature_measured", samples(2, 0.0)),
            ("Current_charge", samples(2, 0.0)),
            ("Voltage_charge", samples(2, 0.0)),
        ];
        data_fields.push(("Time", samples(2, 0.0)));
        let data = MatStruct::single(data_fields);

        let bundle = extract_cycle(&classified(CycleKind::Charge, &data), &FieldNames::default()).unwrap();
        assert_eq!(bundle.voltage_measured, vec![3.0, 4.0]);
    }
}
