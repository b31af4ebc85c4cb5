//! Flat per-timestep measurement table.
//!
//! Rows are only ever appended, a whole cycle at a time, in cycle order
//! and then timestep order. Downstream consumers rebuild time series from
//! that ordering.

use crate::constants::*;
use super::extract::CycleBundle;
use polars::prelude::*;
use serde::Serialize;

/// One emitted measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub battery_id: String,
    pub cycle_number: i64,
    pub cycle_type: String,
    pub ambient_temperature: f64,
    pub measurement_time_relative: f64,
    pub voltage_measured: f64,
    pub current_measured: f64,
    pub temperature_measured: f64,
    pub voltage_load_or_charge: f64,
    pub current_load_or_charge: f64,
    pub capacity: f64,
}

/// Append-only columnar store of measurement rows
#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    battery_id: Vec<String>,
    cycle_number: Vec<i64>,
    cycle_type: Vec<String>,
    ambient_temperature: Vec<f64>,
    measurement_time_relative: Vec<f64>,
    voltage_measured: Vec<f64>,
    current_measured: Vec<f64>,
    temperature_measured: Vec<f64>,
    voltage_load_or_charge: Vec<f64>,
    current_load_or_charge: Vec<f64>,
    capacity: Vec<f64>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.measurement_time_relative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one row per timestep of `bundle`, returning the number added
    pub fn push_cycle(&mut self, battery_id: &str, bundle: &CycleBundle) -> usize {
        let n = bundle.len();
        let cycle_type = bundle.kind.as_str();

        self.battery_id
            .extend(std::iter::repeat_n(battery_id.to_string(), n));
        self.cycle_number
            .extend(std::iter::repeat_n(bundle.cycle_number as i64, n));
        self.cycle_type
            .extend(std::iter::repeat_n(cycle_type.to_string(), n));
        self.ambient_temperature
            .extend(std::iter::repeat_n(bundle.ambient_temperature, n));
        self.capacity.extend(std::iter::repeat_n(bundle.capacity, n));

        self.measurement_time_relative.extend_from_slice(&bundle.time);
        self.voltage_measured
            .extend_from_slice(&bundle.voltage_measured);
        self.current_measured
            .extend_from_slice(&bundle.current_measured);
        self.temperature_measured
            .extend_from_slice(&bundle.temperature_measured);
        self.voltage_load_or_charge
            .extend_from_slice(&bundle.voltage_load_or_charge);
        self.current_load_or_charge
            .extend_from_slice(&bundle.current_load_or_charge);

        n
    }

    pub fn row(&self, index: usize) -> Option<MeasurementRow> {
        if index >= self.len() {
            return None;
        }
        Some(MeasurementRow {
            battery_id: self.battery_id[index].clone(),
            cycle_number: self.cycle_number[index],
            cycle_type: self.cycle_type[index].clone(),
            ambient_temperature: self.ambient_temperature[index],
            measurement_time_relative: self.measurement_time_relative[index],
            voltage_measured: self.voltage_measured[index],
            current_measured: self.current_measured[index],
            temperature_measured: self.temperature_measured[index],
            voltage_load_or_charge: self.voltage_load_or_charge[index],
            current_load_or_charge: self.current_load_or_charge[index],
            capacity: self.capacity[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = MeasurementRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }

    /// Distinct cycle numbers in emission order
    pub fn cycle_numbers(&self) -> Vec<i64> {
        let mut numbers: Vec<i64> = Vec::new();
        for n in &self.cycle_number {
            if numbers.last() != Some(n) {
                numbers.push(*n);
            }
        }
        numbers
    }

    /// Polars frame with exactly the output columns, in output order
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new(COL_BATTERY_ID.into(), self.battery_id.as_slice()),
            Column::new(COL_CYCLE_NUMBER.into(), self.cycle_number.as_slice()),
            Column::new(COL_CYCLE_TYPE.into(), self.cycle_type.as_slice()),
            Column::new(
                COL_AMBIENT_TEMPERATURE.into(),
                self.ambient_temperature.as_slice(),
            ),
            Column::new(
                COL_TIME_RELATIVE.into(),
                self.measurement_time_relative.as_slice(),
            ),
            Column::new(COL_VOLTAGE_MEASURED.into(), self.voltage_measured.as_slice()),
            Column::new(COL_CURRENT_MEASURED.into(), self.current_measured.as_slice()),
            Column::new(
                COL_TEMPERATURE_MEASURED.into(),
                self.temperature_measured.as_slice(),
            ),
            Column::new(
                COL_VOLTAGE_LOAD_OR_CHARGE.into(),
                self.voltage_load_or_charge.as_slice(),
            ),
            Column::new(
                COL_CURRENT_LOAD_OR_CHARGE.into(),
                self.current_load_or_charge.as_slice(),
            ),
            Column::new(COL_CAPACITY.into(), self.capacity.as_slice()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::cycle::CycleKind;

    fn bundle(cycle_number: usize, kind: CycleKind, n: usize, capacity: f64) -> CycleBundle {
        let ramp: Vec<f64> = (0..n).map(|i| i as f64).collect();
        CycleBundle {
            cycle_number,
            kind,
            ambient_temperature: 24.0,
            time: ramp.clone(),
            voltage_measured: ramp.iter().map(|v| 3.0 + v).collect(),
            current_measured: ramp.clone(),
            temperature_measured: ramp.clone(),
            voltage_load_or_charge: ramp.clone(),
            current_load_or_charge: ramp,
            capacity,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_push_cycle_broadcasts_cycle_fields() {
        let mut table = MeasurementTable::new();
        let added = table.push_cycle("B0005", &bundle(3, CycleKind::Discharge, 4, 1.85));

        assert_eq!(added, 4);
        assert_eq!(table.len(), 4);
        for row in table.rows() {
            assert_eq!(row.battery_id, "B0005");
            assert_eq!(row.cycle_number, 3);
            assert_eq!(row.cycle_type, "discharge");
            assert_eq!(row.ambient_temperature, 24.0);
            assert_eq!(row.capacity, 1.85);
        }
        assert_eq!(table.row(2).unwrap().voltage_measured, 5.0);
        assert!(table.row(4).is_none());
    }

    #[test]
    fn test_rows_keep_cycle_then_timestep_order() {
        let mut table = MeasurementTable::new();
        table.push_cycle("B0005", &bundle(1, CycleKind::Discharge, 2, 1.8));
        table.push_cycle("B0005", &bundle(2, CycleKind::Charge, 3, f64::NAN));

        let order: Vec<(i64, f64)> = table
            .rows()
            .map(|r| (r.cycle_number, r.measurement_time_relative))
            .collect();
        assert_eq!(
            order,
            vec![(1, 0.0), (1, 1.0), (2, 0.0), (2, 1.0), (2, 2.0)]
        );
        assert_eq!(table.cycle_numbers(), vec![1, 2]);
    }

    #[test]
    fn test_dataframe_schema() {
        let mut table = MeasurementTable::new();
        table.push_cycle("B0006", &bundle(1, CycleKind::Charge, 2, f64::NAN));

        let df = table.to_dataframe().unwrap();

        assert_eq!(df.height(), 2);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, OUTPUT_COLUMNS.to_vec());
        assert_eq!(df.column(COL_CYCLE_NUMBER).unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column(COL_CAPACITY).unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_empty_table_still_has_columns() {
        let df = MeasurementTable::new().to_dataframe().unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), OUTPUT_COLUMNS.len());
    }
}
