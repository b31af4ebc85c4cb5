//! Model input preparation for one cycle.

use super::model::FeatureScaler;
use crate::constants::{COL_BATTERY_ID, COL_CYCLE_NUMBER};
use crate::error::{BatteryError, Result};
use polars::prelude::*;

/// Build the padded, scaled feature sequence for one cycle.
///
/// Rows are selected by `cycle_number` (and by `battery_id`, ignoring ASCII
/// case, when the table carries that column), projected onto `features` in order, scaled, then
/// brought to exactly `max_len` rows: shorter sequences are padded at the
/// end with zeros, longer ones keep their last `max_len` rows.
pub fn prepare_sequence(
    table: &DataFrame,
    battery_id: &str,
    cycle_number: i64,
    features: &[String],
    scaler: &dyn FeatureScaler,
    max_len: usize,
) -> Result<Vec<Vec<f32>>> {
    let columns: Vec<String> = table
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let missing: Vec<&str> = features
        .iter()
        .filter(|f| !columns.contains(f))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(BatteryError::Prediction {
            message: format!("table lacks feature columns [{}]", missing.join(", ")),
        });
    }

    let mut predicate = col(COL_CYCLE_NUMBER)
        .cast(DataType::Int64)
        .eq(lit(cycle_number));
    if columns.iter().any(|c| c == COL_BATTERY_ID) {
        let stored = matching_battery_ids(table, battery_id)?;
        let Some(first) = stored.first() else {
            return Err(BatteryError::CycleNotFound {
                battery_id: battery_id.to_string(),
                cycle_number,
            });
        };
        let by_id = stored[1..].iter().fold(
            col(COL_BATTERY_ID).eq(lit(first.clone())),
            |acc, id| acc.or(col(COL_BATTERY_ID).eq(lit(id.clone()))),
        );
        predicate = predicate.and(by_id);
    }

    let projected = table
        .clone()
        .lazy()
        .filter(predicate)
        .select(
            features
                .iter()
                .map(|f| col(f.as_str()).cast(DataType::Float64))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    if projected.height() == 0 {
        return Err(BatteryError::CycleNotFound {
            battery_id: battery_id.to_string(),
            cycle_number,
        });
    }

    let mut rows = vec![Vec::with_capacity(features.len()); projected.height()];
    for feature in features {
        let values = projected.column(feature)?.as_materialized_series().f64()?.clone();
        for (row, value) in rows.iter_mut().zip(values.iter()) {
            row.push(value.unwrap_or(f64::NAN));
        }
    }

    let scaled = scaler.transform(&rows)?;
    Ok(pad_or_truncate(&scaled, features.len(), max_len))
}

/// Stored battery ids equal to `battery_id` ignoring ASCII case
fn matching_battery_ids(table: &DataFrame, battery_id: &str) -> Result<Vec<String>> {
    let ids = table
        .column(COL_BATTERY_ID)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let mut matches: Vec<String> = Vec::new();
    for id in ids.str()?.iter().flatten() {
        if id.eq_ignore_ascii_case(battery_id) && !matches.iter().any(|m| m == id) {
            matches.push(id.to_string());
        }
    }
    Ok(matches)
}

/// Exactly `max_len` rows: zero rows appended, or leading rows dropped
fn pad_or_truncate(rows: &[Vec<f64>], width: usize, max_len: usize) -> Vec<Vec<f32>> {
    let start = rows.len().saturating_sub(max_len);
    let mut out: Vec<Vec<f32>> = rows[start..]
        .iter()
        .map(|row| row.iter().map(|v| *v as f32).collect())
        .collect();
    out.resize(max_len, vec![0.0; width]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::model::StandardScaler;

    fn features() -> Vec<String> {
        vec!["v".to_string(), "t".to_string()]
    }

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                COL_BATTERY_ID.into(),
                vec!["B0005", "B0005", "B0005", "B0006"],
            ),
            Column::new(COL_CYCLE_NUMBER.into(), vec![1i64, 2, 2, 2]),
            Column::new("v".into(), vec![3.0, 4.0, 5.0, 9.0]),
            Column::new("t".into(), vec![0.0, 0.0, 10.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_pads_at_end() {
        let seq = prepare_sequence(
            &table(),
            "B0005",
            2,
            &features(),
            &StandardScaler::identity(2),
            4,
        )
        .unwrap();

        assert_eq!(
            seq,
            vec![
                vec![4.0, 0.0],
                vec![5.0, 10.0],
                vec![0.0, 0.0],
                vec![0.0, 0.0]
            ]
        );
    }

    #[test]
    fn test_truncates_from_front() {
        let seq = prepare_sequence(
            &table(),
            "B0005",
            2,
            &features(),
            &StandardScaler::identity(2),
            1,
        )
        .unwrap();

        assert_eq!(seq, vec![vec![5.0, 10.0]]);
    }

    #[test]
    fn test_scaler_applied_before_padding() {
        let scaler = StandardScaler::new(vec![1.0, 0.0], vec![2.0, 10.0]).unwrap();

        let seq = prepare_sequence(&table(), "B0005", 1, &features(), &scaler, 2).unwrap();

        assert_eq!(seq, vec![vec![1.0, 0.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn test_unknown_cycle() {
        match prepare_sequence(
            &table(),
            "B0006",
            1,
            &features(),
            &StandardScaler::identity(2),
            4,
        )
        .unwrap_err()
        {
            BatteryError::CycleNotFound {
                battery_id,
                cycle_number,
            } => {
                assert_eq!(battery_id, "B0006");
                assert_eq!(cycle_number, 1);
            }
            other => panic!("Expected CycleNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_battery_id_case_is_ignored() {
        let df = DataFrame::new(vec![
            Column::new(COL_BATTERY_ID.into(), vec!["b0005", "b0005", "B0006"]),
            Column::new(COL_CYCLE_NUMBER.into(), vec![3i64, 3, 3]),
            Column::new("v".into(), vec![3.5, 3.4, 9.0]),
            Column::new("t".into(), vec![0.0, 10.0, 0.0]),
        ])
        .unwrap();

        let seq =
            prepare_sequence(&df, "B0005", 3, &features(), &StandardScaler::identity(2), 3).unwrap();
        assert_eq!(seq, vec![vec![3.5, 0.0], vec![3.4, 10.0], vec![0.0, 0.0]]);

        let seq =
            prepare_sequence(&df, "b0006", 3, &features(), &StandardScaler::identity(2), 1).unwrap();
        assert_eq!(seq, vec![vec![9.0, 0.0]]);

        assert!(matches!(
            prepare_sequence(&df, "B0007", 3, &features(), &StandardScaler::identity(2), 1),
            Err(BatteryError::CycleNotFound { .. })
        ));
    }

    #[test]
    fn test_table_without_battery_column() {
        let df = table().drop(COL_BATTERY_ID).unwrap();

        let seq =
            prepare_sequence(&df, "B0005", 2, &features(), &StandardScaler::identity(2), 3).unwrap();

        assert_eq!(seq[2], vec![9.0, 0.0]);
    }

    #[test]
    fn test_missing_feature_column() {
        let cols = vec!["v".to_string(), "voltage_measured_smooth".to_string()];
        assert!(matches!(
            prepare_sequence(&table(), "B0005", 1, &cols, &StandardScaler::identity(2), 2),
            Err(BatteryError::Prediction { .. })
        ));
    }
}
