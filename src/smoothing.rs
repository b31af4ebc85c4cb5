//! Centered moving-average smoothing of the measured signals.
//!
//! The average restarts at every `(battery_id, cycle_number)` boundary so
//! that no window ever mixes samples from two cycles. Near a boundary the
//! window shrinks to the samples that exist.

use crate::constants::*;
use crate::error::{BatteryError, Result};
use polars::prelude::*;
use std::ops::Range;
use tracing::debug;

/// Measured columns that get a `*_smooth` companion
pub const SMOOTHED_SIGNALS: [&str; 3] = [
    COL_VOLTAGE_MEASURED,
    COL_CURRENT_MEASURED,
    COL_TEMPERATURE_MEASURED,
];

/// Name of the smoothed companion of `column`
pub fn smoothed_name(column: &str) -> String {
    format!("{}{}", column, SMOOTH_SUFFIX)
}

/// True when every smoothed column is already present
pub fn has_smoothed_columns(df: &DataFrame) -> bool {
    SMOOTHED_SIGNALS
        .iter()
        .all(|c| has_column(df, &smoothed_name(c)))
}

/// Return a copy of `df` with a smoothed column appended per measured signal
pub fn add_smoothed_columns(df: &DataFrame, window: usize) -> Result<DataFrame> {
    if window == 0 || window % 2 == 0 {
        return Err(BatteryError::Configuration {
            message: format!("smoothing window must be a positive odd number, got {}", window),
        });
    }

    let groups = cycle_groups(df)?;
    debug!(
        "Smoothing {} rows in {} cycle groups with window {}",
        df.height(),
        groups.len(),
        window
    );

    let mut out = df.clone();
    for column in SMOOTHED_SIGNALS {
        let values = f64_values(df, column)?;
        let smoothed = moving_average(&values, &groups, window);
        out.with_column(Column::new(smoothed_name(column).into(), smoothed))?;
    }
    Ok(out)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Contiguous row ranges sharing one battery and cycle
fn cycle_groups(df: &DataFrame) -> Result<Vec<Range<usize>>> {
    let cycles = df
        .column(COL_CYCLE_NUMBER)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let cycles: Vec<Option<i64>> = cycles.i64()?.iter().collect();

    let batteries: Vec<Option<String>> = if has_column(df, COL_BATTERY_ID) {
        df.column(COL_BATTERY_ID)?
            .as_materialized_series()
            .cast(&DataType::String)?
            .str()?
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    } else {
        vec![None; cycles.len()]
    };

    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=cycles.len() {
        let boundary = i == cycles.len() || cycles[i] != cycles[start] || batteries[i] != batteries[start];
        if boundary {
            groups.push(start..i);
            start = i;
        }
    }
    Ok(groups)
}

fn moving_average(values: &[f64], groups: &[Range<usize>], window: usize) -> Vec<f64> {
    let half = window / 2;
    let mut out = vec![f64::NAN; values.len()];
    for group in groups {
        for i in group.clone() {
            let lo = i.saturating_sub(half).max(group.start);
            let hi = (i + half + 1).min(group.end);
            let (sum, count) = values[lo..hi]
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if count > 0 {
                out[i] = sum / count as f64;
            }
        }
    }
    out
}
