//! Column names, instrument field names and defaults shared across the crate.

// Output table columns, in emission order
pub const COL_BATTERY_ID: &str = "battery_id";
pub const COL_CYCLE_NUMBER: &str = "cycle_number";
pub const COL_CYCLE_TYPE: &str = "cycle_type";
pub const COL_AMBIENT_TEMPERATURE: &str = "ambient_temperature";
pub const COL_TIME_RELATIVE: &str = "measurement_time_relative";
pub const COL_VOLTAGE_MEASURED: &str = "voltage_measured";
pub const COL_CURRENT_MEASURED: &str = "current_measured";
pub const COL_TEMPERATURE_MEASURED: &str = "temperature_measured";
pub const COL_VOLTAGE_LOAD_OR_CHARGE: &str = "voltage_load_or_charge";
pub const COL_CURRENT_LOAD_OR_CHARGE: &str = "current_load_or_charge";
pub const COL_CAPACITY: &str = "capacity";

pub const OUTPUT_COLUMNS: [&str; 11] = [
    COL_BATTERY_ID,
    COL_CYCLE_NUMBER,
    COL_CYCLE_TYPE,
    COL_AMBIENT_TEMPERATURE,
    COL_TIME_RELATIVE,
    COL_VOLTAGE_MEASURED,
    COL_CURRENT_MEASURED,
    COL_TEMPERATURE_MEASURED,
    COL_VOLTAGE_LOAD_OR_CHARGE,
    COL_CURRENT_LOAD_OR_CHARGE,
    COL_CAPACITY,
];

/// Suffix appended to smoothed copies of measured columns
pub const SMOOTH_SUFFIX: &str = "_smooth";

// Record layout written by the test rig
pub const CYCLE_FIELD: &str = "cycle";
pub const CYCLE_TYPE_FIELD: &str = "type";
pub const AMBIENT_TEMPERATURE_FIELD: &str = "ambient_temperature";
pub const MEASUREMENT_FIELD: &str = "data";

pub const FIELD_VOLTAGE_MEASURED: &str = "Voltage_measured";
pub const FIELD_CURRENT_MEASURED: &str = "Current_measured";
pub const FIELD_TEMPERATURE_MEASURED: &str = "Temperature_measured";
pub const FIELD_TIME: &str = "Time";
pub const FIELD_CURRENT_CHARGE: &str = "Current_charge";
pub const FIELD_VOLTAGE_CHARGE: &str = "Voltage_charge";
pub const FIELD_CURRENT_LOAD: &str = "Current_load";
pub const FIELD_VOLTAGE_LOAD: &str = "Voltage_load";
pub const FIELD_CAPACITY: &str = "Capacity";

pub const CYCLE_TYPE_CHARGE: &str = "charge";
pub const CYCLE_TYPE_DISCHARGE: &str = "discharge";
pub const CYCLE_TYPE_IMPEDANCE: &str = "impedance";

/// Variables whose names start with this are tool metadata, never battery records
pub const RESERVED_VARIABLE_PREFIX: &str = "__";

pub const MAT_EXTENSION: &str = "mat";
pub const CSV_EXTENSION: &str = "csv";

/// Wrapper levels the scalar unwrapper looks through before giving up
pub const MAX_SCALAR_NESTING: usize = 3;

pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Columns fed to the sequence model, in model order
pub const DEFAULT_SEQUENCE_FEATURES: [&str; 4] = [
    "voltage_measured_smooth",
    "current_measured_smooth",
    "temperature_measured_smooth",
    "measurement_time_relative",
];

/// Padded sequence lengths the per-battery models were trained with
pub const DEFAULT_MAX_SEQUENCE_LENGTHS: [(&str, usize); 3] =
    [("B0005", 371), ("B0006", 381), ("B0018", 328)];

pub const SOC_MIN: f64 = 0.0;
pub const SOC_MAX: f64 = 100.0;

/// Decimal places kept in reported health estimates
pub const PREDICTION_DECIMALS: i32 = 4;
