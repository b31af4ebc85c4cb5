//! Record loader: locate the battery's top-level record and its cycle list.

use crate::constants::{CYCLE_FIELD, RESERVED_VARIABLE_PREFIX};
use crate::error::{BatteryError, Result};
use crate::matfile::{MatFile, MatStruct, MatValue};
use std::path::Path;
use tracing::{debug, warn};

/// Battery identifier encoded in the file name (`B0005.mat` -> `B0005`)
pub fn battery_id_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// One entry of the cycle list
#[derive(Debug, Clone, Copy)]
pub struct CycleRecord<'a> {
    /// 1-based position in the source list
    pub number: usize,
    cycles: &'a MatStruct,
    index: usize,
}

impl<'a> CycleRecord<'a> {
    pub fn field(&self, name: &str) -> Option<&'a MatValue> {
        self.cycles.field(self.index, name)
    }

    pub fn field_names(&self) -> &'a [String] {
        self.cycles.field_names()
    }
}

/// The resolved top-level record of one battery
#[derive(Debug)]
pub struct BatteryRecord<'a> {
    /// Key as stored in the file, used for the output `battery_id`
    pub battery_id: String,
    cycles: Option<&'a MatStruct>,
}

impl<'a> BatteryRecord<'a> {
    pub fn cycle_count(&self) -> usize {
        self.cycles.map(|c| c.len()).unwrap_or(0)
    }

    /// Cycles in source order
    pub fn cycles(&self) -> impl Iterator<Item = CycleRecord<'a>> + '_ {
        self.cycles.into_iter().flat_map(|cycles| {
            (0..cycles.len()).map(move |index| CycleRecord {
                number: index + 1,
                cycles,
                index,
            })
        })
    }
}

/// Locate the record for `requested_id`, exact name first, then ignoring case
pub fn resolve_record<'a>(file: &'a MatFile, requested_id: &str) -> Result<BatteryRecord<'a>> {
    let format_error = |reason: String, available_keys: Vec<String>| BatteryError::Format {
        path: file.path().to_path_buf(),
        battery_id: requested_id.to_string(),
        reason,
        available_keys,
    };

    let (key, value) = match file.variable(requested_id) {
        Some(value) => (requested_id.to_string(), value),
        None => {
            warn!(
                "Key '{}' not found in {}, trying case-insensitive match",
                requested_id,
                file.path().display()
            );
            let candidate = file.variables().iter().find(|(name, _)| {
                !name.starts_with(RESERVED_VARIABLE_PREFIX)
                    && name.eq_ignore_ascii_case(requested_id)
            });
            match candidate {
                Some((name, value)) => {
                    debug!("Using data key '{}'", name);
                    (name.clone(), value)
                }
                None => {
                    return Err(format_error(
                        format!("no top-level record named '{}'", requested_id),
                        file.variable_names().iter().map(|n| n.to_string()).collect(),
                    ));
                }
            }
        }
    };

    let record = value.as_struct().ok_or_else(|| {
        format_error(
            format!("record '{}' is a {}, not a struct", key, value.describe()),
            file.variable_names().iter().map(|n| n.to_string()).collect(),
        )
    })?;

    if !record.has_field(CYCLE_FIELD) {
        return Err(format_error(
            format!("'{}' field not found in '{}'", CYCLE_FIELD, key),
            record.field_names().to_vec(),
        ));
    }

    let cycles = match record.field(0, CYCLE_FIELD) {
        Some(MatValue::Struct(cycles)) => Some(cycles),
        // An empty cycle list may be stored as a bare []
        Some(value) if value.numel() == 0 => None,
        Some(value) => {
            return Err(format_error(
                format!("'{}' is a {}, not a struct array", CYCLE_FIELD, value.describe()),
                record.field_names().to_vec(),
            ));
        }
        None => {
            return Err(format_error(
                format!("record '{}' has no elements", key),
                record.field_names().to_vec(),
            ));
        }
    };

    Ok(BatteryRecord {
        battery_id: key,
        cycles,
    })
}
