//! Reader for MATLAB Level-5 MAT-files.
//!
//! Battery test rigs export their records as MAT-files: a 128-byte header
//! followed by one tagged element per variable. The reader loads the whole
//! file in one read and decodes every variable up front, so everything
//! after `open` is pure in-memory lookup.

mod decode;
mod value;

pub use decode::Endian;
pub use value::{MatStruct, MatValue};

use crate::error::{BatteryError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;
const VERSION_5: u16 = 0x0100;
const VERSION_73: u16 = 0x0200;

/// A fully decoded MAT-file
#[derive(Debug, Clone)]
pub struct MatFile {
    path: PathBuf,
    description: String,
    endian: Endian,
    variables: Vec<(String, MatValue)>,
}

impl MatFile {
    /// Read and decode a MAT-file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| BatteryError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path.to_path_buf(), &bytes)
    }

    /// Decode an in-memory MAT-file; `path` is only used for error context
    pub fn from_bytes(path: PathBuf, bytes: &[u8]) -> Result<Self> {
        let container_error = |reason: String| BatteryError::Container {
            path: path.clone(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(container_error(format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let endian = match &bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            _ => {
                return Err(container_error(
                    "missing endian indicator, not a Level-5 MAT-file".to_string(),
                ));
            }
        };

        match endian.version(&bytes[124..126]) {
            VERSION_5 => {}
            VERSION_73 => {
                return Err(container_error(
                    "MAT-file v7.3 (HDF5) is not supported; re-save with -v7".to_string(),
                ));
            }
            other => {
                return Err(container_error(format!(
                    "unsupported MAT-file version 0x{:04x}",
                    other
                )));
            }
        }

        let description = String::from_utf8_lossy(&bytes[..HEADER_TEXT_LEN])
            .trim_end_matches(['\0', ' '])
            .to_string();

        let variables = decode::decode_variables(&bytes[HEADER_LEN..], endian)
            .map_err(container_error)?;

        debug!(
            "Decoded {} variables from {} ({:?} endian)",
            variables.len(),
            path.display(),
            endian
        );

        Ok(Self {
            path,
            description,
            endian,
            variables,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header text, e.g. "MATLAB 5.0 MAT-file, Platform: ..."
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Variable names in file order
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&MatValue> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn variables(&self) -> &[(String, MatValue)] {
        &self.variables
    }
}
