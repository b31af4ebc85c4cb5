//! Input discovery for battery record files
//!
//! The input is either one `.mat` file or a directory holding them. Only
//! the top level of a directory is searched.

use crate::constants::MAT_EXTENSION;
use crate::error::{BatteryError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File discovery component for battery datasets
#[derive(Debug)]
pub struct FileDiscovery {
    input_path: PathBuf,
}

impl FileDiscovery {
    pub fn new(input_path: PathBuf) -> Self {
        Self { input_path }
    }

    /// Discover all MAT-files, sorted by path
    pub async fn discover_mat_files(&self) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(&self.input_path)
            .await
            .map_err(|_| BatteryError::InputNotFound {
                path: self.input_path.clone(),
            })?;

        if metadata.is_file() {
            return Ok(vec![self.input_path.clone()]);
        }

        debug!("Searching for MAT-files in: {}", self.input_path.display());

        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.input_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_mat_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        debug!("Found {} MAT-files", files.len());
        Ok(files)
    }
}

/// Check if a path has a `.mat` extension, ignoring case
fn is_mat_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(MAT_EXTENSION))
}
