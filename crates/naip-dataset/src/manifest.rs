//! Tabular sample manifest.
//!
//! One CSV row per sample. Row order is the dataset index order.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use naip_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Columns every manifest must carry
pub const REQUIRED_COLUMNS: [&str; 4] = ["Latitude", "Longitude", "Image_Folder", "Type"];

/// A single manifest record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRow {
    /// Directory holding the raster bands
    #[serde(rename = "Image_Folder")]
    pub image_folder: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    /// Free-text land-cover category, e.g. `grassland-wetland`
    #[serde(rename = "Type", default)]
    pub category: String,
}

/// Fully loaded manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Reads a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::manifest(path, e))?;
        Self::from_reader(file, path)
    }

    /// Reads a manifest from any CSV source; `source` is only used in errors
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| Error::manifest(source, e))?
            .clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .collect();
        if !missing.is_empty() {
            return Err(Error::manifest(
                source,
                format!("missing required column(s): {}", missing.join(", ")),
            ));
        }

        let rows = csv_reader
            .deserialize()
            .enumerate()
            .map(|(i, record)| {
                record.map_err(|e| Error::manifest(source, format!("row {}: {e}", i + 1)))
            })
            .collect::<Result<Vec<ManifestRow>>>()?;

        debug!("Read {} manifest rows from {}", rows.len(), source.display());

        Ok(Self {
            path: source.to_path_buf(),
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ManifestRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
