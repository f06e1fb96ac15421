//! File formats the engine reads and writes, organized by format.
//!
//! - `geojson` - categorized features from a FeatureCollection
//! - `csv` - point features in, long-form and pivot record tables out
//! - `geotiff` - single-band population rasters
//! - `json` - batch summary

pub mod csv;
pub mod geojson;
pub mod geotiff;
pub mod json;

use std::path::Path;

use anyhow::{Result, bail};

use crate::feature::Feature;

/// Read features by file extension (`.geojson`/`.json` or `.csv`).
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("geojson" | "json") => geojson::read_features(path),
        Some("csv") => csv::read_features(path),
        _ => bail!("[io::read_features] Unsupported feature file {}: expected .geojson, .json or .csv", path.display()),
    }
}
