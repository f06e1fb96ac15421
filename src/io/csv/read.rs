//! CSV reading operations.

use std::{fs::File, io::Cursor, path::Path};

use ahash::AHashSet;
use anyhow::{Context, Result, anyhow, bail, ensure};
use geo::Point;
use polars::{frame::DataFrame, io::SerReader, prelude::CsvReadOptions};
use tracing::debug;

use crate::feature::{Attributes, Category, Feature, FeatureId};

/// Columns a feature CSV must carry.
const REQUIRED: [&str; 3] = ["id", "longitude", "latitude"];

/// Read a CSV file with every column as a string, so ids keep leading zeros.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Read a CSV string with every column as a string.
pub fn read_csv_string(csv: &str) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(csv.as_bytes()))
        .finish()
        .context("[io::csv::read] Failed to read CSV from string")
}

/// Read WGS84 point features from `id,name,category,amenity,longitude,latitude` rows.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    features_from_frame(&read_csv(path)?)
        .with_context(|| format!("[io::csv::read] Failed to read features from {}", path.display()))
}

/// Build point features from a string-typed frame. `name`, `category` and `amenity` are optional.
pub fn features_from_frame(df: &DataFrame) -> Result<Vec<Feature>> {
    let names = df.get_column_names_str();
    for column in REQUIRED {
        ensure!(names.contains(&column), "[io::csv::read] Missing required column {column:?}");
    }

    let text = |name: &str| -> Result<Vec<Option<String>>> {
        if !names.contains(&name) { return Ok(vec![None; df.height()]) }
        Ok(df.column(name)?.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
    };
    let (ids, lons, lats) = (text("id")?, text("longitude")?, text("latitude")?);
    let (feature_names, categories, amenities) = (text("name")?, text("category")?, text("amenity")?);

    let mut seen = AHashSet::with_capacity(df.height());
    let mut features = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let id = ids[row].as_deref().filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("[io::csv::read] Row {row} has no id"))?;
        let lon = parse_coordinate(lons[row].as_deref(), "longitude", row)?;
        let lat = parse_coordinate(lats[row].as_deref(), "latitude", row)?;
        if !seen.insert(id.to_string()) {
            bail!("[io::csv::read] Duplicate feature id {id}");
        }

        let category = match categories[row].as_deref() {
            None => Category::Other,
            Some(label) => label.parse().unwrap_or(Category::Other),
        };
        let mut attributes = Attributes::new();
        if let Some(name) = &feature_names[row] { attributes = attributes.with_text("name", name.as_str()) }
        if let Some(amenity) = &amenities[row] { attributes = attributes.with_text("amenity", amenity.as_str()) }

        features.push(Feature::new(FeatureId::new(id), category, Point::new(lon, lat)).with_attributes(attributes));
    }

    debug!(count = features.len(), "read CSV features");
    Ok(features)
}

fn parse_coordinate(value: Option<&str>, column: &str, row: usize) -> Result<f64> {
    let value = value.ok_or_else(|| anyhow!("[io::csv::read] Row {row} has no {column}"))?;
    value.trim().parse::<f64>()
        .with_context(|| format!("[io::csv::read] Row {row}: {column} {value:?} is not a number"))
}
