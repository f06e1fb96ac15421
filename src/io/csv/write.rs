//! CSV writing operations.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{Column, CsvWriter, NamedFrom}, series::Series};

use crate::catchment::{CatchmentRecord, CatchmentTable};

/// Long-form output columns, in order.
pub const RECORD_COLUMNS: [&str; 14] = [
    "feature_id", "feature_name", "category", "latitude", "longitude", "radius",
    "population_total", "population_density_per_hectare", "data_source", "coverage_flag",
    "value_at_location", "cells_sampled", "status", "failure_reason",
];

/// Write a DataFrame to a CSV file.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::csv::write] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))
}

/// Write a DataFrame to a CSV string.
pub fn write_csv_string(df: &mut DataFrame) -> Result<String> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .finish(df)
        .context("[io::csv::write] Failed to write CSV to string")?;
    String::from_utf8(buffer).context("[io::csv::write] CSV output is not valid UTF-8")
}

/// One row per (feature, radius). Figures of failed records are left empty.
pub fn records_frame(records: &[CatchmentRecord]) -> Result<DataFrame> {
    let figure = |r: &CatchmentRecord, v: f64| r.is_ok().then_some(v);

    let columns: Vec<Column> = vec![
        Series::new(RECORD_COLUMNS[0].into(), records.iter().map(|r| r.feature_id.as_str()).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[1].into(), records.iter().map(|r| r.feature_name.as_str()).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[2].into(), records.iter().map(|r| r.category.as_str()).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[3].into(), records.iter().map(|r| r.latitude).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[4].into(), records.iter().map(|r| r.longitude).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[5].into(), records.iter().map(|r| r.radius_m).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[6].into(), records.iter().map(|r| figure(r, r.population_total)).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[7].into(), records.iter().map(|r| figure(r, r.population_density_per_hectare)).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[8].into(), records.iter().map(|r| r.data_source.as_str()).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[9].into(), records.iter().map(|r| r.coverage.map(|c| c.as_str())).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[10].into(), records.iter().map(|r| r.value_at_location).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[11].into(), records.iter().map(|r| r.cells_sampled as u64).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[12].into(), records.iter().map(|r| r.status.as_str()).collect::<Vec<_>>()).into(),
        Series::new(RECORD_COLUMNS[13].into(), records.iter().map(|r| r.status.failure_reason().map(|f| f.as_str())).collect::<Vec<_>>()).into(),
    ];

    DataFrame::new(columns).context("[io::csv::write] Failed to build record table")
}

/// One row per feature with `population_total_<r>m` and `population_density_<r>m` per radius.
pub fn wide_frame(table: &CatchmentTable) -> Result<DataFrame> {
    let features = table.records()
        .chunk_by(|a, b| a.feature_id == b.feature_id)
        .collect::<Vec<_>>();
    let heads = features.iter().filter_map(|records| records.first()).collect::<Vec<_>>();

    let mut columns: Vec<Column> = vec![
        Series::new("feature_id".into(), heads.iter().map(|r| r.feature_id.as_str()).collect::<Vec<_>>()).into(),
        Series::new("feature_name".into(), heads.iter().map(|r| r.feature_name.as_str()).collect::<Vec<_>>()).into(),
        Series::new("category".into(), heads.iter().map(|r| r.category.as_str()).collect::<Vec<_>>()).into(),
        Series::new("latitude".into(), heads.iter().map(|r| r.latitude).collect::<Vec<_>>()).into(),
        Series::new("longitude".into(), heads.iter().map(|r| r.longitude).collect::<Vec<_>>()).into(),
        Series::new("data_source".into(), heads.iter().map(|r| r.data_source.as_str()).collect::<Vec<_>>()).into(),
    ];

    for &radius in table.radii_m() {
        let at_radius = |value: fn(&CatchmentRecord) -> f64| features.iter()
            .map(|records| records.iter().find(|r| r.radius_m == radius && r.is_ok()).map(value))
            .collect::<Vec<_>>();
        columns.push(Series::new(format!("population_total_{radius}m").into(), at_radius(|r| r.population_total)).into());
        columns.push(Series::new(format!("population_density_{radius}m").into(), at_radius(|r| r.population_density_per_hectare)).into());
    }

    DataFrame::new(columns).context("[io::csv::write] Failed to build wide table")
}

/// Write the long-form table.
pub fn write_records(table: &CatchmentTable, path: &Path) -> Result<()> {
    write_csv(&mut records_frame(table.records())?, path)
}

/// Write the one-row-per-feature pivot.
pub fn write_wide(table: &CatchmentTable, path: &Path) -> Result<()> {
    write_csv(&mut wide_frame(table)?, path)
}
