use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::catchment::BatchSummary;

/// Write the batch summary as pretty-printed JSON.
pub fn write_summary(summary: &BatchSummary, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::json::write] Failed to create summary file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("[io::json::write] Failed to write summary to {:?}", path))
}

/// Any serializable report (batch or raster summary) as pretty-printed JSON.
pub fn to_pretty_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("[io::json::write] Failed to serialize to JSON")
}

#[cfg(test)]
mod tests {
    use geo::point;
    use serde_json::Value;

    use super::*;
    use crate::catchment::{BatchOptions, run_batch};
    use crate::config::CatchmentConfig;
    use crate::feature::{Category, Feature};

    #[test]
    fn summary_fields_serialize() {
        let features = vec![Feature::new("a", Category::Retail, point!(x: 77.60, y: 12.93))];
        let table = run_batch(&features, None, &CatchmentConfig::default(), &BatchOptions::default()).unwrap();
        let json = to_pretty_string(&table.summary(None)).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["features"], 1);
        assert_eq!(value["records"], 3);
        assert_eq!(value["data_sources"]["estimated"], 3);
        assert_eq!(value["per_radius"].as_array().unwrap().len(), 3);
        assert_eq!(value["per_radius"][0]["radius_m"], 100.0);
        assert!(value["raster"].is_null());
    }
}
