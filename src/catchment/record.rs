use std::fmt;

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::error::FailureReason;
use crate::feature::{Category, Feature, FeatureId};
use crate::raster::Coverage;

/// Where a record's population figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Summed from a population raster.
    Measured,
    /// Derived from the density model because no raster was available.
    Estimated,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measured => "measured",
            Self::Estimated => "estimated",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Whether a (feature, radius) pair produced a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Ok,
    Failed(FailureReason),
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed(_) => "failed",
        }
    }

    #[inline] pub fn is_ok(&self) -> bool { matches!(self, Self::Ok) }

    #[inline]
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Ok => None,
            Self::Failed(reason) => Some(*reason),
        }
    }
}

/// Population statistics for one feature at one radius.
///
/// Failed records carry zero totals and no coverage; writers emit their
/// figures as empty cells and summaries skip them.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentRecord {
    pub feature_id: FeatureId,
    pub feature_name: String,
    pub category: Category,
    /// WGS84 latitude of the representative point.
    pub latitude: Option<f64>,
    /// WGS84 longitude of the representative point.
    pub longitude: Option<f64>,
    pub radius_m: f64,
    pub population_total: f64,
    pub population_density_per_hectare: f64,
    pub data_source: DataSource,
    /// `None` for estimated and failed records.
    pub coverage: Option<Coverage>,
    /// Raster value of the cell under the representative point.
    pub value_at_location: Option<f64>,
    /// Measured cells that contributed to the total.
    pub cells_sampled: usize,
    pub status: RecordStatus,
}

impl CatchmentRecord {
    /// Record with the feature's identity and location filled in and no figures yet.
    pub(crate) fn for_feature(feature: &Feature, location: Option<Point<f64>>, radius_m: f64, data_source: DataSource) -> Self {
        Self {
            feature_id: feature.id.clone(),
            feature_name: feature.name().to_string(),
            category: feature.category,
            latitude: location.map(|p| p.y()),
            longitude: location.map(|p| p.x()),
            radius_m,
            population_total: 0.0,
            population_density_per_hectare: 0.0,
            data_source,
            coverage: None,
            value_at_location: None,
            cells_sampled: 0,
            status: RecordStatus::Ok,
        }
    }

    /// Failed record for a (feature, radius) pair.
    pub(crate) fn failed(feature: &Feature, location: Option<Point<f64>>, radius_m: f64, data_source: DataSource, reason: FailureReason) -> Self {
        Self { status: RecordStatus::Failed(reason), ..Self::for_feature(feature, location, radius_m, data_source) }
    }

    /// Set the total and derive the per-hectare density from the buffer's nominal area.
    pub(crate) fn with_total(mut self, total: f64) -> Self {
        self.population_total = total;
        self.population_density_per_hectare = density_per_hectare(total, self.radius_m);
        self
    }

    #[inline] pub fn is_ok(&self) -> bool { self.status.is_ok() }
}

/// `total / (π r² / 10 000)`: people per hectare of a circle of radius `radius_m`.
#[inline]
pub fn density_per_hectare(total: f64, radius_m: f64) -> f64 {
    total / buffer_area_ha(radius_m)
}

/// Nominal area of a circular buffer in hectares.
#[inline]
pub fn buffer_area_ha(radius_m: f64) -> f64 {
    std::f64::consts::PI * radius_m * radius_m / 10_000.0
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::point;

    use super::*;

    #[test]
    fn density_uses_nominal_circle_area() {
        // A 100 m circle covers π hectares.
        assert_relative_eq!(buffer_area_ha(100.0), std::f64::consts::PI);
        assert_relative_eq!(density_per_hectare(std::f64::consts::PI * 50.0, 100.0), 50.0);
    }

    #[test]
    fn record_carries_feature_identity() {
        let feature = Feature::new("n42", Category::Healthcare, point!(x: 77.6, y: 12.9));
        let record = CatchmentRecord::for_feature(&feature, Some(point!(x: 77.6, y: 12.9)), 200.0, DataSource::Measured)
            .with_total(1000.0);
        assert_eq!(record.feature_id.as_str(), "n42");
        assert_eq!(record.feature_name, "Unknown");
        assert_eq!(record.latitude, Some(12.9));
        assert_eq!(record.longitude, Some(77.6));
        assert_relative_eq!(record.population_density_per_hectare, 1000.0 / (4.0 * std::f64::consts::PI));
        assert!(record.is_ok());
    }

    #[test]
    fn failed_record_has_reason() {
        let feature = Feature::new("n1", Category::Other, point!(x: 0.0, y: 0.0));
        let record = CatchmentRecord::failed(&feature, None, 100.0, DataSource::Measured, FailureReason::Projection);
        assert_eq!(record.status.as_str(), "failed");
        assert_eq!(record.status.failure_reason(), Some(FailureReason::Projection));
        assert_eq!(record.population_total, 0.0);
        assert_eq!(record.coverage, None);
    }
}
