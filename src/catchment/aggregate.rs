use geo::Point;
use tracing::warn;

use super::record::{CatchmentRecord, DataSource};
use crate::buffer::{BufferCenter, BufferGenerator, validate_radii};
use crate::config::CoverageMode;
use crate::error::{CatchmentError, FailureReason, Result};
use crate::feature::Feature;
use crate::proj::Projector;
use crate::raster::{CellValue, RasterGrid};

/// Measures raster population inside buffers around features.
///
/// Holds the raster by reference; it is read but never modified, so one
/// raster can back several aggregators on different threads.
#[derive(Debug)]
pub struct CatchmentAggregator<'a> {
    raster: &'a RasterGrid,
    buffers: BufferGenerator<'a>,
    mode: CoverageMode,
}

impl<'a> CatchmentAggregator<'a> {
    pub fn new(raster: &'a RasterGrid, projector: &'a Projector, segments: usize, mode: CoverageMode) -> Self {
        Self { raster, buffers: BufferGenerator::new(projector, segments), mode }
    }

    #[inline] pub fn raster(&self) -> &RasterGrid { self.raster }

    #[inline] pub fn coverage_mode(&self) -> CoverageMode { self.mode }

    /// One record per radius, in the order given.
    ///
    /// Invalid radii fail the whole call. Degenerate geometry or projection
    /// failures become failed records, one per radius, and are logged.
    pub fn aggregate(&self, feature: &Feature, radii_m: &[f64]) -> Result<Vec<CatchmentRecord>> {
        validate_radii(radii_m)?;

        let center = match self.buffers.center(feature) {
            Ok(center) => center,
            Err(e) => return Ok(self.failed_all(feature, None, radii_m, &e)),
        };
        let location = Some(center.geographic);
        let value_at_location = self.raster.value_at(self.in_raster_frame(&center)).value();

        Ok(radii_m.iter()
            .map(|&radius| match self.measure(feature, &center, radius) {
                Ok(record) => CatchmentRecord { value_at_location, ..record },
                Err(e) => {
                    warn!(feature = %feature.id, radius, error = %e, "buffer failed");
                    CatchmentRecord::failed(feature, location, radius, DataSource::Measured, reason_of(&e))
                }
            })
            .collect())
    }

    /// Sample a single buffer and build its record.
    fn measure(&self, feature: &Feature, center: &BufferCenter, radius_m: f64) -> Result<CatchmentRecord> {
        let buffer = self.buffers.buffer_around(center, radius_m, self.raster.crs())?;
        let sample = self.raster.sample(&buffer.polygon, self.mode);
        let record = CatchmentRecord::for_feature(feature, Some(center.geographic), radius_m, DataSource::Measured)
            .with_total(sample.weighted_sum());
        Ok(CatchmentRecord { coverage: Some(sample.coverage()), cells_sampled: sample.cells.len(), ..record })
    }

    /// The representative point expressed in the raster's reference system.
    fn in_raster_frame(&self, center: &BufferCenter) -> Point<f64> {
        if self.raster.crs().is_geographic() { center.geographic } else { center.metric }
    }

    fn failed_all(&self, feature: &Feature, location: Option<Point<f64>>, radii_m: &[f64], error: &CatchmentError) -> Vec<CatchmentRecord> {
        warn!(feature = %feature.id, error = %error, "skipping feature");
        let reason = reason_of(error);
        radii_m.iter()
            .map(|&radius| CatchmentRecord::failed(feature, location, radius, DataSource::Measured, reason))
            .collect()
    }

    /// Raster value under a feature's representative point.
    pub fn value_at_location(&self, feature: &Feature) -> Result<CellValue> {
        let center = self.buffers.center(feature)?;
        Ok(self.raster.value_at(self.in_raster_frame(&center)))
    }
}

/// Per-feature errors map to their reason code; anything else counts as a projection failure.
fn reason_of(error: &CatchmentError) -> FailureReason {
    error.failure_reason().unwrap_or(FailureReason::Projection)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{point, polygon};

    use super::*;
    use crate::crs::Crs;
    use crate::feature::Category;
    use crate::raster::{Coverage, GeoTransform};

    const ZONE_43N: Crs = Crs::Utm { zone: 43, south: false };

    /// 40×40 grid of 50 m cells in UTM 43N, every cell holding `value`.
    fn metric_raster(projector: &Projector, value: f64) -> RasterGrid {
        let c = projector.point_to_metric(point!(x: 77.62, y: 12.93), Crs::Geographic).unwrap();
        let origin = (c.x() - 1000.0, c.y() + 1000.0);
        RasterGrid::from_vec(vec![value; 1600], 40, 40, GeoTransform::north_up(origin.0, origin.1, 50.0, -50.0), ZONE_43N, Some(-1.0)).unwrap()
    }

    fn cafe() -> Feature {
        Feature::new("cafe", Category::FoodBeverage, point!(x: 77.62, y: 12.93))
    }

    #[test]
    fn totals_grow_with_radius() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 4.0);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);

        let records = aggregator.aggregate(&cafe(), &[100.0, 200.0, 500.0]).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].population_total <= w[1].population_total));

        // Uniform 4 people per 2500 m² cell: total ≈ 4 · polygon area / 2500.
        for record in &records {
            let expected = 4.0 * std::f64::consts::PI * record.radius_m.powi(2) / 2500.0;
            assert_relative_eq!(record.population_total, expected, max_relative = 0.01);
            assert_eq!(record.coverage, Some(Coverage::Full));
            assert_eq!(record.value_at_location, Some(4.0));
            assert_eq!(record.data_source, DataSource::Measured);
        }
    }

    #[test]
    fn outside_raster_is_no_coverage() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 4.0);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);

        let far = Feature::new("far", Category::Retail, point!(x: 77.80, y: 13.10));
        let records = aggregator.aggregate(&far, &[100.0]).unwrap();
        assert_eq!(records[0].population_total, 0.0);
        assert_eq!(records[0].coverage, Some(Coverage::NoCoverage));
        assert_eq!(records[0].value_at_location, None);
        assert!(records[0].is_ok());
    }

    #[test]
    fn degenerate_polygon_yields_failed_records() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 4.0);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);

        let empty = Feature::new("empty", Category::Other, geo::Polygon::new(geo::LineString(vec![]), vec![]));
        let records = aggregator.aggregate(&empty, &[100.0, 200.0]).unwrap();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.status.failure_reason(), Some(FailureReason::DegenerateGeometry));
        }
    }

    #[test]
    fn projection_failure_yields_failed_records() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 4.0);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);

        let madrid = Feature::new("madrid", Category::Other, point!(x: -3.7, y: 40.4));
        let records = aggregator.aggregate(&madrid, &[100.0]).unwrap();
        assert_eq!(records[0].status.failure_reason(), Some(FailureReason::Projection));
    }

    #[test]
    fn invalid_radius_fails_the_call() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 4.0);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);
        assert!(matches!(aggregator.aggregate(&cafe(), &[100.0, 0.0]), Err(CatchmentError::InvalidRadius(_))));
    }

    #[test]
    fn polygon_and_centroid_point_agree() {
        let projector = Projector::new(ZONE_43N).unwrap();
        let raster = metric_raster(&projector, 2.5);
        let aggregator = CatchmentAggregator::new(&raster, &projector, 64, CoverageMode::Exact);

        let square = Feature::new("sq", Category::Retail, polygon![
            (x: 77.6195, y: 12.9295), (x: 77.6205, y: 12.9295), (x: 77.6205, y: 12.9305), (x: 77.6195, y: 12.9305),
        ]);
        let from_polygon = aggregator.aggregate(&square, &[200.0]).unwrap();
        let from_point = aggregator.aggregate(&cafe(), &[200.0]).unwrap();
        assert_relative_eq!(from_polygon[0].population_total, from_point[0].population_total, max_relative = 1e-9);
    }
}
