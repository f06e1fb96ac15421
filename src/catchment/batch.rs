use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use geo::Point;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregate::CatchmentAggregator;
use super::estimate::FallbackEstimator;
use super::record::{CatchmentRecord, DataSource};
use crate::config::CatchmentConfig;
use crate::crs::Crs;
use crate::error::{CatchmentError, FailureReason, Result};
use crate::feature::Feature;
use crate::proj::Projector;
use crate::raster::{RasterGrid, RasterSummary};

/// Shared flag that stops a running batch before its next feature.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }

    #[inline] pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// How a batch is executed. Results do not depend on these.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Process features on rayon's thread pool.
    pub parallel: bool,
    pub cancel: Option<CancelToken>,
}

impl BatchOptions {
    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Records of a batch, grouped by feature in input order and by radius within a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentTable {
    records: Vec<CatchmentRecord>,
    radii_m: Vec<f64>,
    features_total: usize,
    features_processed: usize,
    cancelled: bool,
}

impl CatchmentTable {
    #[inline] pub fn records(&self) -> &[CatchmentRecord] { &self.records }

    #[inline] pub fn into_records(self) -> Vec<CatchmentRecord> { self.records }

    #[inline] pub fn radii_m(&self) -> &[f64] { &self.radii_m }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Features submitted to the batch.
    #[inline] pub fn features_total(&self) -> usize { self.features_total }

    /// Features whose records made it into the table.
    #[inline] pub fn features_processed(&self) -> usize { self.features_processed }

    /// True when the batch was stopped early; missing features have no records at all.
    #[inline] pub fn is_cancelled(&self) -> bool { self.cancelled }

    /// Records of one feature, one per radius.
    pub fn feature_records(&self, feature_id: &str) -> impl Iterator<Item = &CatchmentRecord> {
        self.records.iter().filter(move |r| r.feature_id.as_str() == feature_id)
    }

    /// Aggregate statistics of the table. Failed records are counted but never averaged.
    pub fn summary(&self, raster: Option<RasterSummary>) -> BatchSummary {
        let mut data_sources = BTreeMap::new();
        let mut coverage = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for record in &self.records {
            match record.status.failure_reason() {
                None => *data_sources.entry(record.data_source.as_str().to_string()).or_insert(0) += 1,
                Some(reason) => *failures.entry(reason.as_str().to_string()).or_insert(0) += 1,
            }
            if let Some(flag) = record.coverage {
                *coverage.entry(flag.as_str().to_string()).or_insert(0) += 1;
            }
        }

        let per_radius = self.radii_m.iter()
            .map(|&radius_m| {
                let ok = self.records.iter()
                    .filter(|r| r.radius_m == radius_m && r.is_ok())
                    .collect::<Vec<_>>();
                let n = ok.len() as f64;
                let total = ok.iter().fold(0.0, |acc, r| acc + r.population_total);
                let density = ok.iter().fold(0.0, |acc, r| acc + r.population_density_per_hectare);
                RadiusSummary {
                    radius_m,
                    records: ok.len(),
                    mean_population_total: (!ok.is_empty()).then(|| total / n),
                    mean_density_per_hectare: (!ok.is_empty()).then(|| density / n),
                    max_population_total: ok.iter().map(|r| r.population_total).reduce(f64::max),
                }
            })
            .collect();

        BatchSummary {
            features: self.features_total,
            features_processed: self.features_processed,
            cancelled: self.cancelled,
            radii_m: self.radii_m.clone(),
            records: self.records.len(),
            data_sources,
            coverage,
            failures,
            per_radius,
            raster,
        }
    }
}

/// Per-radius averages over successful records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiusSummary {
    pub radius_m: f64,
    pub records: usize,
    pub mean_population_total: Option<f64>,
    pub mean_density_per_hectare: Option<f64>,
    pub max_population_total: Option<f64>,
}

/// Batch-level summary, written alongside the tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub features: usize,
    pub features_processed: usize,
    pub cancelled: bool,
    pub radii_m: Vec<f64>,
    pub records: usize,
    pub data_sources: BTreeMap<String, usize>,
    pub coverage: BTreeMap<String, usize>,
    pub failures: BTreeMap<String, usize>,
    pub per_radius: Vec<RadiusSummary>,
    pub raster: Option<RasterSummary>,
}

/// Compute catchment records for every feature and radius.
///
/// With a raster the figures are measured; without one they are estimated
/// when `config.allow_fallback` is set, otherwise the batch fails with
/// `RasterUnavailable`. Configuration problems fail before any feature runs.
pub fn run_batch(features: &[Feature], raster: Option<&RasterGrid>, config: &CatchmentConfig, options: &BatchOptions) -> Result<CatchmentTable> {
    config.validate()?;
    let radii = config.radii_m.as_slice();

    match raster {
        Some(raster) => run_measured(features, raster, config, options),
        None if config.allow_fallback => run_estimated(features, config, options),
        None => Err(CatchmentError::RasterUnavailable),
    }
    .inspect(|table| info!(
        features = table.features_total(), processed = table.features_processed(),
        records = table.len(), cancelled = table.is_cancelled(), radii = ?radii,
        "catchment batch finished",
    ))
}

/// Metric frame for a raster batch: configured, else the raster's own UTM zone, else chosen from the features.
fn metric_crs_for(features: &[Feature], raster: &RasterGrid, configured: Option<Crs>) -> Result<Crs> {
    match (configured, raster.crs()) {
        (Some(crs), raster_crs) if raster_crs.is_metric() && raster_crs != crs => Err(CatchmentError::InvalidConfig(format!(
            "raster is in {raster_crs} but metric_crs is {crs}"
        ))),
        (Some(crs), _) => Ok(crs),
        (None, raster_crs) if raster_crs.is_metric() => Ok(raster_crs),
        (None, _) => Projector::for_features(features, None).map(|p| p.metric_crs()),
    }
}

fn run_measured(features: &[Feature], raster: &RasterGrid, config: &CatchmentConfig, options: &BatchOptions) -> Result<CatchmentTable> {
    if features.is_empty() { return Ok(table(config, 0, Vec::new(), options)) }

    let metric_crs = metric_crs_for(features, raster, config.metric_crs)?;
    info!(features = features.len(), raster_crs = %raster.crs(), %metric_crs, parallel = options.parallel, "measuring catchments");

    let radii = config.radii_m.as_slice();
    let per_feature = if options.parallel {
        features.par_iter()
            .map_init(
                || Projector::new(metric_crs),
                |projector, feature| {
                    if options.cancelled() { return None }
                    let projector = match projector {
                        Ok(projector) => projector,
                        Err(e) => return Some(Err(e.clone())),
                    };
                    let aggregator = CatchmentAggregator::new(raster, projector, config.buffer_segments, config.coverage_mode);
                    Some(aggregator.aggregate(feature, radii))
                },
            )
            .collect::<Vec<_>>()
    } else {
        let projector = Projector::new(metric_crs)?;
        let aggregator = CatchmentAggregator::new(raster, &projector, config.buffer_segments, config.coverage_mode);
        features.iter()
            .map(|feature| (!options.cancelled()).then(|| aggregator.aggregate(feature, radii)))
            .collect::<Vec<_>>()
    };

    let records = per_feature.into_iter()
        .flatten()
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    Ok(table(config, features.len(), records, options))
}

fn run_estimated(features: &[Feature], config: &CatchmentConfig, options: &BatchOptions) -> Result<CatchmentTable> {
    let estimator = FallbackEstimator::new(&config.fallback)?;
    warn!(features = features.len(), "no raster supplied, estimating from density model");

    // Only used to report lon/lat for features declared in a metric frame.
    let projector = match config.metric_crs {
        Some(crs) => Some(Projector::new(crs)?),
        None => None,
    };

    // Locations are resolved up front so workers share only the estimator.
    let located = features.iter()
        .map(|feature| {
            let point = feature.geometry.representative_point()?;
            Some(geographic_location(feature, point, projector.as_ref()))
        })
        .collect::<Vec<_>>();

    let radii = config.radii_m.as_slice();
    let estimate = |(feature, location): (&Feature, &Option<Option<Point<f64>>>)| -> Option<Vec<CatchmentRecord>> {
        if options.cancelled() { return None }
        Some(match location {
            Some(location) => estimator.estimate_all(feature, *location, radii),
            None => {
                warn!(feature = %feature.id, "skipping feature with degenerate geometry");
                radii.iter()
                    .map(|&r| CatchmentRecord::failed(feature, None, r, DataSource::Estimated, FailureReason::DegenerateGeometry))
                    .collect()
            }
        })
    };

    let per_feature = if options.parallel {
        features.par_iter().zip(located.par_iter()).map(estimate).collect::<Vec<_>>()
    } else {
        features.iter().zip(located.iter()).map(estimate).collect::<Vec<_>>()
    };

    let records = per_feature.into_iter().flatten().flatten().collect();
    Ok(table(config, features.len(), records, options))
}

/// WGS84 position of a representative point, when it can be determined.
fn geographic_location(feature: &Feature, point: Point<f64>, projector: Option<&Projector>) -> Option<Point<f64>> {
    match (feature.crs, projector) {
        (Some(Crs::Geographic), _) => Some(point),
        (Some(crs), Some(projector)) => projector.point_to_geographic(point, crs)
            .inspect_err(|e| debug!(feature = %feature.id, error = %e, "no geographic location"))
            .ok(),
        _ => None,
    }
}

fn table(config: &CatchmentConfig, features_total: usize, records: Vec<CatchmentRecord>, options: &BatchOptions) -> CatchmentTable {
    let radii = config.radii_m.len();
    let features_processed = records.len() / radii;
    CatchmentTable {
        records,
        radii_m: config.radii_m.clone(),
        features_total,
        features_processed,
        cancelled: options.cancelled() && features_processed < features_total,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::point;

    use super::*;
    use crate::feature::Category;
    use crate::raster::GeoTransform;

    fn features(n: usize) -> Vec<Feature> {
        (0..n)
            .map(|i| Feature::new(format!("f{i}"), Category::Retail, point!(x: 77.60 + i as f64 * 0.001, y: 12.93)))
            .collect()
    }

    fn geographic_raster() -> RasterGrid {
        let res = 0.0005;
        RasterGrid::from_vec(vec![3.0; 200 * 200], 200, 200, GeoTransform::north_up(77.55, 12.98, res, -res), Crs::Geographic, None).unwrap()
    }

    #[test]
    fn missing_raster_without_fallback_fails() {
        let config = CatchmentConfig { allow_fallback: false, ..Default::default() };
        let result = run_batch(&features(2), None, &config, &BatchOptions::default());
        assert!(matches!(result, Err(CatchmentError::RasterUnavailable)));
    }

    #[test]
    fn invalid_radius_fails_before_processing() {
        let config = CatchmentConfig { radii_m: vec![100.0, -1.0], ..Default::default() };
        let result = run_batch(&features(2), Some(&geographic_raster()), &config, &BatchOptions::default());
        assert!(matches!(result, Err(CatchmentError::InvalidRadius(_))));
    }

    #[test]
    fn fallback_records_are_estimated() {
        let mut config = CatchmentConfig::default();
        config.fallback.seed = Some(1);
        let table = run_batch(&features(3), None, &config, &BatchOptions::default()).unwrap();
        assert_eq!(table.len(), 9);
        assert!(table.records().iter().all(|r| r.data_source == DataSource::Estimated));
        assert_eq!(table.records()[0].latitude, Some(12.93));
    }

    #[test]
    fn records_ordered_by_feature_then_radius() {
        let config = CatchmentConfig::default();
        let table = run_batch(&features(4), Some(&geographic_raster()), &config, &BatchOptions::default()).unwrap();
        let order = table.records().iter()
            .map(|r| (r.feature_id.to_string(), r.radius_m))
            .collect::<Vec<_>>();
        let expected = (0..4)
            .flat_map(|i| config.radii_m.iter().map(move |&r| (format!("f{i}"), r)))
            .collect::<Vec<_>>();
        assert_eq!(order, expected);
    }

    #[test]
    fn parallel_matches_sequential() {
        let config = CatchmentConfig::default();
        let raster = geographic_raster();
        let sequential = run_batch(&features(12), Some(&raster), &config, &BatchOptions::default()).unwrap();
        let parallel = run_batch(&features(12), Some(&raster), &config, &BatchOptions { parallel: true, cancel: None }).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn cancelled_batch_drops_remaining_features() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = BatchOptions { parallel: false, cancel: Some(cancel) };
        let table = run_batch(&features(5), Some(&geographic_raster()), &CatchmentConfig::default(), &options).unwrap();
        assert!(table.is_empty());
        assert!(table.is_cancelled());
        assert_eq!(table.features_processed(), 0);
        assert_eq!(table.features_total(), 5);
    }

    #[test]
    fn mismatched_metric_crs_rejected() {
        let raster = RasterGrid::from_vec(vec![1.0; 4], 2, 2, GeoTransform::north_up(0.0, 2.0, 1.0, -1.0), Crs::Utm { zone: 44, south: false }, None).unwrap();
        let config = CatchmentConfig { metric_crs: Some(Crs::Utm { zone: 43, south: false }), ..Default::default() };
        let result = run_batch(&features(1), Some(&raster), &config, &BatchOptions::default());
        assert!(matches!(result, Err(CatchmentError::InvalidConfig(_))));
    }

    #[test]
    fn summary_averages_successful_records() {
        let mut config = CatchmentConfig { radii_m: vec![100.0], ..Default::default() };
        config.fallback.variation_range = (1.0, 1.0);
        let table = run_batch(&features(2), None, &config, &BatchOptions::default()).unwrap();
        let summary = table.summary(None);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.data_sources.get("estimated"), Some(&2));
        let expected = std::f64::consts::PI * 0.01 * 6000.0;
        assert_relative_eq!(summary.per_radius[0].mean_population_total.unwrap(), expected, max_relative = 1e-12);
    }
}
