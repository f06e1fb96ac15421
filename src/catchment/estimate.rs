use geo::Point;
use rand::{Rng, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};

use super::record::{CatchmentRecord, DataSource};
use crate::config::FallbackConfig;
use crate::error::Result;
use crate::feature::{Feature, FeatureId};

/// Density-model estimate used when no raster is available.
///
/// `total = π (r / 1000)² · density · factor`, with `factor` drawn once per
/// (feature, radius) from `variation_range`. With a seed the draw depends
/// only on the seed, feature id and radius, so results do not change with
/// iteration order or thread count.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackEstimator {
    density_per_km2: f64,
    variation_range: (f64, f64),
    seed: Option<u64>,
}

impl FallbackEstimator {
    pub fn new(config: &FallbackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            density_per_km2: config.density_per_km2,
            variation_range: config.variation_range,
            seed: config.seed,
        })
    }

    #[inline] pub fn density_per_km2(&self) -> f64 { self.density_per_km2 }

    #[inline] pub fn variation_range(&self) -> (f64, f64) { self.variation_range }

    /// Variation factor for a (feature, radius) pair.
    pub fn variation_factor(&self, feature_id: &FeatureId, radius_m: f64) -> f64 {
        let (low, high) = self.variation_range;
        if low == high { return low }
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(stream_seed(seed, feature_id, radius_m)).random_range(low..=high),
            None => rand::rng().random_range(low..=high),
        }
    }

    /// Estimated record for one radius. `location` is the WGS84 representative point, if known.
    pub fn estimate(&self, feature: &Feature, location: Option<Point<f64>>, radius_m: f64) -> CatchmentRecord {
        let radius_km = radius_m / 1000.0;
        let factor = self.variation_factor(&feature.id, radius_m);
        let total = std::f64::consts::PI * radius_km * radius_km * self.density_per_km2 * factor;
        CatchmentRecord::for_feature(feature, location, radius_m, DataSource::Estimated).with_total(total)
    }

    /// Estimated records for every radius, in order.
    pub fn estimate_all(&self, feature: &Feature, location: Option<Point<f64>>, radii_m: &[f64]) -> Vec<CatchmentRecord> {
        radii_m.iter().map(|&r| self.estimate(feature, location, r)).collect()
    }
}

/// Seed of the per-(feature, radius) stream.
fn stream_seed(seed: u64, feature_id: &FeatureId, radius_m: f64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(feature_id.as_str().as_bytes());
    hasher.update(radius_m.to_bits().to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::point;

    use super::*;
    use crate::error::CatchmentError;
    use crate::feature::Category;

    fn feature(id: &str) -> Feature {
        Feature::new(id, Category::FoodBeverage, point!(x: 77.62, y: 12.93))
    }

    fn estimator(range: (f64, f64), seed: Option<u64>) -> FallbackEstimator {
        FallbackEstimator::new(&FallbackConfig { density_per_km2: 6000.0, variation_range: range, seed }).unwrap()
    }

    #[test]
    fn unit_range_gives_exact_formula() {
        let estimator = estimator((1.0, 1.0), None);
        let record = estimator.estimate(&feature("a"), None, 500.0);
        assert_eq!(record.population_total, std::f64::consts::PI * 0.5 * 0.5 * 6000.0);
        assert_eq!(record.data_source, DataSource::Estimated);
    }

    #[test]
    fn factor_stays_in_range() {
        let estimator = estimator((0.8, 1.2), None);
        for radius in [100.0, 200.0, 500.0, 1000.0] {
            let factor = estimator.variation_factor(&FeatureId::new("x"), radius);
            assert!((0.8..=1.2).contains(&factor));
        }
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let a = estimator((0.8, 1.2), Some(7));
        let b = estimator((0.8, 1.2), Some(7));
        let id = FeatureId::new("node/123");
        assert_eq!(a.variation_factor(&id, 200.0), b.variation_factor(&id, 200.0));

        // Different pairs draw from different streams.
        let draws = [100.0, 200.0, 500.0].map(|r| a.variation_factor(&id, r));
        assert!(draws[0] != draws[1] || draws[1] != draws[2]);
    }

    #[test]
    fn density_is_derived_from_total() {
        let record = estimator((1.0, 1.0), None).estimate(&feature("a"), None, 100.0);
        // 6000 people/km² is 60 people/ha.
        assert_relative_eq!(record.population_density_per_hectare, 60.0, max_relative = 1e-12);
    }

    #[test]
    fn invalid_range_rejected() {
        let config = FallbackConfig { variation_range: (-0.1, 1.0), ..Default::default() };
        assert!(matches!(FallbackEstimator::new(&config), Err(CatchmentError::InvalidConfig(_))));
    }
}
