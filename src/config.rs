use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::CatchmentError;

/// Fewest vertices a buffer ring may have.
pub const MIN_BUFFER_SEGMENTS: usize = 16;

/// Smallest margin kept around the features when clipping a raster, in degrees.
pub const DEFAULT_CLIP_MARGIN_DEG: f64 = 0.01;

/// How the sampler weights cells along a buffer's edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Weight each cell by the fraction of its area inside the buffer.
    #[default]
    Exact,
    /// Approximate: a cell counts fully iff its centre lies inside the buffer.
    ///
    /// A buffer smaller than a cell may contain no centre at all. It then
    /// samples zero cells and reports a total of 0 with `full` coverage even
    /// over populated cells, so choose a radius of at least one cell.
    CellCenter,
}

/// Parameters of the density-model fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Assumed residential density, people per km².
    pub density_per_km2: f64,
    /// Inclusive range the per-(feature, radius) variation factor is drawn from.
    pub variation_range: (f64, f64),
    /// Seed for reproducible estimates; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            density_per_km2: 6000.0,
            variation_range: (0.8, 1.2),
            seed: None,
        }
    }
}

/// Everything a batch needs to know, passed explicitly into each call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentConfig {
    /// Buffer radii in meters, in output order.
    pub radii_m: Vec<f64>,
    /// Projected frame used for buffering; chosen from the features when absent.
    pub metric_crs: Option<Crs>,
    /// Whether to estimate when no raster is supplied.
    pub allow_fallback: bool,
    pub coverage_mode: CoverageMode,
    /// Vertices per buffer ring (at least `MIN_BUFFER_SEGMENTS`).
    pub buffer_segments: usize,
    /// Least margin around the features when clipping a loaded raster, in degrees.
    /// Widened as needed so the largest radius never reaches the clip edge.
    pub clip_margin_deg: f64,
    pub fallback: FallbackConfig,
}

impl Default for CatchmentConfig {
    fn default() -> Self {
        Self {
            radii_m: vec![100.0, 200.0, 500.0],
            metric_crs: None,
            allow_fallback: true,
            coverage_mode: CoverageMode::Exact,
            buffer_segments: 64,
            clip_margin_deg: DEFAULT_CLIP_MARGIN_DEG,
            fallback: FallbackConfig::default(),
        }
    }
}

impl CatchmentConfig {
    /// Largest configured radius in meters (0 when none).
    pub fn max_radius_m(&self) -> f64 {
        self.radii_m.iter().copied().fold(0.0, f64::max)
    }

    /// Load a TOML configuration file; missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("[config] Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Check the configuration before any feature is touched.
    pub fn validate(&self) -> Result<(), CatchmentError> {
        if self.radii_m.is_empty() {
            return Err(CatchmentError::InvalidConfig("at least one radius is required".into()));
        }
        if let Some(&bad) = self.radii_m.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(CatchmentError::InvalidRadius(bad));
        }
        if self.buffer_segments < MIN_BUFFER_SEGMENTS {
            return Err(CatchmentError::InvalidConfig(format!(
                "buffer_segments = {} (minimum {MIN_BUFFER_SEGMENTS})", self.buffer_segments
            )));
        }
        if !(self.clip_margin_deg.is_finite() && self.clip_margin_deg >= 0.0) {
            return Err(CatchmentError::InvalidConfig(format!("clip_margin_deg = {}", self.clip_margin_deg)));
        }
        if let Some(crs) = self.metric_crs && !crs.is_metric() {
            return Err(CatchmentError::InvalidConfig(format!("metric_crs {crs} is not a projected system")));
        }
        self.fallback.validate()
    }
}

impl FallbackConfig {
    pub fn validate(&self) -> Result<(), CatchmentError> {
        let (low, high) = self.variation_range;
        if !(low.is_finite() && high.is_finite() && 0.0 <= low && low <= high) {
            return Err(CatchmentError::InvalidConfig(format!("variation_range = ({low}, {high})")));
        }
        if !(self.density_per_km2.is_finite() && self.density_per_km2 >= 0.0) {
            return Err(CatchmentError::InvalidConfig(format!("density_per_km2 = {}", self.density_per_km2)));
        }
        Ok(())
    }
}
