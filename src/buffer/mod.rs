use std::f64::consts::TAU;

use geo::{Coord, LineString, Point, Polygon};

use crate::config::MIN_BUFFER_SEGMENTS;
use crate::crs::Crs;
use crate::error::{CatchmentError, Result};
use crate::feature::Feature;
use crate::proj::Projector;

/// A circle approximation of `radius_m` around a feature, in `crs`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferPolygon {
    pub radius_m: f64,
    pub polygon: Polygon<f64>,
    pub crs: Crs,
}

/// The representative point of a feature in both frames the buffers need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferCenter {
    /// Centre in the projector's metric frame.
    pub metric: Point<f64>,
    /// Centre in WGS84 lon/lat.
    pub geographic: Point<f64>,
}

/// Builds circular buffers around features.
#[derive(Debug)]
pub struct BufferGenerator<'a> {
    projector: &'a Projector,
    segments: usize,
}

impl<'a> BufferGenerator<'a> {
    pub fn new(projector: &'a Projector, segments: usize) -> Self {
        Self { projector, segments: segments.max(MIN_BUFFER_SEGMENTS) }
    }

    #[inline] pub fn segments(&self) -> usize { self.segments }

    /// Locate a feature's representative point in the metric and geographic frames.
    pub fn center(&self, feature: &Feature) -> Result<BufferCenter> {
        let point = feature.geometry.representative_point()
            .ok_or_else(|| CatchmentError::DegenerateGeometry(feature.id.to_string()))?;
        let source = feature.crs
            .ok_or_else(|| CatchmentError::Projection(format!("feature {} has no declared reference system", feature.id)))?;

        Ok(BufferCenter {
            metric: self.projector.point_to_metric(point, source)?,
            geographic: self.projector.point_to_geographic(point, source)?,
        })
    }

    /// One buffer per radius, each expressed in `target` (normally the raster's CRS).
    ///
    /// The centre is projected once and shared; every radius is otherwise independent.
    pub fn buffers(&self, feature: &Feature, radii_m: &[f64], target: Crs) -> Result<Vec<BufferPolygon>> {
        validate_radii(radii_m)?;
        let center = self.center(feature)?;
        radii_m.iter()
            .map(|&radius| self.buffer_around(&center, radius, target))
            .collect()
    }

    /// Build a single buffer around an already projected centre.
    pub fn buffer_around(&self, center: &BufferCenter, radius_m: f64, target: Crs) -> Result<BufferPolygon> {
        validate_radii(&[radius_m])?;
        let ring = circle_ring(center.metric.0, radius_m, self.segments);
        let metric = self.projector.metric_crs();
        let polygon = self.projector.polygon_to(&Polygon::new(ring, vec![]), metric, target)?;
        Ok(BufferPolygon { radius_m, polygon, crs: target })
    }
}

/// Every radius must be positive and finite.
pub fn validate_radii(radii_m: &[f64]) -> Result<()> {
    match radii_m.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
        Some(&bad) => Err(CatchmentError::InvalidRadius(bad)),
        None => Ok(()),
    }
}

/// Closed counter-clockwise ring of `segments` vertices on a circle.
fn circle_ring(center: Coord<f64>, radius: f64, segments: usize) -> LineString<f64> {
    let mut coords = (0..segments)
        .map(|i| {
            let theta = TAU * i as f64 / segments as f64;
            Coord { x: center.x + radius * theta.cos(), y: center.y + radius * theta.sin() }
        })
        .collect::<Vec<_>>();
    coords.push(coords[0]);
    LineString(coords)
}
