use geo::{Coord, MapCoords, Point, Polygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use tracing::debug;

use crate::crs::Crs;
use crate::error::{CatchmentError, Result};
use crate::feature::{Feature, FeatureGeometry, bounds_of};

/// Furthest a point may sit from the zone's central meridian, in degrees.
/// Twice the half-width of a zone, which keeps scale error well under 1%.
const MAX_MERIDIAN_OFFSET: f64 = 6.0;

/// UTM is defined between 80°S and 84°N.
const UTM_LAT_RANGE: (f64, f64) = (-80.0, 84.0);

/// Converts geometries between WGS84 lon/lat and one fixed UTM zone.
///
/// Built once per batch (or once per worker); PROJ.4 parsing is not repeated per feature.
pub struct Projector {
    metric_crs: Crs,
    geographic: Proj4,
    metric: Proj4,
}

impl Projector {
    /// Build a projector for the given metric CRS (must be a UTM zone).
    pub fn new(metric_crs: Crs) -> Result<Self> {
        if !metric_crs.is_metric() {
            return Err(CatchmentError::Projection(format!("{metric_crs} is not a projected metric system")));
        }

        let build = |crs: Crs| {
            let proj_string = crs.proj4();
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| CatchmentError::Projection(format!("failed to build PROJ.4 {proj_string}: {e:?}")))
        };

        Ok(Self {
            geographic: build(Crs::Geographic)?,
            metric: build(metric_crs)?,
            metric_crs,
        })
    }

    /// Use `configured` when given, otherwise pick the UTM zone at the centre of the features.
    pub fn for_features(features: &[Feature], configured: Option<Crs>) -> Result<Self> {
        let metric_crs = match configured {
            Some(crs) => crs,
            None => {
                let bounds = bounds_of(features, Crs::Geographic)
                    .ok_or_else(|| CatchmentError::Projection("no geographic features to choose a UTM zone from".into()))?;
                let center = bounds.center();
                Crs::utm_for(center.x, center.y)
            }
        };
        debug!(crs = %metric_crs, "selected metric reference system");
        Self::new(metric_crs)
    }

    #[inline] pub fn metric_crs(&self) -> Crs { self.metric_crs }

    /// Project a geometry into the metric frame.
    pub fn to_metric(&self, geometry: &FeatureGeometry, source_crs: Option<Crs>) -> Result<FeatureGeometry> {
        let source = self.require_known(source_crs)?;
        geometry.try_map_coords(|c| self.convert(c, source, self.metric_crs))
    }

    /// Project a geometry into WGS84 lon/lat.
    pub fn to_geographic(&self, geometry: &FeatureGeometry, source_crs: Option<Crs>) -> Result<FeatureGeometry> {
        let source = self.require_known(source_crs)?;
        geometry.try_map_coords(|c| self.convert(c, source, Crs::Geographic))
    }

    #[inline]
    pub fn point_to_metric(&self, point: Point<f64>, source: Crs) -> Result<Point<f64>> {
        self.convert(point.0, source, self.metric_crs).map(Point::from)
    }

    #[inline]
    pub fn point_to_geographic(&self, point: Point<f64>, source: Crs) -> Result<Point<f64>> {
        self.convert(point.0, source, Crs::Geographic).map(Point::from)
    }

    /// Reproject every vertex of a polygon. Vertex count is preserved.
    pub fn polygon_to(&self, polygon: &Polygon<f64>, from: Crs, to: Crs) -> Result<Polygon<f64>> {
        if from == to { return Ok(polygon.clone()) }
        polygon.try_map_coords(|c| self.convert(c, from, to))
    }

    /// Convert one coordinate between the two supported frames.
    pub fn convert(&self, coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>> {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return Err(CatchmentError::Projection(format!("non-finite coordinate ({}, {})", coord.x, coord.y)));
        }
        if from == to { return Ok(coord) }

        let (src, dst) = (self.proj_for(from)?, self.proj_for(to)?);
        if from.is_geographic() { self.check_extent(coord)? }

        let mut point = if from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(src, dst, &mut point)
            .map_err(|e| CatchmentError::Projection(format!("transform {from} -> {to} failed: {e:?}")))?;

        let out = if to.is_geographic() {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        };
        if !(out.x.is_finite() && out.y.is_finite()) {
            return Err(CatchmentError::Projection(format!("transform {from} -> {to} produced a non-finite coordinate")));
        }
        if to.is_geographic() { self.check_extent(out)? }
        Ok(out)
    }

    fn require_known(&self, crs: Option<Crs>) -> Result<Crs> {
        crs.ok_or_else(|| CatchmentError::Projection("geometry has no declared reference system".into()))
    }

    fn proj_for(&self, crs: Crs) -> Result<&Proj4> {
        match crs {
            Crs::Geographic => Ok(&self.geographic),
            crs if crs == self.metric_crs => Ok(&self.metric),
            crs => Err(CatchmentError::Projection(format!("{crs} is neither WGS84 nor the configured {}", self.metric_crs))),
        }
    }

    /// Reject lon/lat positions the configured zone cannot represent accurately.
    fn check_extent(&self, coord: Coord<f64>) -> Result<()> {
        let (lat_min, lat_max) = UTM_LAT_RANGE;
        if !(-180.0..=180.0).contains(&coord.x) || !(lat_min..=lat_max).contains(&coord.y) {
            return Err(CatchmentError::Projection(format!(
                "({:.6}, {:.6}) is outside the valid extent of {}", coord.x, coord.y, self.metric_crs
            )));
        }

        if let Some(meridian) = self.metric_crs.central_meridian() {
            let offset = ((coord.x - meridian + 540.0) % 360.0 - 180.0).abs();
            if offset > MAX_MERIDIAN_OFFSET {
                return Err(CatchmentError::Projection(format!(
                    "longitude {:.6} is {offset:.2}° from the central meridian of {}", coord.x, self.metric_crs
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector").field("metric_crs", &self.metric_crs).finish_non_exhaustive()
    }
}
