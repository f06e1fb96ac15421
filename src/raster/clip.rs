use geo::{Coord, Rect};

use super::RasterGrid;
use crate::crs::Crs;
use crate::error::Result;
use crate::feature::{Feature, study_area};
use crate::proj::Projector;

/// Shortest ground length of one degree (latitude at the equator), so
/// radius-to-degree conversions err on the wide side.
const MIN_METERS_PER_DEGREE: f64 = 110_000.0;

/// Latitude beyond which longitude degrees are treated as this latitude's.
const MAX_CLIP_LATITUDE: f64 = 85.0;

/// WGS84 area a raster must keep so that no buffer of up to `max_radius_m`
/// around the features loses cells.
///
/// The feature bounds grow by the larger of `margin_deg` and the radius in
/// degrees (at the bounds' highest latitude) plus one raster cell. `None`
/// when the features are not all in WGS84; the raster should then be kept whole.
pub fn catchment_area(features: &[Feature], raster: &RasterGrid, max_radius_m: f64, margin_deg: f64) -> Option<Rect<f64>> {
    if features.iter().any(|f| f.crs != Some(Crs::Geographic)) { return None }
    let bounds = study_area(features, 0.0)?;

    let lat = bounds.min().y.abs().max(bounds.max().y.abs()).min(MAX_CLIP_LATITUDE);
    let meters_per_degree = MIN_METERS_PER_DEGREE * lat.to_radians().cos();
    let (res_x, res_y) = raster.resolution();
    let cell = res_x.abs().max(res_y.abs());
    let cell_deg = if raster.crs().is_geographic() { cell } else { cell / meters_per_degree };

    let margin = margin_deg.max(max_radius_m / meters_per_degree + cell_deg);
    study_area(features, margin)
}

impl RasterGrid {
    /// Copy out the cells covering a WGS84 lon/lat rectangle.
    ///
    /// For a metric raster the rectangle's corners are projected first and
    /// their bounds used. `Ok(None)` when the raster and rectangle don't overlap.
    pub fn clip_geographic(&self, rect: &Rect<f64>) -> Result<Option<Self>> {
        if self.crs().is_geographic() { return Ok(self.clip(rect)) }

        let projector = Projector::new(self.crs())?;
        let (min, max) = (rect.min(), rect.max());
        let corners = [min, max, Coord { x: min.x, y: max.y }, Coord { x: max.x, y: min.y }]
            .into_iter()
            .map(|c| projector.convert(c, Crs::Geographic, self.crs()))
            .collect::<Result<Vec<_>>>()?;

        let (mut lo, mut hi) = (corners[0], corners[0]);
        for c in &corners[1..] {
            lo = Coord { x: lo.x.min(c.x), y: lo.y.min(c.y) };
            hi = Coord { x: hi.x.max(c.x), y: hi.y.max(c.y) };
        }
        Ok(self.clip(&Rect::new(lo, hi)))
    }
}

#[cfg(test)]
mod tests {
    use geo::{Contains, point};

    use super::*;
    use crate::feature::Category;
    use crate::raster::GeoTransform;

    #[test]
    fn geographic_clip_with_margin() {
        let res = 0.01;
        let grid = RasterGrid::from_vec(vec![1.0; 100 * 100], 100, 100, GeoTransform::north_up(77.0, 13.5, res, -res), Crs::Geographic, None).unwrap();
        let rect = Rect::new(Coord { x: 77.505, y: 12.905 }, Coord { x: 77.545, y: 12.945 });
        let clipped = grid.clip_geographic(&rect).unwrap().unwrap();
        assert_eq!(clipped.data().dim(), (5, 5));
        assert!(clipped.bounds().min().x <= 77.505 && clipped.bounds().max().y >= 12.945);
    }

    #[test]
    fn metric_clip_contains_projected_area() {
        let projector = Projector::new(Crs::Utm { zone: 43, south: false }).unwrap();
        let center = projector.point_to_metric(point!(x: 77.62, y: 12.93), Crs::Geographic).unwrap();
        let origin = (center.x() - 5000.0, center.y() + 5000.0);
        let grid = RasterGrid::from_vec(vec![1.0; 100 * 100], 100, 100, GeoTransform::north_up(origin.0, origin.1, 100.0, -100.0), projector.metric_crs(), None).unwrap();

        let rect = Rect::new(Coord { x: 77.61, y: 12.92 }, Coord { x: 77.63, y: 12.94 });
        let clipped = grid.clip_geographic(&rect).unwrap().unwrap();
        // 0.02° is roughly 2.2 km, so 22-24 cells of 100 m on each axis.
        let (rows, cols) = clipped.data().dim();
        assert!((22..=25).contains(&rows) && (22..=25).contains(&cols), "{rows}x{cols}");
        assert!(clipped.bounds().contains(&center.0));
    }

    #[test]
    fn catchment_area_grows_with_the_radius() {
        let res = 1.0 / 1200.0;
        let grid = RasterGrid::from_vec(vec![1.0; 4], 2, 2, GeoTransform::north_up(77.0, 13.0, res, -res), Crs::Geographic, None).unwrap();
        let features = vec![Feature::new("a", Category::Retail, point!(x: 77.62, y: 12.93))];

        let small = catchment_area(&features, &grid, 100.0, 0.01).unwrap();
        assert!((small.max().x - 77.63).abs() < 1e-12);

        // 2 km at 12.93° N needs about 0.0186° of longitude, more than the 0.01° margin.
        let large = catchment_area(&features, &grid, 2000.0, 0.01).unwrap();
        let needed = 2000.0 / (111_320.0 * 12.93_f64.to_radians().cos()) + res;
        assert!(large.max().x - 77.62 >= needed && 77.62 - large.min().x >= needed);
        assert!(large.max().y - 12.93 >= 2000.0 / 110_574.0 + res);
    }

    #[test]
    fn catchment_area_skips_projected_features() {
        let grid = RasterGrid::from_vec(vec![1.0; 4], 2, 2, GeoTransform::north_up(77.0, 13.0, 0.1, -0.1), Crs::Geographic, None).unwrap();
        let mut projected = Feature::new("b", Category::Retail, point!(x: 650_000.0, y: 1_430_000.0));
        projected.crs = Some(Crs::Utm { zone: 43, south: false });
        let features = vec![Feature::new("a", Category::Retail, point!(x: 77.62, y: 12.93)), projected];
        assert!(catchment_area(&features, &grid, 500.0, 0.01).is_none());
    }

    #[test]
    fn disjoint_clip_is_none() {
        let grid = RasterGrid::from_vec(vec![1.0; 4], 2, 2, GeoTransform::north_up(77.0, 13.0, 0.1, -0.1), Crs::Geographic, None).unwrap();
        let rect = Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 11.0, y: 11.0 });
        assert!(grid.clip_geographic(&rect).unwrap().is_none());
    }
}
