use geo::{Centroid, CoordsIter, MapCoords, Point, Polygon};

/// Geometry of a feature. Polygons are buffered from their centroid.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
}

impl FeatureGeometry {
    /// The point buffers are anchored on: the point itself, or the polygon centroid.
    /// Returns `None` for empty polygons and non-finite coordinates.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        let point = match self {
            Self::Point(point) => *point,
            Self::Polygon(polygon) => polygon.centroid()?,
        };
        (point.x().is_finite() && point.y().is_finite()).then_some(point)
    }

    /// Number of coordinates, counting the closing vertex of polygon rings.
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Point(_) => 1,
            Self::Polygon(polygon) => polygon.coords_count(),
        }
    }

    /// Apply a fallible coordinate transform to every vertex.
    pub fn try_map_coords<E>(&self, f: impl Fn(geo::Coord<f64>) -> Result<geo::Coord<f64>, E> + Copy) -> Result<Self, E> {
        Ok(match self {
            Self::Point(point) => Self::Point(point.try_map_coords(f)?),
            Self::Polygon(polygon) => Self::Polygon(polygon.try_map_coords(f)?),
        })
    }

    #[inline] pub fn is_point(&self) -> bool { matches!(self, Self::Point(_)) }
}

impl From<Point<f64>> for FeatureGeometry {
    fn from(point: Point<f64>) -> Self { Self::Point(point) }
}

impl From<Polygon<f64>> for FeatureGeometry {
    fn from(polygon: Polygon<f64>) -> Self { Self::Polygon(polygon) }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, point, polygon};

    use super::*;

    #[test]
    fn point_is_its_own_representative() {
        let geometry = FeatureGeometry::Point(point!(x: 77.62, y: 12.93));
        assert_eq!(geometry.representative_point(), Some(point!(x: 77.62, y: 12.93)));
    }

    #[test]
    fn polygon_uses_centroid() {
        let geometry = FeatureGeometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0),
        ]);
        assert_eq!(geometry.representative_point(), Some(point!(x: 1.0, y: 1.0)));
    }

    #[test]
    fn empty_polygon_has_no_representative() {
        let geometry = FeatureGeometry::Polygon(Polygon::new(LineString::new(vec![]), vec![]));
        assert_eq!(geometry.representative_point(), None);
    }

    #[test]
    fn nan_point_has_no_representative() {
        let geometry = FeatureGeometry::Point(point!(x: f64::NAN, y: 1.0));
        assert_eq!(geometry.representative_point(), None);
    }

    #[test]
    fn mapping_preserves_vertex_count() {
        let geometry = FeatureGeometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0),
        ]);
        let shifted = geometry
            .try_map_coords(|c| Ok::<_, ()>(geo::Coord { x: c.x + 10.0, y: c.y }))
            .unwrap();
        assert_eq!(shifted.vertex_count(), geometry.vertex_count());
    }
}
