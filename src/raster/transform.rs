use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Determinants smaller than this make the transform non-invertible.
const DEGENERATE_DET: f64 = 1e-18;

/// Affine map between fractional pixel positions (col, row) and world (x, y):
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up rasters have zero rotations and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, origin_y, pixel_width, pixel_height, row_rotation: 0.0, col_rotation: 0.0 }
    }

    /// From the GDAL ordering `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self { origin_x: c[0], pixel_width: c[1], row_rotation: c[2], origin_y: c[3], col_rotation: c[4], pixel_height: c[5] }
    }

    #[inline]
    fn det(&self) -> f64 { self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation }

    /// True when world → pixel can be solved.
    #[inline]
    pub fn is_invertible(&self) -> bool {
        let det = self.det();
        det.is_finite() && det.abs() > DEGENERATE_DET && self.origin_x.is_finite() && self.origin_y.is_finite()
    }

    /// World coordinate of a fractional pixel position.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    /// Fractional (col, row) of a world coordinate. Floor it to get a cell index.
    #[inline]
    pub fn invert(&self, coord: Coord<f64>) -> (f64, f64) {
        let det = self.det();
        let dx = coord.x - self.origin_x;
        let dy = coord.y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// World coordinate of a cell centre.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// The four world-space corners of a cell, counter-clockwise in pixel space.
    pub fn cell_corners(&self, row: usize, col: usize) -> [Coord<f64>; 4] {
        let (c, r) = (col as f64, row as f64);
        [self.apply(c, r), self.apply(c + 1.0, r), self.apply(c + 1.0, r + 1.0), self.apply(c, r + 1.0)]
    }

    /// World-space area of one cell, in the raster's native units squared.
    #[inline] pub fn cell_area(&self) -> f64 { self.det().abs() }

    /// Cell size along x and y (ignores rotation).
    #[inline] pub fn resolution(&self) -> (f64, f64) { (self.pixel_width.abs(), self.pixel_height.abs()) }

    #[inline]
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    /// Axis-aligned bounds of a `rows × cols` grid.
    pub fn bounds(&self, rows: usize, cols: usize) -> Rect<f64> {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(cols as f64, 0.0),
            self.apply(0.0, rows as f64),
            self.apply(cols as f64, rows as f64),
        ];
        let (mut min, mut max) = (corners[0], corners[0]);
        for c in &corners[1..] {
            min = Coord { x: min.x.min(c.x), y: min.y.min(c.y) };
            max = Coord { x: max.x.max(c.x), y: max.y.max(c.y) };
        }
        Rect::new(min, max)
    }

    /// Transform of the sub-grid whose top-left cell is (row, col).
    pub fn shifted(&self, row: usize, col: usize) -> Self {
        let origin = self.apply(col as f64, row as f64);
        Self { origin_x: origin.x, origin_y: origin.y, ..*self }
    }
}
