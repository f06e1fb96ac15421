use std::ops::Range;

use geo::Rect;

use super::GeoTransform;

/// A rectangular block of cells, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Window {
    /// Cells touched by a world-space rectangle, clipped to a `rows × cols` grid.
    /// `None` when the rectangle misses the grid.
    pub fn covering(rect: &Rect<f64>, transform: &GeoTransform, rows: usize, cols: usize) -> Option<Self> {
        let (min, max) = (rect.min(), rect.max());
        let corners = [
            transform.invert(min),
            transform.invert(max),
            transform.invert(geo::Coord { x: min.x, y: max.y }),
            transform.invert(geo::Coord { x: max.x, y: min.y }),
        ];

        let (mut col_lo, mut col_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut row_lo, mut row_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for (col, row) in corners {
            if !(col.is_finite() && row.is_finite()) { return None }
            col_lo = col_lo.min(col);
            col_hi = col_hi.max(col);
            row_lo = row_lo.min(row);
            row_hi = row_hi.max(row);
        }

        let clamp = |v: f64, n: usize| v.clamp(0.0, n as f64) as usize;
        let window = Self {
            row_start: clamp(row_lo.floor(), rows),
            row_end: clamp(row_hi.ceil(), rows),
            col_start: clamp(col_lo.floor(), cols),
            col_end: clamp(col_hi.ceil(), cols),
        };
        (!window.is_empty()).then_some(window)
    }

    #[inline] pub fn rows(&self) -> Range<usize> { self.row_start..self.row_end }

    #[inline] pub fn cols(&self) -> Range<usize> { self.col_start..self.col_end }

    #[inline] pub fn height(&self) -> usize { self.row_end.saturating_sub(self.row_start) }

    #[inline] pub fn width(&self) -> usize { self.col_end.saturating_sub(self.col_start) }

    #[inline] pub fn len(&self) -> usize { self.height() * self.width() }

    #[inline] pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Row-major iterator over (row, col).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows().flat_map(move |row| self.cols().map(move |col| (row, col)))
    }
}
