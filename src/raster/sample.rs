use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

use super::{RasterGrid, Window};
use crate::config::CoverageMode;

/// Result of looking up the cell under a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Value(f64),
    /// The point is on the raster but the cell has no measurement.
    NoData,
    /// The point is outside the raster extent.
    NoCoverage,
}

impl CellValue {
    #[inline]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// How much of a buffer the raster could actually measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// The buffer lies entirely within the raster extent.
    Full,
    /// The buffer reaches past the raster edge; the total is a lower bound.
    Partial,
    /// The buffer is inside the extent but every cell it touches is no-data.
    NoData,
    /// The buffer does not intersect the raster at all.
    NoCoverage,
}

impl Coverage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::NoData => "no_data",
            Self::NoCoverage => "no_coverage",
        }
    }
}

/// A measured cell and the fraction of its area inside the query polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedCell {
    pub row: usize,
    pub col: usize,
    pub value: f64,
    pub weight: f64,
}

/// Cells of a raster falling inside a polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Measured cells in row-major order. No-data cells never appear here.
    pub cells: Vec<WeightedCell>,
    /// Intersecting cells that were masked out as no-data.
    pub nodata_cells: usize,
    /// Window cells the polygon actually touches, measured or not.
    pub intersecting_cells: usize,
    /// Index window searched; `None` when the polygon misses the raster.
    pub window: Option<Window>,
    /// The polygon's bounds extend past the raster extent.
    pub extends_beyond: bool,
}

impl Sample {
    fn no_coverage() -> Self {
        Self { cells: Vec::new(), nodata_cells: 0, intersecting_cells: 0, window: None, extends_beyond: true }
    }

    /// Σ value·weight, accumulated in row-major order.
    pub fn weighted_sum(&self) -> f64 {
        self.cells.iter().fold(0.0, |acc, cell| acc + cell.value * cell.weight)
    }

    /// A window that reaches the raster but touches no cell is still `NoCoverage`.
    pub fn coverage(&self) -> Coverage {
        if self.window.is_none() || self.intersecting_cells == 0 {
            Coverage::NoCoverage
        } else if self.cells.is_empty() && self.nodata_cells > 0 {
            Coverage::NoData
        } else if self.extends_beyond {
            Coverage::Partial
        } else {
            Coverage::Full
        }
    }

    #[inline] pub fn is_empty(&self) -> bool { self.cells.is_empty() }
}

impl RasterGrid {
    /// Value of the cell containing `point` (in the raster's CRS).
    pub fn value_at(&self, point: Point<f64>) -> CellValue {
        match self.cell_of(point.0) {
            None => CellValue::NoCoverage,
            Some((row, col)) => match self.valid(row, col) {
                Some(v) => CellValue::Value(v),
                None => CellValue::NoData,
            },
        }
    }

    /// Cells intersecting `polygon` (in the raster's CRS) with their coverage weights.
    ///
    /// In `Exact` mode the weight is the fraction of the cell's area inside the
    /// polygon. Cells whose four corners are all inside get weight 1.0, which is
    /// exact for convex polygons such as buffers. `CellCenter` mode is an
    /// approximation: a cell is in with weight 1.0 iff its centre is inside.
    pub fn sample(&self, polygon: &Polygon<f64>, mode: CoverageMode) -> Sample {
        let Some(rect) = polygon.bounding_rect() else { return Sample::no_coverage() };
        let Some(window) = Window::covering(&rect, self.transform(), self.rows(), self.cols()) else {
            return Sample::no_coverage();
        };

        let extent = self.bounds();
        let extends_beyond = rect.min().x < extent.min().x || rect.min().y < extent.min().y
            || rect.max().x > extent.max().x || rect.max().y > extent.max().y;

        let mut cells = Vec::with_capacity(window.len());
        let mut nodata_cells = 0;
        let mut intersecting_cells = 0;
        for (row, col) in window.cells() {
            let weight = match self.cell_overlap(polygon, row, col, mode) {
                Overlap::Outside => continue,
                Overlap::Touched => None,
                Overlap::Weighted(weight) => Some(weight),
            };
            intersecting_cells += 1;
            let Some(weight) = weight else { continue };
            match self.valid(row, col) {
                Some(value) => cells.push(WeightedCell { row, col, value, weight }),
                None => nodata_cells += 1,
            }
        }

        Sample { cells, nodata_cells, intersecting_cells, window: Some(window), extends_beyond }
    }

    fn cell_overlap(&self, polygon: &Polygon<f64>, row: usize, col: usize, mode: CoverageMode) -> Overlap {
        let transform = self.transform();
        let corners = transform.cell_corners(row, col);
        match mode {
            CoverageMode::CellCenter => {
                if polygon.intersects(&transform.cell_center(row, col)) {
                    Overlap::Weighted(1.0)
                } else if cell_polygon(&corners).intersects(polygon) {
                    Overlap::Touched
                } else {
                    Overlap::Outside
                }
            }
            CoverageMode::Exact => {
                let inside = corners.iter().filter(|c| polygon.intersects(*c)).count();
                if inside == corners.len() { return Overlap::Weighted(1.0) }

                let cell = cell_polygon(&corners);
                if inside == 0 && !cell.intersects(polygon) { return Overlap::Outside }

                let fraction = cell.intersection(polygon).unsigned_area() / transform.cell_area();
                if fraction > 0.0 { Overlap::Weighted(fraction.min(1.0)) } else { Overlap::Outside }
            }
        }
    }
}

/// How one window cell meets the query polygon.
enum Overlap {
    Outside,
    /// Intersects the polygon but contributes no weight (cell-centre mode).
    Touched,
    /// Fraction of the cell counted toward the sum.
    Weighted(f64),
}

fn cell_polygon(corners: &[Coord<f64>; 4]) -> Polygon<f64> {
    Polygon::new(LineString(vec![corners[0], corners[1], corners[2], corners[3], corners[0]]), vec![])
}
