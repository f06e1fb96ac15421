use geo::{Coord, Rect};
use ndarray::{Array2, s};
use serde::Serialize;

use super::{GeoTransform, Window};
use crate::crs::Crs;
use crate::error::{CatchmentError, Result};

/// Meters per degree of latitude, for reporting approximate resolution only.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A single-band population raster held in memory for a whole batch.
///
/// Cells equal to the no-data sentinel, or `NaN`, carry no measurement and
/// are never summed.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    data: Array2<f64>,
    transform: GeoTransform,
    crs: Crs,
    nodata: Option<f64>,
}

impl RasterGrid {
    /// Build a grid, checking that it is non-empty and its transform is invertible.
    pub fn new(data: Array2<f64>, transform: GeoTransform, crs: Crs, nodata: Option<f64>) -> Result<Self> {
        if data.is_empty() {
            return Err(CatchmentError::InvalidRaster(format!("empty grid {:?}", data.dim())));
        }
        if !transform.is_invertible() {
            return Err(CatchmentError::InvalidRaster(format!("transform is not invertible: {transform:?}")));
        }
        Ok(Self { data, transform, crs, nodata })
    }

    /// Build from row-major values.
    pub fn from_vec(values: Vec<f64>, rows: usize, cols: usize, transform: GeoTransform, crs: Crs, nodata: Option<f64>) -> Result<Self> {
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| CatchmentError::InvalidRaster(e.to_string()))?;
        Self::new(data, transform, crs, nodata)
    }

    #[inline] pub fn rows(&self) -> usize { self.data.nrows() }

    #[inline] pub fn cols(&self) -> usize { self.data.ncols() }

    #[inline] pub fn data(&self) -> &Array2<f64> { &self.data }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn nodata(&self) -> Option<f64> { self.nodata }

    /// Cell size in the raster's native units (degrees or meters).
    #[inline] pub fn resolution(&self) -> (f64, f64) { self.transform.resolution() }

    /// World-space extent of the grid.
    #[inline] pub fn bounds(&self) -> Rect<f64> { self.transform.bounds(self.rows(), self.cols()) }

    /// True for `NaN` and for the declared sentinel.
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Raw cell value, `None` outside the grid.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied()
    }

    /// Measured cell value, `None` outside the grid or for no-data.
    #[inline]
    pub fn valid(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row, col).filter(|v| !self.is_nodata(*v))
    }

    /// Cell containing a world coordinate, if any.
    pub fn cell_of(&self, coord: Coord<f64>) -> Option<(usize, usize)> {
        let (col, row) = self.transform.invert(coord);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 { return None }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    /// Copy out the cells covering `rect` (in the raster's CRS). `None` if they don't overlap.
    pub fn clip(&self, rect: &Rect<f64>) -> Option<Self> {
        let window = Window::covering(rect, &self.transform, self.rows(), self.cols())?;
        let data = self.data
            .slice(s![window.row_start..window.row_end, window.col_start..window.col_end])
            .to_owned();
        Some(Self {
            data,
            transform: self.transform.shifted(window.row_start, window.col_start),
            crs: self.crs,
            nodata: self.nodata,
        })
    }

    /// Whole-grid statistics over measured cells.
    pub fn summary(&self) -> RasterSummary {
        let mut valid_cells = 0usize;
        let mut total = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in self.data.iter().filter(|v| !self.is_nodata(**v)) {
            valid_cells += 1;
            total += v;
            min = min.min(v);
            max = max.max(v);
        }

        let (res_x, res_y) = self.resolution();
        let resolution_m = if self.crs.is_geographic() { res_y * METERS_PER_DEGREE } else { res_y };
        RasterSummary {
            rows: self.rows(),
            cols: self.cols(),
            crs: self.crs.to_string(),
            resolution: (res_x, res_y),
            approx_resolution_m: resolution_m,
            valid_cells,
            nodata_cells: self.data.len() - valid_cells,
            total,
            min: (valid_cells > 0).then_some(min),
            max: (valid_cells > 0).then_some(max),
            mean: (valid_cells > 0).then(|| total / valid_cells as f64),
            has_negative: valid_cells > 0 && min < 0.0,
        }
    }
}

/// Descriptive statistics of a loaded raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterSummary {
    pub rows: usize,
    pub cols: usize,
    pub crs: String,
    pub resolution: (f64, f64),
    pub approx_resolution_m: f64,
    pub valid_cells: usize,
    pub nodata_cells: usize,
    pub total: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Negative cells break the nested-buffer monotonicity check.
    pub has_negative: bool,
}
