//! Gridded population rasters: georeferencing, windows, and polygon sampling.

mod clip;
mod grid;
mod sample;
mod transform;
mod window;

pub use clip::catchment_area;
pub use grid::{RasterGrid, RasterSummary};
pub use sample::{CellValue, Coverage, Sample, WeightedCell};
pub use transform::GeoTransform;
pub use window::Window;
