//! Per-feature catchment statistics: measured from a raster, or estimated without one.

mod aggregate;
mod batch;
mod estimate;
mod record;

pub use aggregate::CatchmentAggregator;
pub use batch::{BatchOptions, BatchSummary, CancelToken, CatchmentTable, RadiusSummary, run_batch};
pub use estimate::FallbackEstimator;
pub use record::{CatchmentRecord, DataSource, RecordStatus, buffer_area_ha, density_per_hectare};
