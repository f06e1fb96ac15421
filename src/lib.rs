#![doc = "Population catchment engine public API"]
pub mod buffer;
pub mod catchment;
pub mod config;
pub mod crs;
pub mod error;
pub mod feature;
pub mod io;
pub mod proj;
pub mod raster;

#[doc(inline)]
pub use buffer::{BufferCenter, BufferGenerator, BufferPolygon};

#[doc(inline)]
pub use catchment::{
    BatchOptions, BatchSummary, CancelToken, CatchmentAggregator, CatchmentRecord, CatchmentTable,
    DataSource, FallbackEstimator, RecordStatus, run_batch,
};

#[doc(inline)]
pub use config::{CatchmentConfig, CoverageMode, FallbackConfig};

#[doc(inline)]
pub use crs::Crs;

#[doc(inline)]
pub use error::{CatchmentError, FailureReason};

#[doc(inline)]
pub use feature::{Category, Feature, FeatureGeometry, FeatureId};

#[doc(inline)]
pub use proj::Projector;

#[doc(inline)]
pub use raster::{CellValue, Coverage, GeoTransform, RasterGrid, RasterSummary};
