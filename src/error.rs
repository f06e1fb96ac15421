use std::fmt;

use thiserror::Error;

/// Errors raised by the catchment engine.
///
/// Batch-level kinds (`InvalidRadius`, `RasterUnavailable`, `InvalidConfig`)
/// abort before any feature is processed. Per-feature kinds (`Projection`,
/// `DegenerateGeometry`) are turned into failed records by the aggregator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatchmentError {
    #[error("projection error: {0}")]
    Projection(String),

    #[error("invalid radius: {0} (radii must be positive and finite)")]
    InvalidRadius(f64),

    #[error("no raster available and fallback estimation is disabled")]
    RasterUnavailable,

    #[error("degenerate geometry for feature {0}")]
    DegenerateGeometry(String),

    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CatchmentError {
    /// Reason code recorded on a failed record, if this error is per-feature.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Projection(_) => Some(FailureReason::Projection),
            Self::DegenerateGeometry(_) => Some(FailureReason::DegenerateGeometry),
            _ => None,
        }
    }
}

/// Reason code attached to a failed (feature, radius) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    DegenerateGeometry,
    Projection,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DegenerateGeometry => "degenerate_geometry",
            Self::Projection => "projection",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, CatchmentError>;
