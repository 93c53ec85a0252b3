use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the grid reading and scoring library.
///
/// Per-photograph problems (grid not found, undecodable image) are not
/// errors: they come back as a failed [`crate::GridReading`].
#[derive(Debug, Error)]
pub enum GridError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern catalog: {0}")]
    InvalidCatalog(String),

    #[error("grid must have {expected} cells, got {found}")]
    InvalidGridLength { expected: usize, found: usize },

    #[error("raw buffer of {len} bytes does not match {width}x{height}x3")]
    InvalidBuffer { width: u32, height: u32, len: usize },

    #[error("size thresholds must be finite and strictly increasing: {0:?}")]
    InvalidThresholds([f32; 4]),

    #[error("severity bands must satisfy light_min <= light_max < mild_max: ({0}, {1}, {2})")]
    InvalidBands(u32, u32, u32),

    #[error("left and right hands cannot share the marker color {0}")]
    SharedHandColor(crate::models::MarkerColor),

    #[error("no usable input: none of the {total} photographs could be read")]
    NoUsableInput { total: usize },

    #[error("calibration needs at least 2 measurements, found {found}")]
    InsufficientSamples { found: usize },

    #[error("debug directory is not empty: {}", .0.display())]
    DebugDirNotEmpty(PathBuf),
}

pub type Result<T> = std::result::Result<T, GridError>;
