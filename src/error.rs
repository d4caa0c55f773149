//! Error taxonomy.
//!
//! Every stage of the pipeline returns a typed error so the single boundary in
//! `main` decides how the process exits. The variants follow the failure
//! classes of a run:
//!
//! - [`ConfigError`]: bad arguments, conflicting options, missing credential
//! - [`AcquisitionError`]: the image provider could not deliver an image
//! - [`RasterError`]: a raster artifact could not be read, written or warped
//! - [`VectorError`]: the label source could not be read or the labels written
//! - [`ParseError`]: malformed coordinate input (CLI or CSV)

use std::path::PathBuf;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for a pipeline or batch run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Rejected before any item runs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("conflicting arguments, cannot make labels without georeferencing the image")]
    LabelsWithoutReference,
    #[error("requires a size in the form {{L}},{{W}}, got {0:?}")]
    InvalidSize(String),
    #[error("unsupported reference system {0:?}")]
    UnsupportedSrs(String),
    #[error("API_KEY not found in {} or the process environment", .0.display())]
    MissingCredential(PathBuf),
    #[error("cannot read environment file {}: {reason}", .path.display())]
    EnvFile { path: PathBuf, reason: String },
}

/// Image provider failures.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot decode provider image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Raster engine failures.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("cannot open raster {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },
    #[error("cannot write raster {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
    #[error("raster {} carries no georeference", .0.display())]
    MissingGeoreference(PathBuf),
    #[error("invalid raster: {0}")]
    InvalidData(String),
    #[error("projection failed: {0}")]
    Projection(String),
}

impl RasterError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Vector engine failures.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("cannot open label source {}: {reason}", .path.display())]
    Source { path: PathBuf, reason: String },
    #[error("cannot write labels {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
    #[error("projection failed: {0}")]
    Projection(String),
}

/// Malformed coordinate input.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("{field} {value:?} is not a number")]
    NotANumber { field: &'static str, value: String },
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("latitude {0} beyond the Web Mercator limit of +/-85.0511, cannot georeference")]
    BeyondWebMercator(f64),
    #[error("row {row}: expected at least two columns")]
    MissingColumn { row: usize },
    #[error("cannot read coordinates from {path}: {reason}")]
    Csv { path: String, reason: String },
}
