#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`geometry`]: Coordinate types, geotransforms and Web Mercator math
//! - [`artifacts`]: Deterministic artifact paths per coordinate
//! - [`provider`]: Image acquisition via the [`ImageProvider`] trait
//! - [`raster`]: [`RasterStore`] trait, GeoTIFF codec and warp engine
//! - [`vector`]: [`VectorStore`] trait, Shapefile/GeoJSON labels and clipping
//! - [`pipeline`]: Per-coordinate [`ItemPipeline`]
//! - [`batch`]: CSV input and the [`BatchRunner`]
//! - [`config`]: Run options and credentials
//! - [`error`]: Error taxonomy

// ============================================================================
// Public modules
// ============================================================================

pub mod artifacts;
pub mod batch;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod provider;
pub mod raster;
pub mod vector;

// ============================================================================
// Errors
// ============================================================================

pub use error::{
    AcquisitionError,
    ConfigError,
    Error,
    ParseError,
    RasterError,
    Result,
    VectorError,
};

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::{Coordinate, GeoTransform, ImageSize, Srs};
pub use geometry::extent::Extent;
pub use geometry::projection::{
    CoordTransformer,
    coordinate_to_web_mercator,
    georeference_transform,
    ground_sample_distance,
    project_point,
};

// ============================================================================
// Configuration
// ============================================================================

pub use artifacts::ArtifactSet;
pub use config::{Credentials, PipelineOptions};

// ============================================================================
// Capabilities
// ============================================================================

pub use provider::{ImageProvider, ImageRequest, StaticMapsClient};
pub use raster::{
    GeoTiffCompression,
    GeoTiffWriter,
    LocalRasterStore,
    Raster,
    RasterInfo,
    RasterStore,
};
pub use vector::{GeoJsonVectorStore, LabelLayer, LocalVectorStore, VectorStore};

// ============================================================================
// Pipeline & Batch
// ============================================================================
// Primary API: ItemPipeline::new(options, provider, rasters, vectors)?.run(&coordinate)

pub use pipeline::{ItemPipeline, PipelineOutcome, clip_labels, georeference, reproject};
pub use batch::{BatchOutcome, BatchProgress, BatchRunner, NoProgress, read_coordinates};
