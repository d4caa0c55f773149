//! Raster abstraction.
//!
//! The pipeline never touches raster files directly; it talks to a
//! [`RasterStore`]. [`LocalRasterStore`] is the filesystem implementation
//! (PNG in, GeoTIFF out), and tests substitute in-memory stores.

pub mod geotiff;
pub mod local;
pub mod warp;

pub use geotiff::{GeoTiffCompression, GeoTiffWriter};
pub use local::LocalRasterStore;
pub use warp::warp;

use std::path::Path;

use crate::error::RasterError;
use crate::geometry::{GeoTransform, Srs};

/// Decoded 8-bit raster with optional georeference.
///
/// Pixels are interleaved (`R,G,B,R,G,B,...`); `bands` is 1, 3 or 4.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub pixels: Vec<u8>,
    pub bands: usize,
    pub width: u32,
    pub height: u32,
    pub transform: Option<GeoTransform>,
    pub srs: Option<Srs>,
}

impl Raster {
    /// Ungeoreferenced raster from raw pixels.
    ///
    /// # Errors
    /// Returns an error if the band count is unsupported or the buffer length
    /// does not match the dimensions.
    pub fn new(
        pixels: Vec<u8>,
        bands: usize,
        width: u32,
        height: u32,
    ) -> Result<Self, RasterError> {
        if !matches!(bands, 1 | 3 | 4) {
            return Err(RasterError::InvalidData(format!(
                "unsupported band count {bands}"
            )));
        }
        let expected = width as usize * height as usize * bands;
        if pixels.len() != expected {
            return Err(RasterError::InvalidData(format!(
                "expected {expected} samples for {width}x{height}x{bands}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            bands,
            width,
            height,
            transform: None,
            srs: None,
        })
    }

    /// Convert a decoded image, keeping grayscale and alpha where present.
    #[must_use]
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let color = image.color();
        let (pixels, bands) = if color.has_alpha() {
            (image.to_rgba8().into_raw(), 4)
        } else if color.has_color() {
            (image.to_rgb8().into_raw(), 3)
        } else {
            (image.to_luma8().into_raw(), 1)
        };
        Self {
            pixels,
            bands,
            width,
            height,
            transform: None,
            srs: None,
        }
    }

    /// Pixel-identical copy carrying `transform` and `srs`.
    #[must_use]
    pub fn georeferenced(&self, transform: GeoTransform, srs: Srs) -> Self {
        Self {
            transform: Some(transform),
            srs: Some(srs),
            ..self.clone()
        }
    }

    /// Georeference summary, if the raster has one.
    #[must_use]
    pub fn info(&self) -> Option<RasterInfo> {
        Some(RasterInfo {
            transform: self.transform?,
            srs: self.srs?,
            width: self.width,
            height: self.height,
        })
    }
}

/// What the extent extractor needs from a referenced raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterInfo {
    pub transform: GeoTransform,
    pub srs: Srs,
    pub width: u32,
    pub height: u32,
}

/// Raster capability used by the pipeline.
pub trait RasterStore {
    /// True if an artifact exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read a raster (plain image or GeoTIFF).
    ///
    /// # Errors
    /// [`RasterError::Open`] if the artifact cannot be read.
    fn open(&self, path: &Path) -> Result<Raster, RasterError>;

    /// Store a plain image artifact, creating parent directories.
    ///
    /// # Errors
    /// [`RasterError::Write`] if the artifact cannot be created.
    fn save_image(&self, raster: &Raster, path: &Path) -> Result<(), RasterError>;

    /// Store a georeferenced copy of `raster`, creating parent directories.
    ///
    /// # Errors
    /// [`RasterError::MissingGeoreference`] if `raster` has no transform or
    /// reference, [`RasterError::Write`] if the artifact cannot be created.
    fn create_copy(&self, raster: &Raster, path: &Path) -> Result<(), RasterError>;

    /// Warp the referenced artifact at `path` into `target`, replacing it.
    ///
    /// # Errors
    /// Open, projection or write failures.
    fn warp(&self, path: &Path, target: Srs) -> Result<(), RasterError>;

    /// Transform, reference and dimensions of the artifact at `path`.
    ///
    /// # Errors
    /// [`RasterError::Open`] or [`RasterError::MissingGeoreference`].
    fn read_info(&self, path: &Path) -> Result<RasterInfo, RasterError>;
}

impl<T: RasterStore + ?Sized> RasterStore for &T {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn open(&self, path: &Path) -> Result<Raster, RasterError> {
        (**self).open(path)
    }

    fn save_image(&self, raster: &Raster, path: &Path) -> Result<(), RasterError> {
        (**self).save_image(raster, path)
    }

    fn create_copy(&self, raster: &Raster, path: &Path) -> Result<(), RasterError> {
        (**self).create_copy(raster, path)
    }

    fn warp(&self, path: &Path, target: Srs) -> Result<(), RasterError> {
        (**self).warp(path, target)
    }

    fn read_info(&self, path: &Path) -> Result<RasterInfo, RasterError> {
        (**self).read_info(path)
    }
}
