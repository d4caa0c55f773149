//! Filesystem raster store.
//!
//! Plain images are read and written with the `image` crate; georeferenced
//! artifacts are GeoTIFFs encoded by [`GeoTiffWriter`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::RasterError;
use crate::geometry::Srs;

use super::geotiff::{self, GeoTiffCompression, GeoTiffWriter};
use super::{Raster, RasterInfo, RasterStore};

/// [`RasterStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRasterStore {
    compression: GeoTiffCompression,
}

impl LocalRasterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compression for GeoTIFF artifacts
    #[must_use]
    pub fn with_compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    fn write_geotiff(&self, raster: &Raster, path: &Path) -> Result<(), RasterError> {
        let writer = GeoTiffWriter::new(raster)
            .map_err(|_| RasterError::MissingGeoreference(path.to_path_buf()))?
            .compression(self.compression);

        ensure_parent(path)?;
        let file = File::create(path).map_err(|e| RasterError::write(path, e))?;
        let mut out = BufWriter::new(file);
        writer.write_to(&mut out).map_err(|e| RasterError::write(path, e))?;
        out.flush().map_err(|e| RasterError::write(path, e))?;
        Ok(())
    }
}

fn is_geotiff(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
}

fn ensure_parent(path: &Path) -> Result<(), RasterError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| RasterError::write(path, e))
        }
        _ => Ok(()),
    }
}

impl RasterStore for LocalRasterStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(&self, path: &Path) -> Result<Raster, RasterError> {
        if is_geotiff(path) {
            let file = File::open(path).map_err(|e| RasterError::open(path, e))?;
            return geotiff::decode(BufReader::new(file)).map_err(|e| RasterError::open(path, e));
        }
        let image = image::open(path).map_err(|e| RasterError::open(path, e))?;
        Ok(Raster::from_image(&image))
    }

    fn save_image(&self, raster: &Raster, path: &Path) -> Result<(), RasterError> {
        let color = match raster.bands {
            1 => image::ExtendedColorType::L8,
            3 => image::ExtendedColorType::Rgb8,
            _ => image::ExtendedColorType::Rgba8,
        };
        ensure_parent(path)?;
        image::save_buffer(path, &raster.pixels, raster.width, raster.height, color)
            .map_err(|e| RasterError::write(path, e))?;
        debug!(path = %path.display(), "saved image");
        Ok(())
    }

    fn create_copy(&self, raster: &Raster, path: &Path) -> Result<(), RasterError> {
        self.write_geotiff(raster, path)?;
        debug!(
            path = %path.display(),
            compression = ?self.compression,
            "created georeferenced copy"
        );
        Ok(())
    }

    fn warp(&self, path: &Path, target: Srs) -> Result<(), RasterError> {
        let source = self.open(path)?;
        if source.info().is_none() {
            return Err(RasterError::MissingGeoreference(path.to_path_buf()));
        }
        let warped = super::warp::warp(&source, target)?;

        // Encode fully before touching the artifact so a failure leaves it intact.
        let writer = GeoTiffWriter::new(&warped)
            .map_err(|e| RasterError::write(path, e))?
            .compression(self.compression);
        let bytes = writer.to_bytes().map_err(|e| RasterError::write(path, e))?;
        fs::write(path, bytes).map_err(|e| RasterError::write(path, e))?;

        debug!(path = %path.display(), %target, "warped in place");
        Ok(())
    }

    fn read_info(&self, path: &Path) -> Result<RasterInfo, RasterError> {
        self.open(path)?
            .info()
            .ok_or_else(|| RasterError::MissingGeoreference(path.to_path_buf()))
    }
}
