//! Per-coordinate pipeline.
//!
//! One coordinate moves through
//!
//! ```text
//! Init -> AcquireImage -> { Skip | Fetch } -> [Georeference -> Reproject] -> [ClipLabels] -> Done
//! ```
//!
//! The image artifact on disk is the idempotency signal: without `force`, an
//! existing image ends the item as skipped and nothing downstream is re-run.
//! Georeferencing and reprojection run only when enabled; label clipping runs
//! only when a label source is configured (which requires georeferencing, so
//! the clip always sees the final reprojected artifact).

use std::path::Path;

use tracing::{debug, info, info_span};

use crate::artifacts::ArtifactSet;
use crate::config::PipelineOptions;
use crate::error::{ConfigError, ParseError, RasterError, Result};
use crate::geometry::extent::Extent;
use crate::geometry::projection::{georeference_transform, MAX_LATITUDE};
use crate::geometry::{Coordinate, GeoTransform, Srs};
use crate::provider::{ImageProvider, ImageRequest};
use crate::raster::{Raster, RasterStore};
use crate::vector::VectorStore;

/// Reference system the projector computes transforms in.
pub const WORKING_SRS: Srs = Srs::WEB_MERCATOR;

/// Result of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// True if the image artifact already existed and nothing was done
    pub skipped: bool,
    pub artifacts: ArtifactSet,
}

/// Write a copy of the image at `source` carrying `transform` and `srs`.
///
/// The source artifact is left untouched.
///
/// # Errors
/// [`RasterError::Open`] if the source cannot be read, [`RasterError::Write`]
/// if the destination cannot be created.
pub fn georeference<R: RasterStore>(
    rasters: &R,
    source: &Path,
    transform: GeoTransform,
    srs: Srs,
    destination: &Path,
) -> std::result::Result<(), RasterError> {
    let raster: Raster = rasters.open(source)?;
    rasters.create_copy(&raster.georeferenced(transform, srs), destination)?;
    debug!(path = %destination.display(), %srs, "georeferenced");
    Ok(())
}

/// Warp the referenced artifact at `path` into `target` in place.
///
/// # Errors
/// Any raster failure while reading, projecting or writing.
pub fn reproject<R: RasterStore>(
    rasters: &R,
    path: &Path,
    target: Srs,
) -> std::result::Result<(), RasterError> {
    rasters.warp(path, target)?;
    debug!(path = %path.display(), %target, "reprojected");
    Ok(())
}

/// Copy the features of `labels` that intersect the footprint of the raster
/// at `raster_path` to `destination`. Returns the number of features kept.
///
/// # Errors
/// Raster failures reading the footprint, vector failures reading the label
/// source or writing the result.
pub fn clip_labels<R: RasterStore, V: VectorStore>(
    rasters: &R,
    vectors: &V,
    raster_path: &Path,
    labels: &Path,
    destination: &Path,
) -> Result<usize> {
    let info = rasters.read_info(raster_path)?;
    let extent = Extent::from_transform(&info.transform, info.width, info.height, info.srs);

    let layer = vectors.open(labels)?;
    let clipped = layer.filter_by_extent(&extent)?;
    vectors.write(&clipped, destination)?;

    debug!(
        path = %destination.display(),
        kept = clipped.len(),
        total = layer.len(),
        "clipped labels"
    );
    Ok(clipped.len())
}

/// Runs coordinates through the pipeline under a fixed set of options.
pub struct ItemPipeline<P, R, V> {
    options: PipelineOptions,
    provider: P,
    rasters: R,
    vectors: V,
}

impl<P, R, V> ItemPipeline<P, R, V>
where
    P: ImageProvider,
    R: RasterStore,
    V: VectorStore,
{
    /// # Errors
    /// Any [`ConfigError`] from [`PipelineOptions::validate`]; no item can run
    /// on invalid options.
    pub fn new(
        options: PipelineOptions,
        provider: P,
        rasters: R,
        vectors: V,
    ) -> std::result::Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            provider,
            rasters,
            vectors,
        })
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process one coordinate.
    ///
    /// # Errors
    /// [`ParseError::BeyondWebMercator`] when georeferencing a coordinate the
    /// projector cannot place, before anything is fetched. Otherwise the first
    /// acquisition, raster or vector failure; artifacts written before the
    /// failure stay on disk.
    pub fn run(&self, coordinate: &Coordinate) -> Result<PipelineOutcome> {
        let artifacts = self.options.artifacts(coordinate);
        let span = info_span!("item", stem = %artifacts.stem);
        let _guard = span.enter();

        if self.options.georeference && coordinate.latitude().abs() > MAX_LATITUDE {
            return Err(ParseError::BeyondWebMercator(coordinate.latitude()).into());
        }

        if !self.options.force && self.rasters.exists(&artifacts.image) {
            debug!(path = %artifacts.image.display(), "file exists, skipping");
            return Ok(PipelineOutcome {
                skipped: true,
                artifacts,
            });
        }

        let request = ImageRequest::new(*coordinate, self.options.zoom, self.options.size);
        let image = self.provider.fetch(&request)?;
        self.rasters
            .save_image(&Raster::from_image(&image), &artifacts.image)?;
        info!(path = %artifacts.image.display(), "fetched image");

        if self.options.georeference {
            let transform =
                georeference_transform(coordinate, self.options.zoom, self.options.size);
            georeference(
                &self.rasters,
                &artifacts.image,
                transform,
                WORKING_SRS,
                &artifacts.georeferenced,
            )?;
            reproject(&self.rasters, &artifacts.georeferenced, self.options.target_srs)?;

            if let Some(labels) = &self.options.labels {
                clip_labels(
                    &self.rasters,
                    &self.vectors,
                    &artifacts.georeferenced,
                    labels,
                    &artifacts.labels,
                )?;
            }
        }

        Ok(PipelineOutcome {
            skipped: false,
            artifacts,
        })
    }
}
